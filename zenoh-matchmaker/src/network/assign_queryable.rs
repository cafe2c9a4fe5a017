//! Queryable serving `AssignMatch` on a game server

use std::sync::Arc;

use zenoh::handlers::FifoChannelHandler;
use zenoh::key_expr::KeyExpr;
use zenoh::query::{Query, Queryable};
use zenoh_ext::{z_deserialize, z_serialize};

use crate::error::Result;
use crate::game_server::GameServerNode;
use crate::network::keyexpr::KeyexprAssign;
use crate::protocol::AssignMatchRequest;
use crate::types::ServerId;

/// Queryable on `<prefix>/server/<server_id>/assign_match`
#[derive(Debug)]
pub struct AssignQueryable {
    queryable: Queryable<FifoChannelHandler<Query>>,
    server_id: ServerId,
}

impl AssignQueryable {
    pub async fn declare(
        session: &zenoh::Session,
        prefix: impl Into<KeyExpr<'static>>,
        server_id: ServerId,
    ) -> Result<Self> {
        let keyexpr = KeyexprAssign::new(prefix, server_id.clone()).to_keyexpr()?;
        let queryable = session.declare_queryable(&keyexpr).await?;
        tracing::debug!("AssignMatch queryable declared on '{}'", keyexpr);
        Ok(Self {
            queryable,
            server_id,
        })
    }

    /// Answer assignments until the queryable closes
    ///
    /// Refusals by the node are sent back as error replies. A reply that cannot be sent is
    /// logged and the next query is served.
    pub async fn serve(self, node: Arc<GameServerNode>) -> Result<()> {
        while let Ok(query) = self.queryable.recv_async().await {
            if let Err(e) = handle_query(&node, &query).await {
                tracing::warn!("Failed to answer AssignMatch on '{}': {}", query.key_expr(), e);
            }
        }
        tracing::info!("AssignMatch queryable of '{}' closed", self.server_id);
        Ok(())
    }
}

async fn handle_query(node: &Arc<GameServerNode>, query: &Query) -> Result<()> {
    let request = match query.payload().map(z_deserialize::<AssignMatchRequest>) {
        Some(Ok(request)) => request,
        _ => {
            tracing::debug!("Malformed AssignMatch on '{}'", query.key_expr());
            query.reply_err("Malformed AssignMatch payload").await?;
            return Ok(());
        }
    };

    match node.handle_assignment(request).await {
        Ok(response) => {
            query
                .reply(query.key_expr().clone(), z_serialize(&response))
                .await?
        }
        Err(e) => query.reply_err(e.to_string()).await?,
    }
    Ok(())
}
