//! Queryable exposing the coordinator's remote-call surface
//!
//! One queryable is declared on `<prefix>/coordinator/*`. Each incoming query is parsed as a
//! [`KeyexprCoordinator`] to pick the handler and answered from its own task, so a slow
//! request never delays the next one.

use std::sync::Arc;

use zenoh::handlers::FifoChannelHandler;
use zenoh::key_expr::KeyExpr;
use zenoh::query::{Query, Queryable};

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::network::keyexpr::{CoordinatorMethod, KeyexprCoordinator};
use crate::network::rpc::answer;
use crate::protocol::{
    AdminServerUpdate, AdminStatusRequest, PlayerStatusRequest, QueuePlayerRequest,
    ServerStatusUpdate,
};

#[derive(Debug)]
pub struct CoordinatorQueryable {
    queryable: Queryable<FifoChannelHandler<Query>>,
    keyexpr: KeyExpr<'static>,
}

impl CoordinatorQueryable {
    /// Declare the queryable on `<prefix>/coordinator/*`
    pub async fn declare(
        session: &zenoh::Session,
        prefix: impl Into<KeyExpr<'static>>,
    ) -> Result<Self> {
        let keyexpr = KeyexprCoordinator::new(prefix, None).to_keyexpr()?;
        let queryable = session.declare_queryable(&keyexpr).await?;
        tracing::info!("Coordinator queryable declared on '{}'", keyexpr);
        Ok(Self { queryable, keyexpr })
    }

    pub fn keyexpr(&self) -> &KeyExpr<'static> {
        &self.keyexpr
    }

    /// Answer queries until the queryable is undeclared or the session closes
    pub async fn serve(self, coordinator: Arc<Coordinator>) -> Result<()> {
        while let Ok(query) = self.queryable.recv_async().await {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_query(&coordinator, &query).await {
                    tracing::error!("Failed to answer query on '{}': {}", query.key_expr(), e);
                }
            });
        }
        tracing::info!("Coordinator queryable on '{}' closed", self.keyexpr);
        Ok(())
    }
}

async fn handle_query(coordinator: &Coordinator, query: &Query) -> Result<()> {
    let method = match KeyexprCoordinator::try_from(query.key_expr().clone()) {
        Ok(parsed) => parsed.method(),
        Err(e) => {
            tracing::debug!("Ignoring query: {}", e);
            None
        }
    };

    match method {
        Some(CoordinatorMethod::QueuePlayer) => {
            answer(query, |request: QueuePlayerRequest| coordinator.queue_player(request)).await
        }
        Some(CoordinatorMethod::PlayerStatus) => {
            answer(query, |request: PlayerStatusRequest| coordinator.player_status(request)).await
        }
        Some(CoordinatorMethod::ServerStatus) => {
            answer(query, |request: ServerStatusUpdate| {
                coordinator.update_server_status(request)
            })
            .await
        }
        Some(CoordinatorMethod::AdminStatus) => {
            answer(query, |request: AdminStatusRequest| {
                coordinator.admin_system_status(request)
            })
            .await
        }
        Some(CoordinatorMethod::AdminServerState) => {
            answer(query, |request: AdminServerUpdate| {
                coordinator.admin_update_server_state(request)
            })
            .await
        }
        None => {
            query.reply_err("Unknown coordinator method").await?;
            Ok(())
        }
    }
}
