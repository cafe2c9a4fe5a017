//! `AssignMatch` delivery over zenoh

use std::time::Duration;

use futures::future::BoxFuture;
use zenoh::key_expr::KeyExpr;

use crate::dispatch::MatchDispatcher;
use crate::error::Result;
use crate::network::keyexpr::KeyexprAssign;
use crate::network::rpc::call;
use crate::protocol::{AssignMatchRequest, AssignMatchResponse};
use crate::types::ServerId;

/// Sends assignments to `<prefix>/server/<server_id>/assign_match`
pub struct ZenohDispatcher {
    session: zenoh::Session,
    prefix: KeyExpr<'static>,
    timeout: Duration,
}

impl ZenohDispatcher {
    /// `timeout` bounds each zenoh query; retries are left to the coordinator
    pub fn new(session: zenoh::Session, prefix: impl Into<KeyExpr<'static>>, timeout: Duration) -> Self {
        Self {
            session,
            prefix: prefix.into(),
            timeout,
        }
    }
}

impl MatchDispatcher for ZenohDispatcher {
    fn assign_match<'a>(
        &'a self,
        server: &'a ServerId,
        request: AssignMatchRequest,
    ) -> BoxFuture<'a, Result<AssignMatchResponse>> {
        Box::pin(async move {
            let keyexpr = KeyexprAssign::new(self.prefix.clone(), server.clone()).to_keyexpr()?;
            tracing::debug!("AssignMatch {} -> '{}'", request.match_id, keyexpr);
            call(&self.session, &keyexpr, &request, self.timeout).await
        })
    }
}
