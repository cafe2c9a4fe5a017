//! Typed client for the coordinator's remote-call surface

use std::time::Duration;

use futures::future::BoxFuture;
use zenoh::key_expr::KeyExpr;

use crate::error::Result;
use crate::game_server::StatusReporter;
use crate::network::keyexpr::{CoordinatorMethod, KeyexprCoordinator};
use crate::network::rpc::call;
use crate::protocol::{
    AdminServerUpdate, AdminStatusRequest, AdminUpdateResponse, PlayerStatusRequest,
    PlayerStatusResponse, QueuePlayerRequest, QueuePlayerResponse, ServerStatusResponse,
    ServerStatusUpdate, SystemStatus,
};

/// Default time to wait for a coordinator reply
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Client used by players, admins and game servers
#[derive(Clone)]
pub struct CoordinatorClient {
    session: zenoh::Session,
    prefix: KeyExpr<'static>,
    timeout: Duration,
}

impl CoordinatorClient {
    pub fn new(session: zenoh::Session, prefix: impl Into<KeyExpr<'static>>) -> Self {
        Self {
            session,
            prefix: prefix.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the reply timeout of every call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call<Req, Resp>(&self, method: CoordinatorMethod, request: &Req) -> Result<Resp>
    where
        Req: zenoh_ext::Serialize,
        Resp: zenoh_ext::Deserialize,
    {
        let keyexpr = KeyexprCoordinator::new(self.prefix.clone(), Some(method)).to_keyexpr()?;
        tracing::debug!("Calling '{}'", keyexpr);
        call(&self.session, &keyexpr, request, self.timeout).await
    }

    pub async fn queue_player(&self, request: &QueuePlayerRequest) -> Result<QueuePlayerResponse> {
        self.call(CoordinatorMethod::QueuePlayer, request).await
    }

    pub async fn player_status(&self, request: &PlayerStatusRequest) -> Result<PlayerStatusResponse> {
        self.call(CoordinatorMethod::PlayerStatus, request).await
    }

    pub async fn update_server_status(&self, request: &ServerStatusUpdate) -> Result<ServerStatusResponse> {
        self.call(CoordinatorMethod::ServerStatus, request).await
    }

    pub async fn admin_system_status(&self, request: &AdminStatusRequest) -> Result<SystemStatus> {
        self.call(CoordinatorMethod::AdminStatus, request).await
    }

    pub async fn admin_update_server_state(
        &self,
        request: &AdminServerUpdate,
    ) -> Result<AdminUpdateResponse> {
        self.call(CoordinatorMethod::AdminServerState, request).await
    }
}

impl StatusReporter for CoordinatorClient {
    fn report_status(&self, update: ServerStatusUpdate) -> BoxFuture<'_, Result<ServerStatusResponse>> {
        Box::pin(async move { self.update_server_status(&update).await })
    }
}
