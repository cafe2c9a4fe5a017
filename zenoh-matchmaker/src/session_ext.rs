use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use zenoh::{key_expr::KeyExpr, Resolvable};

use crate::config::{CoordinatorConfig, GameServerConfig};
use crate::coordinator::Coordinator;
use crate::error::{MatchmakerError, Result};
use crate::game_server::{FaultPolicy, GameServerNode, NeverFail};
use crate::network::{
    AssignQueryable, CoordinatorClient, CoordinatorQueryable, ZenohDispatcher, DEFAULT_CALL_TIMEOUT,
};
use crate::scheduler::MatchmakingLoop;
use crate::types::{ServerId, ServerStatus};

/// Extension trait for zenoh::Session to declare matchmaking services
pub trait SessionExt {
    /// Declare a coordinator serving on this session
    ///
    /// # Example
    /// ```no_run
    /// use zenoh_matchmaker::SessionExt;
    ///
    /// # async fn example() {
    /// let session = zenoh::open(zenoh::Config::default()).await.unwrap();
    /// let service = session.declare_coordinator().tick_interval_ms(1000).await.unwrap();
    /// # }
    /// ```
    fn declare_coordinator(&self) -> CoordinatorBuilder<'_>;

    /// Declare a game server that registers with the coordinator on this session's network
    fn declare_game_server(&self) -> GameServerBuilder<'_>;
}

impl SessionExt for zenoh::Session {
    fn declare_coordinator(&self) -> CoordinatorBuilder<'_> {
        CoordinatorBuilder {
            session: self,
            config: CoordinatorConfig::default(),
            periodic: true,
        }
    }

    fn declare_game_server(&self) -> GameServerBuilder<'_> {
        GameServerBuilder {
            session: self,
            config: GameServerConfig::default(),
            faults: Arc::new(NeverFail),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Builder for a coordinator service
#[must_use = "Resolvables do nothing unless you resolve them using `.await` or `zenoh::Wait::wait`"]
pub struct CoordinatorBuilder<'a> {
    session: &'a zenoh::Session,
    config: CoordinatorConfig,
    periodic: bool,
}

impl<'a> CoordinatorBuilder<'a> {
    /// Replace the whole configuration
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the coordinator name used in vector clocks
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.coordinator_id = name.into();
        self
    }

    /// Set the matchmaking period in milliseconds
    pub fn tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.tick_interval_ms = interval_ms;
        self
    }

    /// Run matchmaking rounds only through [`CoordinatorService::step`]
    pub fn manual_ticks(mut self) -> Self {
        self.periodic = false;
        self
    }

    /// Set the key expression prefix
    pub fn prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.config.keyexpr_prefix = prefix;
        self
    }
}

impl<'a> Resolvable for CoordinatorBuilder<'a> {
    type To = Result<CoordinatorService>;
}

impl<'a> std::future::IntoFuture for CoordinatorBuilder<'a> {
    type Output = <Self as Resolvable>::To;
    type IntoFuture =
        std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let session = self.session.clone();
            let prefix = self.config.keyexpr_prefix.clone();
            let dispatcher = ZenohDispatcher::new(
                session.clone(),
                prefix.clone(),
                Duration::from_millis(self.config.dispatch_timeout_ms),
            );
            let period = self.periodic.then(|| self.config.tick_interval());
            let coordinator = Arc::new(Coordinator::new(self.config, Arc::new(dispatcher)));

            let queryable = CoordinatorQueryable::declare(&session, prefix).await?;
            let serve_task = tokio::spawn(queryable.serve(coordinator.clone()));
            let matchmaking = MatchmakingLoop::spawn(coordinator.clone(), period);

            Ok(CoordinatorService {
                coordinator,
                matchmaking,
                serve_task,
            })
        })
    }
}

/// A running coordinator: queryable plus matchmaking loop
pub struct CoordinatorService {
    coordinator: Arc<Coordinator>,
    matchmaking: MatchmakingLoop,
    serve_task: JoinHandle<Result<()>>,
}

impl CoordinatorService {
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Run one matchmaking round now
    pub async fn step(&self) -> Result<usize> {
        self.matchmaking.step().await
    }

    /// Stop matchmaking and stop answering queries
    pub async fn stop(self) -> Result<()> {
        self.serve_task.abort();
        self.matchmaking.stop().await
    }
}

/// Builder for a game-server service
#[must_use = "Resolvables do nothing unless you resolve them using `.await` or `zenoh::Wait::wait`"]
pub struct GameServerBuilder<'a> {
    session: &'a zenoh::Session,
    config: GameServerConfig,
    faults: Arc<dyn FaultPolicy>,
    call_timeout: Duration,
}

impl<'a> GameServerBuilder<'a> {
    /// Set the server name
    pub fn name(mut self, name: String) -> Result<Self> {
        self.config.server_id = ServerId::from_name(name)?;
        Ok(self)
    }

    /// Set the address handed to matched players
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Set the simulated match duration range in milliseconds
    pub fn match_duration_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.config = self.config.with_match_duration_ms(min_ms, max_ms);
        self
    }

    /// Set the heartbeat period in milliseconds
    pub fn heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.heartbeat_interval_ms = interval_ms;
        self
    }

    /// Set the failure injection policy
    pub fn faults(mut self, faults: Arc<dyn FaultPolicy>) -> Self {
        self.faults = faults;
        self
    }

    /// Set the timeout of status reports to the coordinator
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the key expression prefix
    pub fn prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.config.keyexpr_prefix = prefix;
        self
    }
}

impl<'a> Resolvable for GameServerBuilder<'a> {
    type To = Result<GameServerService>;
}

impl<'a> std::future::IntoFuture for GameServerBuilder<'a> {
    type Output = <Self as Resolvable>::To;
    type IntoFuture =
        std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let session = self.session.clone();
            let prefix = self.config.keyexpr_prefix.clone();
            let client = CoordinatorClient::new(session.clone(), prefix.clone())
                .with_timeout(self.call_timeout);
            let node = GameServerNode::new(self.config, Arc::new(client), self.faults);

            // Serve assignments before announcing ourselves
            let queryable = AssignQueryable::declare(&session, prefix, node.id().clone()).await?;
            let assign_task = tokio::spawn(queryable.serve(node.clone()));

            let response = match node.register().await {
                Ok(response) => response,
                Err(e) => {
                    assign_task.abort();
                    return Err(e);
                }
            };
            if !response.status_code.is_success() {
                assign_task.abort();
                return Err(MatchmakerError::Remote(format!(
                    "Registration of '{}' refused: {}",
                    node.id(),
                    response.message
                )));
            }
            let heartbeat_task = node.spawn_heartbeat();

            Ok(GameServerService {
                node,
                assign_task,
                heartbeat_task,
            })
        })
    }
}

/// A running game server: assignment queryable plus heartbeats
pub struct GameServerService {
    node: Arc<GameServerNode>,
    assign_task: JoinHandle<Result<()>>,
    heartbeat_task: JoinHandle<()>,
}

impl GameServerService {
    pub fn node(&self) -> &Arc<GameServerNode> {
        &self.node
    }

    /// Wait until the server has gone `DOWN`
    pub async fn wait_down(&self) {
        let mut status_rx = self.node.watch_status();
        let _ = status_rx.wait_for(|status| *status == ServerStatus::Down).await;
    }

    /// Stop serving assignments and heartbeats
    pub fn stop(self) {
        self.assign_task.abort();
        self.heartbeat_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::clock::VectorClock;
    use crate::network::keyexpr::{CoordinatorMethod, KeyexprAssign, KeyexprCoordinator};
    use crate::protocol::{
        AdminServerUpdate, AdminStatusRequest, PlayerStatusRequest, QueuePlayerRequest,
    };
    use crate::types::{PlayerId, PlayerStatus, StatusCode};

    static NEXT_PREFIX: AtomicU32 = AtomicU32::new(0);

    /// Tests share the network, so each one gets its own prefix
    fn unique_prefix() -> KeyExpr<'static> {
        let n = NEXT_PREFIX.fetch_add(1, Ordering::SeqCst);
        KeyExpr::try_from(format!("test/matchmaker/{}/{}", std::process::id(), n)).unwrap()
    }

    async fn queue(client: &CoordinatorClient, id: u32) {
        let response = client
            .queue_player(&QueuePlayerRequest {
                player_id: PlayerId(id),
                game_mode_preference: "1v1".to_string(),
                clock: [(format!("Player{}", id), 1)].into_iter().collect(),
            })
            .await
            .unwrap();
        assert_eq!(response.message, "Player added to queue");
        assert!(response.clock.get("Matchmaker") > 0);
    }

    async fn wait_player(client: &CoordinatorClient, id: u32, status: PlayerStatus) -> crate::protocol::PlayerStatusResponse {
        for _ in 0..100 {
            let response = client
                .player_status(&PlayerStatusRequest {
                    player_id: PlayerId(id),
                    clock: VectorClock::new(),
                })
                .await
                .unwrap();
            if response.status == status {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("player {} never reached {}", id, status);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_match_over_zenoh() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let prefix = unique_prefix();

        let service = session
            .declare_coordinator()
            .prefix(prefix.clone())
            .manual_ticks()
            .await
            .unwrap();
        let server = session
            .declare_game_server()
            .name("GameServer1".to_string())
            .unwrap()
            .address("127.0.0.1:7001")
            .match_duration_ms(200, 300)
            .prefix(prefix.clone())
            .await
            .unwrap();

        let client = CoordinatorClient::new(session.clone(), prefix.clone());
        queue(&client, 1).await;
        queue(&client, 2).await;

        assert_eq!(service.step().await.unwrap(), 1);
        let response = wait_player(&client, 1, PlayerStatus::InMatch).await;
        assert_eq!(response.match_id, Some(1));
        assert_eq!(response.server_address.as_deref(), Some("127.0.0.1:7001"));

        let status = client
            .admin_system_status(&AdminStatusRequest {
                admin_id: "admin".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(status.servers.len(), 1);
        assert_eq!(status.servers[0].id.as_str(), "GameServer1");
        assert_eq!(status.servers[0].status, ServerStatus::Busy);
        assert!(status.queue.is_empty());

        // The match ends and the server reports back
        wait_player(&client, 1, PlayerStatus::Idle).await;
        wait_player(&client, 2, PlayerStatus::Idle).await;
        assert_eq!(server.node().status().await, ServerStatus::Available);

        server.stop();
        service.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_assign_queryable_survives_bad_queries() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let prefix = unique_prefix();
        let service = session
            .declare_coordinator()
            .prefix(prefix.clone())
            .manual_ticks()
            .await
            .unwrap();
        let server = session
            .declare_game_server()
            .name("GameServer1".to_string())
            .unwrap()
            .match_duration_ms(200, 300)
            .prefix(prefix.clone())
            .await
            .unwrap();

        let keyexpr = KeyexprAssign::new(prefix.clone(), server.node().id().clone())
            .to_keyexpr()
            .unwrap();
        for payload in [None, Some(vec![0xffu8])] {
            let get = session.get(&keyexpr);
            let replies = match payload {
                Some(bytes) => get.payload(bytes).await.unwrap(),
                None => get.await.unwrap(),
            };
            let reply = replies.recv_async().await.unwrap();
            assert!(reply.result().is_err());
        }

        let client = CoordinatorClient::new(session.clone(), prefix);
        queue(&client, 1).await;
        queue(&client, 2).await;
        assert_eq!(service.step().await.unwrap(), 1);
        let response = wait_player(&client, 1, PlayerStatus::InMatch).await;
        assert_eq!(response.match_id, Some(1));
        assert_eq!(server.node().status().await, ServerStatus::Busy);

        server.stop();
        service.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_admin_over_zenoh() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let prefix = unique_prefix();
        let service = session
            .declare_coordinator()
            .prefix(prefix.clone())
            .manual_ticks()
            .await
            .unwrap();
        let client = CoordinatorClient::new(session.clone(), prefix);

        let response = client
            .admin_update_server_state(&AdminServerUpdate {
                server_id: ServerId::from_name("ghost").unwrap(),
                new_status: ServerStatus::Available,
            })
            .await
            .unwrap();
        assert_eq!(response.status_code, StatusCode::NotFound);

        let status = client
            .admin_system_status(&AdminStatusRequest {
                admin_id: "admin".to_string(),
            })
            .await
            .unwrap();
        assert!(status.servers.is_empty());

        service.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_malformed_request_gets_error_reply() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let prefix = unique_prefix();
        let service = session
            .declare_coordinator()
            .prefix(prefix.clone())
            .manual_ticks()
            .await
            .unwrap();

        let keyexpr = KeyexprCoordinator::new(prefix, Some(CoordinatorMethod::QueuePlayer))
            .to_keyexpr()
            .unwrap();
        let replies = session.get(&keyexpr).await.unwrap();
        let reply = replies.recv_async().await.unwrap();
        assert!(reply.result().is_err());

        service.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_coordinator_is_unreachable() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let client = CoordinatorClient::new(session.clone(), unique_prefix())
            .with_timeout(Duration::from_millis(300));

        let err = client
            .player_status(&PlayerStatusRequest {
                player_id: PlayerId(1),
                clock: VectorClock::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MatchmakerError::Unreachable(_)));
        assert!(err.is_transport());

        // A game server cannot register without a coordinator
        let result = session
            .declare_game_server()
            .prefix(unique_prefix())
            .call_timeout(Duration::from_millis(300))
            .await;
        assert!(result.is_err());
    }
}
