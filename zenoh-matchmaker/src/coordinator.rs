//! Matchmaking coordinator: request handlers, match formation and dispatch
//!
//! All state lives in one [`SystemState`] behind an async mutex. Handlers hold the lock only
//! for their synchronous state update; `AssignMatch` calls run outside of it so a slow or
//! dead game server never blocks queueing or status queries.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::clock::VectorClock;
use crate::config::CoordinatorConfig;
use crate::dispatch::{MatchDispatcher, RetryPolicy};
use crate::error::{MatchmakerError, Result};
use crate::game_server::StatusReporter;
use crate::protocol::{
    AdminServerUpdate, AdminStatusRequest, AdminUpdateResponse, AssignMatchRequest,
    PlayerStatusRequest, PlayerStatusResponse, QueuePlayerRequest, QueuePlayerResponse,
    ServerStatusResponse, ServerStatusUpdate, SystemStatus,
};
use crate::state::{EnqueueOutcome, SystemState};
use crate::types::{MatchAssignment, StatusCode};

/// Result of dispatching one match
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The game server acknowledged the match
    Accepted(MatchAssignment),
    /// Every attempt failed; the server was marked down and the players requeued
    Recovered {
        assignment: MatchAssignment,
        error: MatchmakerError,
    },
}

impl DispatchOutcome {
    pub fn assignment(&self) -> &MatchAssignment {
        match self {
            DispatchOutcome::Accepted(assignment) => assignment,
            DispatchOutcome::Recovered { assignment, .. } => assignment,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, DispatchOutcome::Accepted(_))
    }
}

/// The central matchmaking service
pub struct Coordinator {
    config: CoordinatorConfig,
    state: Mutex<SystemState>,
    dispatcher: Arc<dyn MatchDispatcher>,
    retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, dispatcher: Arc<dyn MatchDispatcher>) -> Self {
        tracing::info!("Coordinator '{}' initialized", config.coordinator_id);
        Self {
            state: Mutex::new(SystemState::new(config.coordinator_id.clone())),
            retry: RetryPolicy::from_config(&config),
            config,
            dispatcher,
        }
    }

    /// Name of the coordinator in vector clocks
    pub fn id(&self) -> &str {
        &self.config.coordinator_id
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Snapshot of the global clock
    pub async fn clock(&self) -> VectorClock {
        self.state.lock().await.clock().clone()
    }

    /// `QueuePlayer`: add a player to the tail of the queue
    pub async fn queue_player(&self, request: QueuePlayerRequest) -> QueuePlayerResponse {
        let mut state = self.state.lock().await;
        let message = match state.enqueue(request.player_id, &request.clock) {
            EnqueueOutcome::Queued => {
                tracing::info!(
                    "Player {} queued (mode '{}')",
                    request.player_id,
                    request.game_mode_preference
                );
                "Player added to queue"
            }
            EnqueueOutcome::AlreadyQueued => {
                tracing::debug!("Player {} already in queue", request.player_id);
                "Player already in queue"
            }
        };
        QueuePlayerResponse {
            message: message.to_string(),
            clock: state.clock().clone(),
        }
    }

    /// `GetPlayerStatus`: unknown players are `IDLE`
    pub async fn player_status(&self, request: PlayerStatusRequest) -> PlayerStatusResponse {
        let response = self
            .state
            .lock()
            .await
            .player_status(request.player_id, &request.clock);
        tracing::debug!("Player {} status: {}", request.player_id, response.status);
        response
    }

    /// `UpdateServerStatus`: a game server reports its own status
    pub async fn update_server_status(&self, request: ServerStatusUpdate) -> ServerStatusResponse {
        let mut state = self.state.lock().await;
        let result = state.report_server(&request);
        let clock = state.clock().clone();
        drop(state);

        match result {
            Ok(outcome) => {
                let message = if outcome.current != request.new_status {
                    tracing::debug!(
                        "Heartbeat from '{}' while match is pending, keeping {}",
                        request.server_id,
                        outcome.current
                    );
                    format!("Status of {} kept at {}", request.server_id, outcome.current)
                } else {
                    if outcome.previous == Some(outcome.current) {
                        tracing::debug!("Heartbeat from '{}': {}", request.server_id, outcome.current);
                    } else {
                        tracing::info!(
                            "Server '{}' at {} is now {}",
                            request.server_id,
                            request.address,
                            outcome.current
                        );
                    }
                    format!("Status of {} set to {}", request.server_id, outcome.current)
                };
                ServerStatusResponse {
                    status_code: StatusCode::Success,
                    message,
                    clock,
                }
            }
            Err(e) => {
                tracing::warn!("Rejected status report from '{}': {}", request.server_id, e);
                ServerStatusResponse {
                    status_code: e.status_code(),
                    message: e.to_string(),
                    clock,
                }
            }
        }
    }

    /// `AdminGetSystemStatus`: read-only snapshot of servers, queue and clock
    pub async fn admin_system_status(&self, request: AdminStatusRequest) -> SystemStatus {
        tracing::debug!("System status requested by '{}'", request.admin_id);
        self.state.lock().await.snapshot()
    }

    /// `AdminUpdateServerState`: force a known server to `AVAILABLE` or `DOWN`
    pub async fn admin_update_server_state(&self, request: AdminServerUpdate) -> AdminUpdateResponse {
        let result = self
            .state
            .lock()
            .await
            .force_server(&request.server_id, request.new_status);

        match result {
            Ok(previous) => {
                tracing::warn!(
                    "Admin override: server '{}' {} -> {}",
                    request.server_id,
                    previous,
                    request.new_status
                );
                AdminUpdateResponse {
                    status_code: StatusCode::Success,
                    message: format!("Status of {} changed to {}", request.server_id, request.new_status),
                }
            }
            Err(e) => {
                tracing::warn!("Admin override on '{}' refused: {}", request.server_id, e);
                AdminUpdateResponse {
                    status_code: e.status_code(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Form every match currently possible, in one critical section
    ///
    /// Players and servers are already marked as matched when this returns; the caller owns
    /// the dispatch of each assignment.
    pub async fn form_matches(&self) -> Vec<(MatchAssignment, VectorClock)> {
        let mut state = self.state.lock().await;
        std::iter::from_fn(|| state.next_match()).collect()
    }

    /// One matchmaking round: form matches and dispatch each in its own task
    pub async fn tick(self: &Arc<Self>) -> Vec<JoinHandle<DispatchOutcome>> {
        self.form_matches()
            .await
            .into_iter()
            .map(|(assignment, clock)| {
                let coordinator = self.clone();
                tokio::spawn(async move { coordinator.dispatch(assignment, clock).await })
            })
            .collect()
    }

    /// Deliver one assignment, rolling it back if every attempt fails
    pub async fn dispatch(&self, assignment: MatchAssignment, clock: VectorClock) -> DispatchOutcome {
        tracing::info!(
            "Match {}: players {} and {} -> server '{}'",
            assignment.match_id,
            assignment.players.0,
            assignment.players.1,
            assignment.server_id
        );
        let request = AssignMatchRequest {
            match_id: assignment.match_id,
            player_ids: assignment.players,
            clock,
        };

        match self
            .retry
            .assign(self.dispatcher.as_ref(), &assignment.server_id, &request)
            .await
        {
            Ok(response) => {
                self.state.lock().await.observe(&response.clock);
                tracing::info!(
                    "Match {} accepted by '{}': {}",
                    assignment.match_id,
                    assignment.server_id,
                    response.message
                );
                DispatchOutcome::Accepted(assignment)
            }
            Err(error) => {
                tracing::warn!(
                    "Match {} could not be delivered to '{}', marking it DOWN and requeuing players {} and {}",
                    assignment.match_id,
                    assignment.server_id,
                    assignment.players.0,
                    assignment.players.1
                );
                self.state.lock().await.recover(&assignment);
                DispatchOutcome::Recovered { assignment, error }
            }
        }
    }
}

/// In-process wiring: a game server can report straight to a local coordinator
impl StatusReporter for Coordinator {
    fn report_status(&self, update: ServerStatusUpdate) -> BoxFuture<'_, Result<ServerStatusResponse>> {
        Box::pin(async move { Ok(self.update_server_status(update).await) })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::protocol::AssignMatchResponse;
    use crate::types::{PlayerId, PlayerStatus, ServerId, ServerStatus};

    /// Records every call; servers listed in `failing` answer with an error
    #[derive(Default)]
    struct MockDispatcher {
        failing: HashSet<String>,
        calls: StdMutex<Vec<(String, AssignMatchRequest)>>,
    }

    impl MockDispatcher {
        fn failing(servers: &[&str]) -> Self {
            Self {
                failing: servers.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls_to(&self, server: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| s == server)
                .count()
        }
    }

    impl MatchDispatcher for MockDispatcher {
        fn assign_match<'a>(
            &'a self,
            server: &'a ServerId,
            request: AssignMatchRequest,
        ) -> BoxFuture<'a, Result<AssignMatchResponse>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((server.to_string(), request.clone()));
                if self.failing.contains(server.as_str()) {
                    return Err(MatchmakerError::Unreachable(server.to_string()));
                }
                let mut clock = request.clock.clone();
                clock.tick(server.as_str());
                Ok(AssignMatchResponse {
                    message: "Match accepted".to_string(),
                    match_id: request.match_id,
                    player_ids: request.player_ids,
                    server_address: format!("{}:7000", server),
                    clock,
                })
            })
        }
    }

    fn coordinator(dispatcher: Arc<MockDispatcher>) -> Arc<Coordinator> {
        let config = CoordinatorConfig::default()
            .with_dispatch_timeout_ms(200)
            .with_retry_backoff_ms(1);
        Arc::new(Coordinator::new(config, dispatcher))
    }

    async fn register(coordinator: &Coordinator, server: &str) {
        let response = coordinator
            .update_server_status(ServerStatusUpdate {
                server_id: ServerId::from_name(server).unwrap(),
                new_status: ServerStatus::Available,
                address: format!("{}:7000", server),
                finished_match: None,
                clock: [(server, 1)].into_iter().collect(),
            })
            .await;
        assert_eq!(response.status_code, StatusCode::Success);
    }

    async fn queue(coordinator: &Coordinator, ids: &[u32]) {
        for id in ids {
            coordinator
                .queue_player(QueuePlayerRequest {
                    player_id: PlayerId(*id),
                    game_mode_preference: "1v1".to_string(),
                    clock: VectorClock::new(),
                })
                .await;
        }
    }

    async fn status_of(coordinator: &Coordinator, id: u32) -> PlayerStatusResponse {
        coordinator
            .player_status(PlayerStatusRequest {
                player_id: PlayerId(id),
                clock: VectorClock::new(),
            })
            .await
    }

    async fn run_tick(coordinator: &Arc<Coordinator>) -> Vec<DispatchOutcome> {
        futures::future::join_all(coordinator.tick().await)
            .await
            .into_iter()
            .map(|outcome| outcome.unwrap())
            .collect()
    }

    fn queued_ids(status: &SystemStatus) -> Vec<u32> {
        status.queue.iter().map(|entry| entry.player_id.0).collect()
    }

    async fn snapshot(coordinator: &Coordinator) -> SystemStatus {
        coordinator
            .admin_system_status(AdminStatusRequest {
                admin_id: "admin".to_string(),
            })
            .await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_pairs_head_of_queue() {
        let dispatcher = Arc::new(MockDispatcher::default());
        let coordinator = coordinator(dispatcher.clone());
        register(&coordinator, "S1").await;
        queue(&coordinator, &[1, 2, 3]).await;

        let outcomes = run_tick(&coordinator).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_accepted());
        assert_eq!(outcomes[0].assignment().match_id, 1);
        assert_eq!(outcomes[0].assignment().players, (PlayerId(1), PlayerId(2)));

        let status = snapshot(&coordinator).await;
        assert_eq!(queued_ids(&status), vec![3]);
        assert_eq!(status.servers[0].status, ServerStatus::Busy);
        assert_eq!(status.servers[0].current_match_id, Some(1));
        // The server's clock entry came back with the acknowledgement
        assert_eq!(status.clock.get("S1"), 2);

        let player = status_of(&coordinator, 1).await;
        assert_eq!(player.status, PlayerStatus::InMatch);
        assert_eq!(player.match_id, Some(1));
        assert_eq!(player.server_address.as_deref(), Some("S1:7000"));
        assert_eq!(dispatcher.calls_to("S1"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_failed_dispatch_rolls_back() {
        let dispatcher = Arc::new(MockDispatcher::failing(&["S1"]));
        let coordinator = coordinator(dispatcher.clone());
        register(&coordinator, "S1").await;
        queue(&coordinator, &[1, 2, 3]).await;

        let outcomes = run_tick(&coordinator).await;
        assert!(matches!(
            &outcomes[0],
            DispatchOutcome::Recovered { error: MatchmakerError::Unreachable(_), .. }
        ));
        assert_eq!(dispatcher.calls_to("S1"), 3);

        let status = snapshot(&coordinator).await;
        assert_eq!(queued_ids(&status), vec![1, 2, 3]);
        assert_eq!(status.servers[0].status, ServerStatus::Down);
        assert_eq!(status.servers[0].current_match_id, None);
        assert_eq!(status_of(&coordinator, 1).await.status, PlayerStatus::InQueue);
        assert_eq!(status_of(&coordinator, 2).await.status, PlayerStatus::InQueue);

        // Nothing left to dispatch to
        assert!(run_tick(&coordinator).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_failed_server_is_skipped_next_round() {
        let dispatcher = Arc::new(MockDispatcher::failing(&["S1"]));
        let coordinator = coordinator(dispatcher.clone());
        register(&coordinator, "S1").await;
        queue(&coordinator, &[1, 2]).await;
        run_tick(&coordinator).await;

        register(&coordinator, "S2").await;
        let outcomes = run_tick(&coordinator).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_accepted());
        assert_eq!(outcomes[0].assignment().server_id.as_str(), "S2");
        assert_eq!(outcomes[0].assignment().players, (PlayerId(1), PlayerId(2)));
        assert_eq!(outcomes[0].assignment().match_id, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_concurrent_matches_use_distinct_servers() {
        let dispatcher = Arc::new(MockDispatcher::default());
        let coordinator = coordinator(dispatcher.clone());
        register(&coordinator, "S1").await;
        register(&coordinator, "S2").await;
        queue(&coordinator, &[1, 2, 3, 4, 5]).await;

        let outcomes = run_tick(&coordinator).await;
        assert_eq!(outcomes.len(), 2);
        let servers: HashSet<&str> = outcomes
            .iter()
            .map(|o| o.assignment().server_id.as_str())
            .collect();
        assert_eq!(servers.len(), 2);
        assert_eq!(dispatcher.calls_to("S1"), 1);
        assert_eq!(dispatcher.calls_to("S2"), 1);
        assert_eq!(queued_ids(&snapshot(&coordinator).await), vec![5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_unknown_player_is_idle() {
        let coordinator = coordinator(Arc::new(MockDispatcher::default()));
        let response = status_of(&coordinator, 999).await;
        assert_eq!(response.status, PlayerStatus::Idle);
        assert_eq!(response.match_id, None);
        assert_eq!(response.server_address, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_duplicate_queue_request() {
        let coordinator = coordinator(Arc::new(MockDispatcher::default()));
        let first = coordinator
            .queue_player(QueuePlayerRequest {
                player_id: PlayerId(7),
                game_mode_preference: "1v1".to_string(),
                clock: [("Player7", 1)].into_iter().collect(),
            })
            .await;
        let second = coordinator
            .queue_player(QueuePlayerRequest {
                player_id: PlayerId(7),
                game_mode_preference: "1v1".to_string(),
                clock: [("Player7", 2)].into_iter().collect(),
            })
            .await;
        assert_eq!(first.message, "Player added to queue");
        assert_eq!(second.message, "Player already in queue");
        assert!(first.clock < second.clock);
        assert_eq!(queued_ids(&snapshot(&coordinator).await), vec![7]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueues_keep_queue_consistent() {
        let coordinator = coordinator(Arc::new(MockDispatcher::default()));
        let tasks: Vec<_> = (0..50u32)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { queue(&coordinator, &[i % 25]).await })
            })
            .collect();
        futures::future::join_all(tasks).await;

        let ids = queued_ids(&snapshot(&coordinator).await);
        assert_eq!(ids.len(), 25);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_invalid_transition_is_reported() {
        let coordinator = coordinator(Arc::new(MockDispatcher::default()));
        register(&coordinator, "S1").await;
        let response = coordinator
            .update_server_status(ServerStatusUpdate {
                server_id: ServerId::from_name("S1").unwrap(),
                new_status: ServerStatus::Down,
                address: "S1:7000".to_string(),
                finished_match: None,
                clock: VectorClock::new(),
            })
            .await;
        assert_eq!(response.status_code, StatusCode::InvalidTransition);
        assert_eq!(snapshot(&coordinator).await.servers[0].status, ServerStatus::Available);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_admin_unknown_server() {
        let coordinator = coordinator(Arc::new(MockDispatcher::default()));
        let response = coordinator
            .admin_update_server_state(AdminServerUpdate {
                server_id: ServerId::from_name("ghost").unwrap(),
                new_status: ServerStatus::Available,
            })
            .await;
        assert_eq!(response.status_code, StatusCode::NotFound);
        assert!(snapshot(&coordinator).await.servers.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_admin_readmits_down_server() {
        let dispatcher = Arc::new(MockDispatcher::failing(&["S1"]));
        let coordinator = coordinator(dispatcher);
        register(&coordinator, "S1").await;
        queue(&coordinator, &[1, 2]).await;
        run_tick(&coordinator).await;
        assert_eq!(snapshot(&coordinator).await.servers[0].status, ServerStatus::Down);

        // A self-report cannot bring it back
        let response = coordinator
            .update_server_status(ServerStatusUpdate {
                server_id: ServerId::from_name("S1").unwrap(),
                new_status: ServerStatus::Available,
                address: "S1:7000".to_string(),
                finished_match: None,
                clock: VectorClock::new(),
            })
            .await;
        assert_eq!(response.status_code, StatusCode::InvalidTransition);

        let before = coordinator.clock().await;
        let response = coordinator
            .admin_update_server_state(AdminServerUpdate {
                server_id: ServerId::from_name("S1").unwrap(),
                new_status: ServerStatus::Available,
            })
            .await;
        assert_eq!(response.status_code, StatusCode::Success);
        assert!(before < coordinator.clock().await);

        let matches = coordinator.form_matches().await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0.server_id.as_str(), "S1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_admin_rejects_busy() {
        let coordinator = coordinator(Arc::new(MockDispatcher::default()));
        register(&coordinator, "S1").await;
        let response = coordinator
            .admin_update_server_state(AdminServerUpdate {
                server_id: ServerId::from_name("S1").unwrap(),
                new_status: ServerStatus::Busy,
            })
            .await;
        assert_eq!(response.status_code, StatusCode::InvalidStatus);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_reporter_completes_match() {
        let coordinator = coordinator(Arc::new(MockDispatcher::default()));
        register(&coordinator, "S1").await;
        queue(&coordinator, &[1, 2]).await;
        run_tick(&coordinator).await;

        let reporter: &dyn StatusReporter = coordinator.as_ref();
        let heartbeat = reporter
            .report_status(ServerStatusUpdate {
                server_id: ServerId::from_name("S1").unwrap(),
                new_status: ServerStatus::Available,
                address: "S1:7000".to_string(),
                finished_match: None,
                clock: VectorClock::new(),
            })
            .await
            .unwrap();
        assert!(heartbeat.status_code.is_success());
        assert_eq!(heartbeat.message, "Status of S1 kept at BUSY");
        assert_eq!(status_of(&coordinator, 1).await.status, PlayerStatus::InMatch);
        assert_eq!(snapshot(&coordinator).await.servers[0].status, ServerStatus::Busy);

        let response = reporter
            .report_status(ServerStatusUpdate {
                server_id: ServerId::from_name("S1").unwrap(),
                new_status: ServerStatus::Available,
                address: "S1:7000".to_string(),
                finished_match: Some(1),
                clock: VectorClock::new(),
            })
            .await
            .unwrap();
        assert!(response.status_code.is_success());
        assert_eq!(status_of(&coordinator, 1).await.status, PlayerStatus::Idle);
        assert_eq!(status_of(&coordinator, 2).await.status, PlayerStatus::Idle);
    }
}
