//! Game-server node: accepts match assignments, simulates matches and reports its status
//!
//! The node keeps its own status and vector clock. Matches run in background tasks so an
//! `AssignMatch` is acknowledged as soon as the server has switched to `BUSY`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::clock::VectorClock;
use crate::config::GameServerConfig;
use crate::error::{MatchmakerError, Result};
use crate::protocol::{AssignMatchRequest, AssignMatchResponse, ServerStatusResponse, ServerStatusUpdate};
use crate::types::{MatchId, PlayerId, ServerId, ServerStatus};

/// Sink for a game server's status reports
///
/// Implemented by [`crate::network::CoordinatorClient`] for remote coordinators and by
/// [`crate::Coordinator`] itself for in-process setups.
pub trait StatusReporter: Send + Sync {
    fn report_status(&self, update: ServerStatusUpdate) -> BoxFuture<'_, Result<ServerStatusResponse>>;
}

/// Failure injection for simulated game servers
pub trait FaultPolicy: Send + Sync {
    /// Refuse an assignment with an error reply
    fn reject_assignment(&self, _request: &AssignMatchRequest) -> bool {
        false
    }

    /// Go `DOWN` instead of `AVAILABLE` once the match is over
    fn crash_after_match(&self, _match_id: MatchId) -> bool {
        false
    }
}

/// Server that never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FaultPolicy for NeverFail {}

/// Independent random failures with fixed probabilities
#[derive(Debug, Clone, Copy)]
pub struct RandomFaults {
    reject_probability: f64,
    crash_probability: f64,
}

impl RandomFaults {
    /// Probabilities are clamped to 0.0 - 1.0
    pub fn new(reject_probability: f64, crash_probability: f64) -> Self {
        Self {
            reject_probability: reject_probability.clamp(0.0, 1.0),
            crash_probability: crash_probability.clamp(0.0, 1.0),
        }
    }
}

impl FaultPolicy for RandomFaults {
    fn reject_assignment(&self, _request: &AssignMatchRequest) -> bool {
        rand::random::<f64>() < self.reject_probability
    }

    fn crash_after_match(&self, _match_id: MatchId) -> bool {
        rand::random::<f64>() < self.crash_probability
    }
}

#[derive(Debug)]
struct NodeState {
    status: ServerStatus,
    clock: VectorClock,
    /// Match being played while `Busy`
    hosting: Option<MatchId>,
    /// Last match played to the end
    last_finished: Option<MatchId>,
}

/// A simulated game server
pub struct GameServerNode {
    config: GameServerConfig,
    state: Mutex<NodeState>,
    status_tx: watch::Sender<ServerStatus>,
    reporter: Arc<dyn StatusReporter>,
    faults: Arc<dyn FaultPolicy>,
}

impl GameServerNode {
    pub fn new(
        config: GameServerConfig,
        reporter: Arc<dyn StatusReporter>,
        faults: Arc<dyn FaultPolicy>,
    ) -> Arc<Self> {
        let (status_tx, _) = watch::channel(ServerStatus::Available);
        tracing::info!("Game server '{}' initialized at {}", config.server_id, config.address);
        Arc::new(Self {
            config,
            state: Mutex::new(NodeState {
                status: ServerStatus::Available,
                clock: VectorClock::new(),
                hosting: None,
                last_finished: None,
            }),
            status_tx,
            reporter,
            faults,
        })
    }

    pub fn id(&self) -> &ServerId {
        &self.config.server_id
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn config(&self) -> &GameServerConfig {
        &self.config
    }

    pub async fn status(&self) -> ServerStatus {
        self.state.lock().await.status
    }

    pub async fn clock(&self) -> VectorClock {
        self.state.lock().await.clock.clone()
    }

    /// Receiver notified on every local status change
    pub fn watch_status(&self) -> watch::Receiver<ServerStatus> {
        self.status_tx.subscribe()
    }

    /// Announce the server to the coordinator as `AVAILABLE`
    pub async fn register(&self) -> Result<ServerStatusResponse> {
        let update = {
            let mut state = self.state.lock().await;
            state.status = ServerStatus::Available;
            self.status_update(&mut state)
        };
        let result = self.send(update).await;
        self.publish_status().await;
        result
    }

    /// Re-report the current status without changing it
    pub async fn heartbeat(&self) -> Result<ServerStatusResponse> {
        let update = {
            let mut state = self.state.lock().await;
            self.status_update(&mut state)
        };
        self.send(update).await
    }

    /// Tick and build a report of the current status
    fn status_update(&self, state: &mut NodeState) -> ServerStatusUpdate {
        state.clock.tick(self.id().as_str());
        ServerStatusUpdate {
            server_id: self.id().clone(),
            new_status: state.status,
            address: self.config.address.clone(),
            finished_match: state.last_finished,
            clock: state.clock.clone(),
        }
    }

    /// Send a report and merge the clock of the answer
    ///
    /// A refusal by the coordinator is returned as a response, not an error.
    async fn send(&self, update: ServerStatusUpdate) -> Result<ServerStatusResponse> {
        let status = update.new_status;
        let response = self.reporter.report_status(update).await?;
        self.state.lock().await.clock.absorb(&response.clock);
        if response.status_code.is_success() {
            tracing::debug!("Server '{}' reported {}: {}", self.id(), status, response.message);
        } else {
            tracing::warn!(
                "Coordinator refused status {} from '{}': {} ({})",
                status,
                self.id(),
                response.message,
                response.status_code
            );
        }
        Ok(response)
    }

    /// Notify watchers of the current status
    async fn publish_status(&self) {
        let state = self.state.lock().await;
        self.status_tx.send_replace(state.status);
    }

    fn acceptance(&self, request: &AssignMatchRequest, clock: &VectorClock) -> AssignMatchResponse {
        AssignMatchResponse {
            message: "Match accepted".to_string(),
            match_id: request.match_id,
            player_ids: request.player_ids,
            server_address: self.config.address.clone(),
            clock: clock.clone(),
        }
    }

    /// Handle `AssignMatch`: accept only while `AVAILABLE`, then play the match in the background
    ///
    /// A repeated assignment of the match already being played is acknowledged again.
    pub async fn handle_assignment(self: &Arc<Self>, request: AssignMatchRequest) -> Result<AssignMatchResponse> {
        let response = {
            let mut state = self.state.lock().await;
            state.clock.absorb(&request.clock);
            if state.hosting == Some(request.match_id) {
                tracing::debug!("Server '{}' already hosting match {}", self.id(), request.match_id);
                state.clock.tick(self.id().as_str());
                return Ok(self.acceptance(&request, &state.clock));
            }
            if state.last_finished == Some(request.match_id) {
                return Err(MatchmakerError::InvalidStatus(format!(
                    "Server '{}' already played match {}",
                    self.id(),
                    request.match_id
                )));
            }
            if state.status != ServerStatus::Available {
                return Err(MatchmakerError::InvalidStatus(format!(
                    "Server '{}' is {} and cannot host match {}",
                    self.id(),
                    state.status,
                    request.match_id
                )));
            }
            if self.faults.reject_assignment(&request) {
                tracing::warn!("Server '{}' rejecting match {}", self.id(), request.match_id);
                return Err(MatchmakerError::Internal(format!(
                    "Server '{}' refused match {}",
                    self.id(),
                    request.match_id
                )));
            }
            state.status = ServerStatus::Busy;
            state.hosting = Some(request.match_id);
            state.clock.tick(self.id().as_str());
            self.status_tx.send_replace(ServerStatus::Busy);
            self.acceptance(&request, &state.clock)
        };

        let node = self.clone();
        tokio::spawn(async move {
            node.play_match(request.match_id, request.player_ids).await;
        });
        Ok(response)
    }

    async fn play_match(&self, match_id: MatchId, players: (PlayerId, PlayerId)) {
        let duration = self.match_duration();
        tracing::info!(
            "Match {} between players {} and {} started on '{}' ({:?})",
            match_id,
            players.0,
            players.1,
            self.id(),
            duration
        );
        tokio::time::sleep(duration).await;

        let next = if self.faults.crash_after_match(match_id) {
            tracing::warn!("Server '{}' crashed after match {}", self.id(), match_id);
            ServerStatus::Down
        } else {
            tracing::info!("Match {} finished on '{}'", match_id, self.id());
            ServerStatus::Available
        };
        let update = {
            let mut state = self.state.lock().await;
            state.status = next;
            state.hosting = None;
            state.last_finished = Some(match_id);
            self.status_update(&mut state)
        };
        if let Err(e) = self.send(update).await {
            tracing::warn!(
                "Server '{}' failed to report {} after match {}: {}",
                self.id(),
                next,
                match_id,
                e
            );
        }
        self.publish_status().await;
    }

    fn match_duration(&self) -> Duration {
        let (min, max) = (self.config.match_min_ms, self.config.match_max_ms);
        let ms = if min >= max {
            min
        } else {
            rand::rng().random_range(min..=max)
        };
        Duration::from_millis(ms)
    }

    /// Spawn the heartbeat task; it ends once the server is `DOWN`
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let period = Duration::from_millis(node.config.heartbeat_interval_ms.max(1));
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            let mut status_rx = node.watch_status();
            loop {
                let status = *status_rx.borrow_and_update();
                if status == ServerStatus::Down {
                    break;
                }
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = node.heartbeat().await {
                            tracing::debug!("Heartbeat from '{}' failed: {}", node.id(), e);
                        }
                    }
                    changed = status_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Server '{}' stopped heartbeats", node.id());
        })
    }
}
