//! Periodic matchmaking loop
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::coordinator::Coordinator;
use crate::error::{MatchmakerError, Result};

/// Commands that can be sent to the matchmaking loop
#[derive(Debug)]
pub enum LoopCommand {
    /// Run one round now and report the number of matches dispatched
    Tick(flume::Sender<usize>),
    /// Stop the loop
    Stop,
}

/// Background task running [`Coordinator::tick`] on a fixed period
///
/// Without a period the loop only runs rounds on demand via [`MatchmakingLoop::step`].
pub struct MatchmakingLoop {
    command_tx: flume::Sender<LoopCommand>,
    handle: JoinHandle<()>,
}

impl MatchmakingLoop {
    pub fn spawn(coordinator: Arc<Coordinator>, period: Option<Duration>) -> Self {
        let (command_tx, command_rx) = flume::unbounded();
        let handle = tokio::spawn(run(coordinator, period, command_rx));
        Self { command_tx, handle }
    }

    /// Get a sender for sending commands to the loop
    pub fn sender(&self) -> flume::Sender<LoopCommand> {
        self.command_tx.clone()
    }

    /// Run one round immediately, returning the number of matches dispatched
    pub async fn step(&self) -> Result<usize> {
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.command_tx
            .send_async(LoopCommand::Tick(reply_tx))
            .await
            .map_err(|_| MatchmakerError::Internal("Matchmaking loop stopped".to_string()))?;
        reply_rx
            .recv_async()
            .await
            .map_err(|_| MatchmakerError::Internal("Matchmaking loop stopped".to_string()))
    }

    /// Stop the loop and wait for it to exit
    ///
    /// Dispatches already started keep running to completion.
    pub async fn stop(self) -> Result<()> {
        let _ = self.command_tx.send_async(LoopCommand::Stop).await;
        self.handle
            .await
            .map_err(|e| MatchmakerError::Internal(format!("Matchmaking loop panicked: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run(
    coordinator: Arc<Coordinator>,
    period: Option<Duration>,
    command_rx: flume::Receiver<LoopCommand>,
) {
    // A zero period would make `interval_at` panic
    let period = period.map(|period| period.max(Duration::from_millis(1)));
    let mut ticker = period.map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    tracing::info!(
        "Matchmaking loop for '{}' started (period: {:?})",
        coordinator.id(),
        period
    );

    loop {
        tokio::select! {
            _ = async {
                match ticker.as_mut() {
                    Some(interval) => {
                        interval.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {
                let dispatched = coordinator.tick().await.len();
                if dispatched > 0 {
                    tracing::debug!("Matchmaking round dispatched {} match(es)", dispatched);
                }
            }
            result = command_rx.recv_async() => match result {
                Ok(LoopCommand::Tick(reply_tx)) => {
                    let dispatched = coordinator.tick().await.len();
                    let _ = reply_tx.send(dispatched);
                }
                Ok(LoopCommand::Stop) => {
                    tracing::info!("Matchmaking loop received Stop command, exiting");
                    break;
                }
                Err(_) => {
                    tracing::info!("Matchmaking loop command channel closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::clock::VectorClock;
    use crate::config::CoordinatorConfig;
    use crate::dispatch::MatchDispatcher;
    use crate::protocol::{
        AdminStatusRequest, AssignMatchRequest, AssignMatchResponse, QueuePlayerRequest,
        ServerStatusUpdate,
    };
    use crate::types::{PlayerId, ServerId, ServerStatus};

    struct Accepting;

    impl MatchDispatcher for Accepting {
        fn assign_match<'a>(
            &'a self,
            server: &'a ServerId,
            request: AssignMatchRequest,
        ) -> BoxFuture<'a, Result<AssignMatchResponse>> {
            Box::pin(async move {
                Ok(AssignMatchResponse {
                    message: "Match accepted".to_string(),
                    match_id: request.match_id,
                    player_ids: request.player_ids,
                    server_address: server.to_string(),
                    clock: request.clock,
                })
            })
        }
    }

    async fn setup(players: &[u32]) -> Arc<Coordinator> {
        let coordinator = Arc::new(Coordinator::new(CoordinatorConfig::default(), Arc::new(Accepting)));
        coordinator
            .update_server_status(ServerStatusUpdate {
                server_id: ServerId::from_name("S1").unwrap(),
                new_status: ServerStatus::Available,
                address: "S1:7000".to_string(),
                finished_match: None,
                clock: VectorClock::new(),
            })
            .await;
        for id in players {
            coordinator
                .queue_player(QueuePlayerRequest {
                    player_id: PlayerId(*id),
                    game_mode_preference: "1v1".to_string(),
                    clock: VectorClock::new(),
                })
                .await;
        }
        coordinator
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_manual_step() {
        let coordinator = setup(&[1, 2, 3]).await;
        let matchmaking = MatchmakingLoop::spawn(coordinator.clone(), None);

        assert_eq!(matchmaking.step().await.unwrap(), 1);
        // Only one server, now busy
        assert_eq!(matchmaking.step().await.unwrap(), 0);

        matchmaking.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_periodic_rounds() {
        let coordinator = setup(&[1, 2]).await;
        let matchmaking = MatchmakingLoop::spawn(coordinator.clone(), Some(Duration::from_millis(20)));

        let mut queue_len = usize::MAX;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            queue_len = coordinator
                .admin_system_status(AdminStatusRequest {
                    admin_id: "admin".to_string(),
                })
                .await
                .queue
                .len();
            if queue_len == 0 {
                break;
            }
        }
        assert_eq!(queue_len, 0);
        matchmaking.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_zero_period_keeps_running() {
        let coordinator = setup(&[1, 2]).await;
        let matchmaking = MatchmakingLoop::spawn(coordinator.clone(), Some(Duration::ZERO));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!matchmaking.is_finished());
        assert_eq!(matchmaking.step().await.unwrap(), 0);
        let status = coordinator
            .admin_system_status(AdminStatusRequest {
                admin_id: "admin".to_string(),
            })
            .await;
        assert!(status.queue.is_empty());
        matchmaking.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_stop_command() {
        let coordinator = setup(&[]).await;
        let matchmaking = MatchmakingLoop::spawn(coordinator, None);
        matchmaking.sender().send(LoopCommand::Stop).unwrap();

        for _ in 0..50 {
            if matchmaking.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matchmaking.is_finished());
        assert!(matchmaking.step().await.is_err());
    }
}
