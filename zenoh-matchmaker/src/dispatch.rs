//! Delivery of match assignments to game servers

use std::time::Duration;

use futures::future::BoxFuture;

use crate::config::CoordinatorConfig;
use crate::error::{MatchmakerError, Result};
use crate::protocol::{AssignMatchRequest, AssignMatchResponse};
use crate::types::ServerId;

/// Transport used by the coordinator to send `AssignMatch` to a game server
///
/// Implemented over zenoh by [`crate::network::ZenohDispatcher`]; tests plug in
/// in-process dispatchers.
pub trait MatchDispatcher: Send + Sync {
    fn assign_match<'a>(
        &'a self,
        server: &'a ServerId,
        request: AssignMatchRequest,
    ) -> BoxFuture<'a, Result<AssignMatchResponse>>;
}

/// Bounded retries with a per-attempt timeout and linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            attempts: config.dispatch_attempts.max(1),
            timeout: Duration::from_millis(config.dispatch_timeout_ms),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Send `request` to `server` until one attempt succeeds
    ///
    /// A reply for a different match counts as a failed attempt. Returns the last error once
    /// all attempts are exhausted.
    pub async fn assign(
        &self,
        dispatcher: &dyn MatchDispatcher,
        server: &ServerId,
        request: &AssignMatchRequest,
    ) -> Result<AssignMatchResponse> {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let call = dispatcher.assign_match(server, request.clone());
            let error = match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(response)) if response.match_id == request.match_id => return Ok(response),
                Ok(Ok(response)) => MatchmakerError::Internal(format!(
                    "Server '{}' acknowledged match {} instead of {}",
                    server, response.match_id, request.match_id
                )),
                Ok(Err(e)) => e,
                Err(_) => MatchmakerError::Timeout(format!(
                    "AssignMatch to '{}' took longer than {:?}",
                    server, self.timeout
                )),
            };
            tracing::warn!(
                "AssignMatch {} to '{}' failed (attempt {}/{}): {}",
                request.match_id,
                server,
                attempt,
                attempts,
                error
            );
            last_error = Some(error);

            if attempt < attempts {
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            MatchmakerError::Internal(format!("No AssignMatch attempt made to '{}'", server))
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::clock::VectorClock;
    use crate::types::PlayerId;

    /// Fails the first `failures` calls, then acknowledges
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl MatchDispatcher for Flaky {
        fn assign_match<'a>(
            &'a self,
            server: &'a ServerId,
            request: AssignMatchRequest,
        ) -> BoxFuture<'a, Result<AssignMatchResponse>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.failures {
                    return Err(MatchmakerError::Unreachable(server.to_string()));
                }
                Ok(AssignMatchResponse {
                    message: "Match accepted".to_string(),
                    match_id: request.match_id,
                    player_ids: request.player_ids,
                    server_address: "addr".to_string(),
                    clock: VectorClock::new(),
                })
            })
        }
    }

    /// Never answers
    struct Silent;

    impl MatchDispatcher for Silent {
        fn assign_match<'a>(
            &'a self,
            _server: &'a ServerId,
            _request: AssignMatchRequest,
        ) -> BoxFuture<'a, Result<AssignMatchResponse>> {
            Box::pin(futures::future::pending::<Result<AssignMatchResponse>>())
        }
    }

    fn request() -> AssignMatchRequest {
        AssignMatchRequest {
            match_id: 1,
            player_ids: (PlayerId(1), PlayerId(2)),
            clock: VectorClock::new(),
        }
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_retry_until_success() {
        let dispatcher = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let server = ServerId::from_name("S1").unwrap();
        let response = policy(3).assign(&dispatcher, &server, &request()).await.unwrap();
        assert_eq!(response.match_id, 1);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_attempts_are_bounded() {
        let dispatcher = Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let server = ServerId::from_name("S1").unwrap();
        let err = policy(2).assign(&dispatcher, &server, &request()).await.unwrap_err();
        assert!(matches!(err, MatchmakerError::Unreachable(_)));
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_silent_server_times_out() {
        let server = ServerId::from_name("S1").unwrap();
        let err = policy(1).assign(&Silent, &server, &request()).await.unwrap_err();
        assert!(matches!(err, MatchmakerError::Timeout(_)));
    }
}
