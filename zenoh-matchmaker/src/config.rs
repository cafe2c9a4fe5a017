//! Configuration for the coordinator and the game-server node

use std::time::Duration;

use zenoh::key_expr::KeyExpr;

use crate::types::ServerId;

/// Default key expression prefix for all matchmaking traffic
pub const DEFAULT_PREFIX: &str = "zenoh/matchmaker";

fn default_prefix() -> KeyExpr<'static> {
    KeyExpr::try_from(DEFAULT_PREFIX)
        .expect("default prefix is a valid keyexpr")
        .into_owned()
}

/// Configuration of the matchmaking coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Name of the coordinator in vector clocks
    pub coordinator_id: String,

    /// Period of the matchmaking loop in milliseconds
    pub tick_interval_ms: u64,

    /// Timeout of one `AssignMatch` attempt in milliseconds
    pub dispatch_timeout_ms: u64,

    /// Number of `AssignMatch` attempts before the server is declared down
    pub dispatch_attempts: u32,

    /// Backoff between attempts in milliseconds, multiplied by the attempt number
    pub retry_backoff_ms: u64,

    /// Key expression prefix for coordinator and game-server endpoints
    pub keyexpr_prefix: KeyExpr<'static>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            coordinator_id: "Matchmaker".to_string(),
            tick_interval_ms: 2000,
            dispatch_timeout_ms: 5000,
            dispatch_attempts: 3,
            retry_backoff_ms: 200,
            keyexpr_prefix: default_prefix(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coordinator name used in vector clocks
    pub fn with_coordinator_id(mut self, id: impl Into<String>) -> Self {
        self.coordinator_id = id.into();
        self
    }

    /// Set the matchmaking period in milliseconds
    pub fn with_tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms;
        self
    }

    /// Set the per-attempt dispatch timeout in milliseconds
    pub fn with_dispatch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.dispatch_timeout_ms = timeout_ms;
        self
    }

    /// Set the number of dispatch attempts (at least one)
    pub fn with_dispatch_attempts(mut self, attempts: u32) -> Self {
        self.dispatch_attempts = attempts.max(1);
        self
    }

    /// Set the retry backoff in milliseconds
    pub fn with_retry_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.retry_backoff_ms = backoff_ms;
        self
    }

    /// Set the key expression prefix
    pub fn with_keyexpr_prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.keyexpr_prefix = prefix;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Configuration of a game-server node
#[derive(Debug, Clone)]
pub struct GameServerConfig {
    /// Server identifier (auto-generated by default)
    pub server_id: ServerId,

    /// Address reported to the coordinator and handed to matched players
    pub address: String,

    /// Minimum simulated match duration in milliseconds
    pub match_min_ms: u64,

    /// Maximum simulated match duration in milliseconds
    pub match_max_ms: u64,

    /// Period of status heartbeats in milliseconds
    pub heartbeat_interval_ms: u64,

    /// Key expression prefix shared with the coordinator
    pub keyexpr_prefix: KeyExpr<'static>,
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            server_id: ServerId::generate(),
            address: "localhost:7000".to_string(),
            match_min_ms: 10_000,
            match_max_ms: 20_000,
            heartbeat_interval_ms: 5000,
            keyexpr_prefix: default_prefix(),
        }
    }
}

impl GameServerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_id(mut self, server_id: ServerId) -> Self {
        self.server_id = server_id;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the simulated match duration range; bounds are swapped if reversed
    pub fn with_match_duration_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.match_min_ms = min_ms.min(max_ms);
        self.match_max_ms = min_ms.max(max_ms);
        self
    }

    /// Set the heartbeat period in milliseconds
    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self
    }

    /// Set the key expression prefix
    pub fn with_keyexpr_prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.keyexpr_prefix = prefix;
        self
    }
}
