//! # zenoh-matchmaker
//!
//! A matchmaking coordinator for two-player matches, with simulated game servers, built on
//! top of Zenoh.
//!
//! ## Overview
//!
//! Players ask the coordinator to be queued. On every round the coordinator pairs the two
//! players at the head of the queue with the available game server of smallest id, marks
//! both sides as matched and sends the server an `AssignMatch`. If the server cannot be
//! reached after a bounded number of attempts it is marked `DOWN` and the players go back to
//! the head of the queue. Game servers report their own status; only an administrator can
//! bring a `DOWN` server back.
//!
//! Every message carries a vector clock so that events across the coordinator, servers and
//! players can be ordered causally.
//!
//! ## Key Features
//!
//! - FIFO queue with idempotent enqueue and priority requeue on failure
//! - Server registry with a self-report state machine and admin overrides
//! - Concurrent dispatch with per-attempt timeout, retries and rollback
//! - Remote calls over zenoh query/queryable with `zenoh-ext` serialization
//! - Simulated game servers with pluggable fault injection
//!
//! ## Example
//!
//! ```rust,no_run
//! use zenoh_matchmaker::SessionExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let session = zenoh::open(zenoh::Config::default()).await?;
//!
//!     // Coordinator running a matchmaking round every second
//!     let coordinator = session.declare_coordinator().tick_interval_ms(1000).await?;
//!
//!     // A game server registering with it
//!     let server = session
//!         .declare_game_server()
//!         .name("GameServer1".to_string())?
//!         .address("127.0.0.1:7001")
//!         .await?;
//!     println!("Server '{}' registered", server.node().id());
//!
//!     server.stop();
//!     coordinator.stop().await?;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod game_server;
mod name_generator;
pub mod network;
pub mod protocol;
pub mod scheduler;
mod session_ext;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use clock::VectorClock;
pub use config::{CoordinatorConfig, GameServerConfig};
pub use coordinator::{Coordinator, DispatchOutcome};
pub use dispatch::{MatchDispatcher, RetryPolicy};
pub use error::{MatchmakerError, Result};
pub use game_server::{FaultPolicy, GameServerNode, NeverFail, RandomFaults, StatusReporter};
pub use network::{CoordinatorClient, ZenohDispatcher};
pub use scheduler::{LoopCommand, MatchmakingLoop};
pub use session_ext::{
    CoordinatorBuilder, CoordinatorService, GameServerBuilder, GameServerService, SessionExt,
};
pub use types::{
    GameServerInfo, MatchAssignment, MatchId, PlayerId, PlayerStatus, ServerId, ServerStatus,
    StatusCode,
};
