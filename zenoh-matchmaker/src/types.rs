//! Core domain types shared by the coordinator, the game-server node and the wire protocol

use std::str::FromStr;
use std::time::SystemTime;

use crate::error::{MatchmakerError, Result};
use crate::name_generator;

/// Player identifier as assigned by the player client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PlayerId {
    fn from(id: u32) -> Self {
        PlayerId(id)
    }
}

/// Match identifier, allocated by the coordinator starting at 1
pub type MatchId = u64;

/// Unique game-server identifier
///
/// ServerId is used as a keyexpr chunk, so it must be:
/// - Non-empty UTF-8 string
/// - Free of: / * $ ? # @
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(String);

impl ServerId {
    /// Generate a readable server id such as `Veltar_42`
    pub fn generate() -> Self {
        ServerId(name_generator::generate_server_name())
    }

    /// Create from a specific name, rejecting characters that would break keyexprs
    pub fn from_name(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(ServerId(name))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<()> {
        if s.is_empty() {
            return Err(MatchmakerError::InvalidServerId(
                "Server id cannot be empty".to_string(),
            ));
        }
        if let Some(ch) = s
            .chars()
            .find(|ch| matches!(ch, '/' | '*' | '$' | '?' | '#' | '@'))
        {
            return Err(MatchmakerError::InvalidServerId(format!(
                "Server id '{}' contains invalid character '{}'",
                s, ch
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerId {
    type Err = MatchmakerError;

    fn from_str(s: &str) -> Result<Self> {
        ServerId::from_name(s)
    }
}

/// Queue status of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    /// Not queued and not playing
    #[default]
    Idle,
    /// Waiting in the matchmaking queue
    InQueue,
    /// Assigned to a match
    InMatch,
}

impl PlayerStatus {
    /// Wire/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Idle => "IDLE",
            PlayerStatus::InQueue => "IN_QUEUE",
            PlayerStatus::InMatch => "IN_MATCH",
        }
    }
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a game server in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Ready to receive a match
    Available,
    /// Running a match (or a dispatch is in flight)
    Busy,
    /// Failed; only an admin override brings it back
    Down,
}

impl ServerStatus {
    /// Wire/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Available => "AVAILABLE",
            ServerStatus::Busy => "BUSY",
            ServerStatus::Down => "DOWN",
        }
    }

    /// Whether a server may self-report a change from `self` to `next`
    ///
    /// Same-state reports are heartbeats. Leaving `Down` is reserved to the admin override.
    pub fn can_transition_to(self, next: ServerStatus) -> bool {
        use ServerStatus::*;
        matches!(
            (self, next),
            (Available, Available)
                | (Busy, Busy)
                | (Down, Down)
                | (Available, Busy)
                | (Busy, Available)
                | (Busy, Down)
        )
    }

    /// Whether an admin may force a server into this status
    pub fn is_forceable(self) -> bool {
        matches!(self, ServerStatus::Available | ServerStatus::Down)
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = MatchmakerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" => Ok(ServerStatus::Available),
            "BUSY" => Ok(ServerStatus::Busy),
            "DOWN" => Ok(ServerStatus::Down),
            other => Err(MatchmakerError::InvalidStatus(format!(
                "'{}' is not one of AVAILABLE, BUSY, DOWN",
                other
            ))),
        }
    }
}

/// Structured outcome code returned by status-changing calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Request applied
    Success,
    /// Referenced server is unknown
    NotFound,
    /// Requested status is not allowed here
    InvalidStatus,
    /// Requested change violates the server state machine
    InvalidTransition,
    /// Any other failure
    Failure,
}

impl StatusCode {
    /// Wire/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::InvalidStatus => "INVALID_STATUS",
            StatusCode::InvalidTransition => "INVALID_TRANSITION",
            StatusCode::Failure => "FAILURE",
        }
    }

    /// Whether the code reports success
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entry for one game server
#[derive(Debug, Clone, PartialEq)]
pub struct GameServerInfo {
    /// Server identifier
    pub id: ServerId,
    /// Address players use to join the server's matches
    pub address: String,
    /// Current status
    pub status: ServerStatus,
    /// Time of the last self-report or override
    pub last_update: SystemTime,
    /// Match dispatched to this server, if any
    pub current_match: Option<CurrentMatch>,
}

/// Match currently held by a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentMatch {
    /// Match identifier
    pub match_id: MatchId,
    /// The two players of the match
    pub players: (PlayerId, PlayerId),
}

/// A pairing produced by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAssignment {
    /// Match identifier
    pub match_id: MatchId,
    /// The two players, head of queue first
    pub players: (PlayerId, PlayerId),
    /// Server chosen to host the match
    pub server_id: ServerId,
    /// Address of the chosen server
    pub server_address: String,
}
