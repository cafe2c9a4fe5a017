/// Error types for the zenoh-matchmaker library
use thiserror::Error;

use crate::types::{ServerId, ServerStatus, StatusCode};

/// Result type alias for matchmaker operations
pub type Result<T> = std::result::Result<T, MatchmakerError>;

/// Errors that can occur in matchmaker operations
#[derive(Debug, Error)]
pub enum MatchmakerError {
    /// Zenoh-related errors
    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    /// Invalid server id provided
    #[error("Invalid server id: {0}. Must be a valid single-chunk keyexpr (no /, *, $, ?, #, @)")]
    InvalidServerId(String),

    /// Invalid keyexpr pattern
    #[error("Invalid keyexpr: {0}")]
    InvalidKeyexpr(String),

    /// Server id not present in the registry
    #[error("Server not found: {0}")]
    ServerNotFound(ServerId),

    /// Status value not acceptable for the requested operation
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Self-reported status change not allowed by the server state machine
    #[error("Invalid transition for {server}: from {from} to {to}")]
    InvalidTransition {
        /// Server that reported
        server: ServerId,
        /// Current registry status
        from: ServerStatus,
        /// Reported status
        to: ServerStatus,
    },

    /// Remote node did not answer
    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// Remote node answered with an error reply
    #[error("Remote error: {0}")]
    Remote(String),

    /// Operation timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatchmakerError {
    /// Whether this error comes from the transport rather than from request validation
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MatchmakerError::Zenoh(_)
                | MatchmakerError::Unreachable(_)
                | MatchmakerError::Remote(_)
                | MatchmakerError::Timeout(_)
        )
    }

    /// Status code reported to callers for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            MatchmakerError::ServerNotFound(_) => StatusCode::NotFound,
            MatchmakerError::InvalidTransition { .. } => StatusCode::InvalidTransition,
            MatchmakerError::InvalidStatus(_) => StatusCode::InvalidStatus,
            _ => StatusCode::Failure,
        }
    }
}
