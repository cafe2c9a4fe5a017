//! Key expression types for coordinator and game-server endpoints

use std::str::FromStr;

use zenoh::key_expr::KeyExpr;

use crate::error::{MatchmakerError, Result};
use crate::types::ServerId;

/// Remote-call methods served by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorMethod {
    QueuePlayer,
    PlayerStatus,
    ServerStatus,
    AdminStatus,
    AdminServerState,
}

impl CoordinatorMethod {
    pub const ALL: [CoordinatorMethod; 5] = [
        CoordinatorMethod::QueuePlayer,
        CoordinatorMethod::PlayerStatus,
        CoordinatorMethod::ServerStatus,
        CoordinatorMethod::AdminStatus,
        CoordinatorMethod::AdminServerState,
    ];

    /// Keyexpr chunk of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatorMethod::QueuePlayer => "queue_player",
            CoordinatorMethod::PlayerStatus => "player_status",
            CoordinatorMethod::ServerStatus => "server_status",
            CoordinatorMethod::AdminStatus => "admin_status",
            CoordinatorMethod::AdminServerState => "admin_server_state",
        }
    }
}

impl std::fmt::Display for CoordinatorMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoordinatorMethod {
    type Err = MatchmakerError;

    fn from_str(s: &str) -> Result<Self> {
        CoordinatorMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| MatchmakerError::InvalidKeyexpr(format!("Unknown coordinator method '{}'", s)))
    }
}

/// Coordinator endpoint keyexpr
///
/// Pattern: `<prefix>/coordinator/<method>`, or `<prefix>/coordinator/*` when `method` is None
///
/// The coordinator declares one queryable on the wildcard form; clients query a specific method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyexprCoordinator {
    prefix: KeyExpr<'static>,
    method: Option<CoordinatorMethod>,
}

impl KeyexprCoordinator {
    pub fn new(prefix: impl Into<KeyExpr<'static>>, method: Option<CoordinatorMethod>) -> Self {
        Self {
            prefix: prefix.into(),
            method,
        }
    }

    pub fn prefix(&self) -> &KeyExpr<'static> {
        &self.prefix
    }

    pub fn method(&self) -> Option<CoordinatorMethod> {
        self.method
    }

    pub fn to_keyexpr(&self) -> Result<KeyExpr<'static>> {
        let method = self.method.map_or("*", |m| m.as_str());
        Ok(self.prefix.join(&format!("coordinator/{}", method))?)
    }
}

impl TryFrom<KeyExpr<'_>> for KeyexprCoordinator {
    type Error = MatchmakerError;

    fn try_from(keyexpr: KeyExpr<'_>) -> Result<Self> {
        let parts: Vec<&str> = keyexpr.as_str().split('/').collect();

        // Expected pattern: [...prefix]/coordinator/<method|*>
        if parts.len() < 3 || parts[parts.len() - 2] != "coordinator" {
            return Err(MatchmakerError::InvalidKeyexpr(format!(
                "Invalid coordinator keyexpr: {}",
                keyexpr.as_str()
            )));
        }

        let method = match parts[parts.len() - 1] {
            "*" => None,
            chunk => Some(chunk.parse()?),
        };
        let prefix = KeyExpr::try_from(parts[..parts.len() - 2].join("/"))?;
        Ok(Self { prefix, method })
    }
}

/// Game-server assignment keyexpr
///
/// Pattern: `<prefix>/server/<server_id>/assign_match`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyexprAssign {
    prefix: KeyExpr<'static>,
    server_id: ServerId,
}

impl KeyexprAssign {
    pub fn new(prefix: impl Into<KeyExpr<'static>>, server_id: ServerId) -> Self {
        Self {
            prefix: prefix.into(),
            server_id,
        }
    }

    pub fn prefix(&self) -> &KeyExpr<'static> {
        &self.prefix
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    pub fn to_keyexpr(&self) -> Result<KeyExpr<'static>> {
        Ok(self
            .prefix
            .join(&format!("server/{}/assign_match", self.server_id))?)
    }
}

impl TryFrom<KeyExpr<'_>> for KeyexprAssign {
    type Error = MatchmakerError;

    fn try_from(keyexpr: KeyExpr<'_>) -> Result<Self> {
        let parts: Vec<&str> = keyexpr.as_str().split('/').collect();

        // Expected pattern: [...prefix]/server/<server_id>/assign_match
        if parts.len() < 4
            || parts[parts.len() - 3] != "server"
            || parts[parts.len() - 1] != "assign_match"
        {
            return Err(MatchmakerError::InvalidKeyexpr(format!(
                "Invalid assignment keyexpr: {}",
                keyexpr.as_str()
            )));
        }

        let server_id = ServerId::from_name(parts[parts.len() - 2])?;
        let prefix = KeyExpr::try_from(parts[..parts.len() - 3].join("/"))?;
        Ok(Self { prefix, server_id })
    }
}
