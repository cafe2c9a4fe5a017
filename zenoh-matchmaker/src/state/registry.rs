//! Registry of game servers keyed by server id

use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::error::{MatchmakerError, Result};
use crate::types::{CurrentMatch, GameServerInfo, ServerId, ServerStatus};

/// Authoritative table of known game servers
///
/// Entries are ordered by server id, which is also the order in which available servers
/// are picked.
#[derive(Debug, Default)]
pub(crate) struct ServerRegistry {
    servers: BTreeMap<ServerId, GameServerInfo>,
}

impl ServerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replace or create the entry for `id` and stamp `last_update`
    ///
    /// An existing entry keeps its current match.
    pub(crate) fn upsert(&mut self, id: ServerId, address: String, status: ServerStatus) {
        let now = SystemTime::now();
        match self.servers.get_mut(&id) {
            Some(info) => {
                info.address = address;
                info.status = status;
                info.last_update = now;
            }
            None => {
                self.servers.insert(
                    id.clone(),
                    GameServerInfo {
                        id,
                        address,
                        status,
                        last_update: now,
                        current_match: None,
                    },
                );
            }
        }
    }

    /// Available server with the smallest id
    pub(crate) fn pick_available(&self) -> Option<&GameServerInfo> {
        self.servers
            .values()
            .find(|info| info.status == ServerStatus::Available)
    }

    /// Set the status of an existing entry, returning the previous status
    pub(crate) fn mark_status(&mut self, id: &ServerId, status: ServerStatus) -> Result<ServerStatus> {
        let info = self.get_mut(id)?;
        let previous = info.status;
        info.status = status;
        info.last_update = SystemTime::now();
        Ok(previous)
    }

    /// Record the match dispatched to `id`
    pub(crate) fn set_current_match(&mut self, id: &ServerId, current: Option<CurrentMatch>) -> Result<()> {
        self.get_mut(id)?.current_match = current;
        Ok(())
    }

    /// Clear and return the current match of `id`
    pub(crate) fn take_current_match(&mut self, id: &ServerId) -> Option<CurrentMatch> {
        self.servers
            .get_mut(id)
            .and_then(|info| info.current_match.take())
    }

    pub(crate) fn get(&self, id: &ServerId) -> Option<&GameServerInfo> {
        self.servers.get(id)
    }

    /// Entries in id order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &GameServerInfo> {
        self.servers.values()
    }

    fn get_mut(&mut self, id: &ServerId) -> Result<&mut GameServerInfo> {
        self.servers
            .get_mut(id)
            .ok_or_else(|| MatchmakerError::ServerNotFound(id.clone()))
    }
}
