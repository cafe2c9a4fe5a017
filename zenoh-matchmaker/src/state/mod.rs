//! The coordinator's shared state: queue, registry, global clock and match counter
//!
//! `SystemState` is only ever reached through the coordinator's guard; every method here
//! assumes exclusive access and never awaits.

mod queue;
mod registry;

pub use queue::{EnqueueOutcome, QueueEntry};

use queue::PlayerQueue;
use registry::ServerRegistry;

use crate::clock::VectorClock;
use crate::error::{MatchmakerError, Result};
use crate::protocol::{PlayerStatusResponse, ServerState, ServerStatusUpdate, SystemStatus};
use crate::types::{
    CurrentMatch, MatchAssignment, MatchId, PlayerId, PlayerStatus, ServerId, ServerStatus,
};

/// How a server self-report was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReportOutcome {
    /// Registry status before the report, `None` for a first registration
    pub(crate) previous: Option<ServerStatus>,
    /// Registry status after the report
    pub(crate) current: ServerStatus,
}

/// Aggregate of all mutable coordinator state
#[derive(Debug)]
pub(crate) struct SystemState {
    /// Key of the coordinator in the vector clock
    coordinator_id: String,
    queue: PlayerQueue,
    registry: ServerRegistry,
    clock: VectorClock,
    next_match_id: MatchId,
}

impl SystemState {
    pub(crate) fn new(coordinator_id: impl Into<String>) -> Self {
        let coordinator_id = coordinator_id.into();
        let clock = [(coordinator_id.clone(), 0)].into_iter().collect();
        Self {
            coordinator_id,
            queue: PlayerQueue::new(),
            registry: ServerRegistry::new(),
            clock,
            next_match_id: 1,
        }
    }

    pub(crate) fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Merge a clock carried by an incoming message
    pub(crate) fn observe(&mut self, remote: &VectorClock) {
        self.clock.absorb(remote);
    }

    /// Count one coordinator event
    fn tick(&mut self) {
        self.clock.tick(&self.coordinator_id);
    }

    /// Handle a queue request: merge, enqueue, tick
    pub(crate) fn enqueue(&mut self, player: PlayerId, remote: &VectorClock) -> EnqueueOutcome {
        self.observe(remote);
        let outcome = self.queue.enqueue(player);
        self.tick();
        outcome
    }

    /// Handle a status query: merge only, reads do not tick
    pub(crate) fn player_status(&mut self, player: PlayerId, remote: &VectorClock) -> PlayerStatusResponse {
        self.observe(remote);
        let status = self.queue.status(player);
        let assignment = self
            .queue
            .record(player)
            .and_then(|record| record.assignment.clone())
            .filter(|_| status == PlayerStatus::InMatch);
        PlayerStatusResponse {
            status,
            match_id: assignment.as_ref().map(|(match_id, _)| *match_id),
            server_address: assignment.map(|(_, address)| address),
            clock: self.clock.clone(),
        }
    }

    /// Apply a server self-report
    ///
    /// The clock is merged and ticked whatever the outcome. A report that ends a match
    /// releases its players.
    pub(crate) fn report_server(&mut self, update: &ServerStatusUpdate) -> Result<ReportOutcome> {
        self.observe(&update.clock);
        let result = self.apply_report(update);
        self.tick();
        result
    }

    fn apply_report(&mut self, update: &ServerStatusUpdate) -> Result<ReportOutcome> {
        let (previous, pending) = match self.registry.get(&update.server_id) {
            Some(info) => {
                if !info.status.can_transition_to(update.new_status) {
                    return Err(MatchmakerError::InvalidTransition {
                        server: update.server_id.clone(),
                        from: info.status,
                        to: update.new_status,
                    });
                }
                (Some(info.status), info.current_match.map(|m| m.match_id))
            }
            None if update.new_status == ServerStatus::Available => (None, None),
            None => return Err(MatchmakerError::ServerNotFound(update.server_id.clone())),
        };

        // AVAILABLE only ends the dispatched match once the server names it as finished;
        // until then the report is a heartbeat that may predate the assignment
        let current = match (pending, previous) {
            (Some(match_id), Some(status))
                if update.new_status == ServerStatus::Available
                    && update.finished_match != Some(match_id) =>
            {
                status
            }
            _ => update.new_status,
        };

        self.registry
            .upsert(update.server_id.clone(), update.address.clone(), current);

        if previous == Some(ServerStatus::Busy) && current != ServerStatus::Busy {
            self.release_match_of(&update.server_id);
        }
        Ok(ReportOutcome { previous, current })
    }

    /// Form the next match if two players and an available server exist
    ///
    /// Marks both players `InMatch` and the server `Busy`, ticks the clock and returns the
    /// assignment together with the clock to send along.
    pub(crate) fn next_match(&mut self) -> Option<(MatchAssignment, VectorClock)> {
        if self.queue.len() < 2 {
            return None;
        }
        let (server_id, server_address) = self
            .registry
            .pick_available()
            .map(|info| (info.id.clone(), info.address.clone()))?;
        let players = self.queue.dequeue_pair()?;

        let match_id = self.next_match_id;
        self.next_match_id += 1;

        self.queue.mark_in_match(players.0, match_id, &server_address);
        self.queue.mark_in_match(players.1, match_id, &server_address);
        // The server was just picked from the registry, so both updates find it
        let _ = self.registry.mark_status(&server_id, ServerStatus::Busy);
        let _ = self
            .registry
            .set_current_match(&server_id, Some(CurrentMatch { match_id, players }));
        self.tick();

        Some((
            MatchAssignment {
                match_id,
                players,
                server_id,
                server_address,
            },
            self.clock.clone(),
        ))
    }

    /// Roll back a match whose dispatch failed
    ///
    /// The server goes `Down`, the players return to the head of the queue in their
    /// original order.
    pub(crate) fn recover(&mut self, assignment: &MatchAssignment) {
        if let Some(info) = self.registry.get(&assignment.server_id) {
            if info.current_match.map(|m| m.match_id) == Some(assignment.match_id) {
                self.registry.take_current_match(&assignment.server_id);
            }
        }
        let _ = self
            .registry
            .mark_status(&assignment.server_id, ServerStatus::Down);
        self.queue
            .requeue_front(assignment.players.0, assignment.players.1);
        self.tick();
    }

    /// Admin override: set any known server to `Available` or `Down`
    ///
    /// Bypasses the state machine. Releases the players of a match the server was holding.
    pub(crate) fn force_server(&mut self, id: &ServerId, status: ServerStatus) -> Result<ServerStatus> {
        if !status.is_forceable() {
            return Err(MatchmakerError::InvalidStatus(format!(
                "{} cannot be forced, use AVAILABLE or DOWN",
                status
            )));
        }
        let previous = self.registry.mark_status(id, status)?;
        self.release_match_of(id);
        self.tick();
        Ok(previous)
    }

    fn release_match_of(&mut self, id: &ServerId) {
        if let Some(current) = self.registry.take_current_match(id) {
            self.queue.release(current.players.0, current.match_id);
            self.queue.release(current.players.1, current.match_id);
        }
    }

    /// Read-only view for the admin interface
    pub(crate) fn snapshot(&self) -> SystemStatus {
        SystemStatus {
            servers: self
                .registry
                .iter()
                .map(|info| ServerState {
                    id: info.id.clone(),
                    status: info.status,
                    address: info.address.clone(),
                    current_match_id: info.current_match.map(|m| m.match_id),
                    last_update: info.last_update,
                })
                .collect(),
            queue: self.queue.entries(),
            clock: self.clock.clone(),
        }
    }
}
