//! Matchmaking queue and per-player status table

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::types::{MatchId, PlayerId, PlayerStatus};

/// Outcome of an enqueue request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Player appended to the tail
    Queued,
    /// Player was already waiting; queue unchanged
    AlreadyQueued,
}

/// Everything recorded about one player
#[derive(Debug, Clone, Default)]
pub(crate) struct PlayerRecord {
    pub(crate) status: PlayerStatus,
    /// When the player entered the queue; kept across a failed dispatch
    pub(crate) queued_at: Option<Instant>,
    /// Match and server address while `InMatch`
    pub(crate) assignment: Option<(MatchId, String)>,
}

/// A waiting player as shown in the admin snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Waiting player
    pub player_id: PlayerId,
    /// Time since the player entered the queue
    pub time_in_queue: Duration,
}

/// FIFO of waiting players plus the status of every player seen so far
///
/// A player id appears in `order` at most once.
#[derive(Debug, Default)]
pub(crate) struct PlayerQueue {
    order: VecDeque<PlayerId>,
    records: HashMap<PlayerId, PlayerRecord>,
}

impl PlayerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append `player` to the tail unless it is already waiting
    pub(crate) fn enqueue(&mut self, player: PlayerId) -> EnqueueOutcome {
        if self.order.contains(&player) {
            return EnqueueOutcome::AlreadyQueued;
        }
        self.order.push_back(player);
        let record = self.records.entry(player).or_default();
        record.status = PlayerStatus::InQueue;
        record.queued_at = Some(Instant::now());
        record.assignment = None;
        EnqueueOutcome::Queued
    }

    /// Recorded status, `Idle` for players never seen
    pub(crate) fn status(&self, player: PlayerId) -> PlayerStatus {
        self.records
            .get(&player)
            .map(|record| record.status)
            .unwrap_or_default()
    }

    pub(crate) fn record(&self, player: PlayerId) -> Option<&PlayerRecord> {
        self.records.get(&player)
    }

    /// Remove and return the two players at the head, or leave the queue untouched
    pub(crate) fn dequeue_pair(&mut self) -> Option<(PlayerId, PlayerId)> {
        if self.order.len() < 2 {
            return None;
        }
        let first = self.order.pop_front()?;
        let second = self.order.pop_front()?;
        Some((first, second))
    }

    /// Put `first` and `second` back at the head, in that order, as `InQueue`
    ///
    /// Any other occurrence of either id is dropped first so the queue stays duplicate-free.
    pub(crate) fn requeue_front(&mut self, first: PlayerId, second: PlayerId) {
        self.order.retain(|id| *id != first && *id != second);
        self.order.push_front(second);
        self.order.push_front(first);
        for player in [first, second] {
            let record = self.records.entry(player).or_default();
            record.status = PlayerStatus::InQueue;
            record.assignment = None;
            record.queued_at.get_or_insert_with(Instant::now);
        }
    }

    pub(crate) fn mark_in_match(&mut self, player: PlayerId, match_id: MatchId, address: &str) {
        let record = self.records.entry(player).or_default();
        record.status = PlayerStatus::InMatch;
        record.assignment = Some((match_id, address.to_string()));
    }

    /// Return an `InMatch` player to `Idle` if it is still in `match_id`
    pub(crate) fn release(&mut self, player: PlayerId, match_id: MatchId) -> bool {
        match self.records.get_mut(&player) {
            Some(record)
                if record.status == PlayerStatus::InMatch
                    && matches!(record.assignment, Some((id, _)) if id == match_id) =>
            {
                record.status = PlayerStatus::Idle;
                record.assignment = None;
                record.queued_at = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Waiting players in queue order
    pub(crate) fn entries(&self) -> Vec<QueueEntry> {
        self.order
            .iter()
            .map(|player| QueueEntry {
                player_id: *player,
                time_in_queue: self
                    .records
                    .get(player)
                    .and_then(|record| record.queued_at)
                    .map(|at| at.elapsed())
                    .unwrap_or_default(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> Vec<u32> {
        self.order.iter().map(|id| id.0).collect()
    }
}
