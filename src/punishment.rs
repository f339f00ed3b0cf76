//! Mandatory wait before a lopsided match may start another round.
//!
//! The gate lives beside the match record and never writes to it: it only
//! decides whether a `continue` request may go through yet.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    error::GameError,
    model::MatchRecord,
    schema::{Outcome, Status},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PunishmentPolicy {
    pub threshold: u32,
    pub duration: Duration,
}

impl Default for PunishmentPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            duration: Duration::from_secs(10),
        }
    }
}

impl PunishmentPolicy {
    /// True when the finished round had a loser and the cumulative gap has
    /// reached the threshold. Whoever asks, the next round waits.
    pub fn applies(&self, record: &MatchRecord) -> bool {
        record.status == Status::Finished
            && record.winner.and_then(Outcome::winner).is_some()
            && record.score_gap() >= self.threshold
    }
}

#[derive(Debug, Default)]
pub struct PunishmentGate {
    policy: PunishmentPolicy,
    deadlines: DashMap<Uuid, Instant>,
}

impl PunishmentGate {
    pub fn new(policy: PunishmentPolicy) -> Self {
        Self {
            policy,
            deadlines: DashMap::new(),
        }
    }

    /// Lets the request through, or arms/keeps the wait and reports what is
    /// left of it.
    pub fn check(&self, record: &MatchRecord, now: Instant) -> Result<(), GameError> {
        if !self.policy.applies(record) {
            return Ok(());
        }
        self.prune(record.id, now);

        let deadline = *self
            .deadlines
            .entry(record.id)
            .or_insert_with(|| {
                tracing::info!(
                    game_id = %record.id,
                    gap = record.score_gap(),
                    "Punishment gate started"
                );
                now + self.policy.duration
            });

        match deadline.checked_duration_since(now) {
            Some(remaining) if !remaining.is_zero() => {
                Err(GameError::PunishmentPending { remaining })
            }
            _ => Ok(()),
        }
    }

    /// Forgets any wait armed for `game_id`.
    pub fn clear(&self, game_id: Uuid) {
        self.deadlines.remove(&game_id);
    }

    // Drops waits of other matches that ran out at least one full wait ago
    // and were never followed by a continue.
    fn prune(&self, keep: Uuid, now: Instant) {
        let grace = self.policy.duration;
        self.deadlines.retain(|id, deadline| {
            *id == keep || now.saturating_duration_since(*deadline) < grace
        });
    }
}
