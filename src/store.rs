use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{MatchRecord, QueueEntry};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record was modified concurrently")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence for match records and the matchmaking queue.
///
/// Reads must be strongly consistent. `update` is a compare-and-swap on
/// `MatchRecord::version`.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<MatchRecord, StoreError>;

    async fn insert(&self, record: &MatchRecord) -> Result<(), StoreError>;

    /// Writes `record` if the stored version still equals `record.version`,
    /// returning the stored copy with its version bumped. Fails with
    /// `Conflict` when someone else wrote first.
    async fn update(&self, record: &MatchRecord) -> Result<MatchRecord, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MatchRecord>, StoreError>;

    /// Most recently created match involving `player_id`.
    async fn find_by_player(&self, player_id: &str) -> Result<Option<MatchRecord>, StoreError>;

    /// Adds a queue entry unless the player already has one. Returns whether
    /// an entry was added.
    async fn enqueue(&self, player_id: &str, joined_at: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// Removes and returns the oldest entry that does not belong to `exclude`.
    async fn dequeue_oldest(&self, exclude: &str) -> Result<Option<QueueEntry>, StoreError>;

    async fn remove_by_player(&self, player_id: &str) -> Result<bool, StoreError>;

    async fn list_waiting(&self) -> Result<Vec<QueueEntry>, StoreError>;

    async fn is_waiting(&self, player_id: &str) -> Result<bool, StoreError>;
}
