use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    model::{MatchRecord, QueueEntry},
    store::{GameStore, StoreError},
};

/// Process-local store. Each record is guarded by its map shard, so the
/// version check and the write in `update` happen under one lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: DashMap<Uuid, MatchRecord>,
    queue: Mutex<VecDeque<QueueEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<MatchRecord, StoreError> {
        self.games
            .get(&id)
            .map(|m| m.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, record: &MatchRecord) -> Result<(), StoreError> {
        match self.games.entry(record.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, record: &MatchRecord) -> Result<MatchRecord, StoreError> {
        let mut stored = self.games.get_mut(&record.id).ok_or(StoreError::NotFound)?;
        if stored.version != record.version {
            return Err(StoreError::Conflict);
        }

        let mut next = record.clone();
        next.version += 1;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.games
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MatchRecord>, StoreError> {
        let mut games: Vec<MatchRecord> = self.games.iter().map(|m| m.clone()).collect();
        games.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(games.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_player(&self, player_id: &str) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self
            .games
            .iter()
            .filter(|m| m.symbol_of(player_id).is_some())
            .max_by_key(|m| m.created_at)
            .map(|m| m.clone()))
    }

    async fn enqueue(
        &self,
        player_id: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut queue = self.queue.lock().await;
        if queue.iter().any(|e| e.player_id == player_id) {
            return Ok(false);
        }

        // Keep FIFO by timestamp; a re-queued entry slots back into its place.
        let at = queue.partition_point(|e| e.joined_at <= joined_at);
        queue.insert(
            at,
            QueueEntry {
                player_id: player_id.to_owned(),
                joined_at,
            },
        );
        Ok(true)
    }

    async fn dequeue_oldest(&self, exclude: &str) -> Result<Option<QueueEntry>, StoreError> {
        let mut queue = self.queue.lock().await;
        let Some(at) = queue.iter().position(|e| e.player_id != exclude) else {
            return Ok(None);
        };
        Ok(queue.remove(at))
    }

    async fn remove_by_player(&self, player_id: &str) -> Result<bool, StoreError> {
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|e| e.player_id != player_id);
        Ok(queue.len() != before)
    }

    async fn list_waiting(&self) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self.queue.lock().await.iter().cloned().collect())
    }

    async fn is_waiting(&self, player_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .queue
            .lock()
            .await
            .iter()
            .any(|e| e.player_id == player_id))
    }
}
