use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::GameError,
    model::MatchRecord,
    schema::{JoinOutcome, Symbol},
    store::GameStore,
};

/// Pairs waiting players first come, first served.
pub struct Matchmaker {
    store: Arc<dyn GameStore>,
    // Held across check, dequeue and create so two joiners never claim the
    // same entry or both end up queued.
    pairing: Mutex<()>,
}

impl Matchmaker {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            pairing: Mutex::new(()),
        }
    }

    /// Pairs `player_id` with the oldest waiting player, who plays X, or
    /// queues them when nobody is waiting.
    pub async fn join(&self, player_id: &str, now: DateTime<Utc>) -> Result<JoinOutcome, GameError> {
        let _pairing = self.pairing.lock().await;

        if self.store.is_waiting(player_id).await? {
            tracing::debug!(player_id, "Player already queued");
            return Ok(JoinOutcome::Waiting);
        }

        let Some(waiting) = self.store.dequeue_oldest(player_id).await? else {
            self.store.enqueue(player_id, now).await?;
            tracing::info!(player_id, "Player queued");
            return Ok(JoinOutcome::Waiting);
        };

        let record = MatchRecord::new(waiting.player_id.clone(), player_id, now);
        if let Err(e) = self.store.insert(&record).await {
            // Put the opponent back where they were.
            if let Err(requeue) = self
                .store
                .enqueue(&waiting.player_id, waiting.joined_at)
                .await
            {
                tracing::error!(
                    player_id = %waiting.player_id,
                    "Unable to requeue player: {}",
                    requeue
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            game_id = %record.id,
            player_x = %record.player_x,
            player_o = %record.player_o,
            "Players paired"
        );

        Ok(JoinOutcome::Matched {
            game_id: record.id,
            symbol: Symbol::O,
        })
    }

    pub async fn leave(&self, player_id: &str) -> Result<(), GameError> {
        if self.store.remove_by_player(player_id).await? {
            tracing::info!(player_id, "Player left queue");
        }
        Ok(())
    }

    /// Lets a waiting player discover that someone paired with them.
    pub async fn status(&self, player_id: &str) -> Result<JoinOutcome, GameError> {
        if self.store.is_waiting(player_id).await? {
            return Ok(JoinOutcome::Waiting);
        }

        Ok(match self.store.find_by_player(player_id).await? {
            Some(m) => match m.symbol_of(player_id) {
                Some(symbol) => JoinOutcome::Matched {
                    game_id: m.id,
                    symbol,
                },
                None => JoinOutcome::Waiting,
            },
            None => JoinOutcome::Waiting,
        })
    }
}
