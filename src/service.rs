use std::{sync::Arc, time::Instant};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    config::GameConfig,
    engine,
    error::GameError,
    matchmaking::Matchmaker,
    model::{MatchRecord, QueueEntry},
    punishment::PunishmentGate,
    schema::{Decision, GameEvent, JoinOutcome, Status},
    store::{GameStore, StoreError},
};

const MAX_ATTEMPTS: usize = 5;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    Continued(MatchRecord),
    Ended,
}

/// Entry point for everything a client can do to a match or the queue.
pub struct GameService {
    store: Arc<dyn GameStore>,
    matchmaker: Matchmaker,
    gate: PunishmentGate,
    config: GameConfig,
    tx: broadcast::Sender<GameEvent>,
}

impl GameService {
    pub fn new(store: Arc<dyn GameStore>, config: GameConfig) -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            matchmaker: Matchmaker::new(store.clone()),
            gate: PunishmentGate::new(config.punishment),
            store,
            config,
            tx,
        }
    }

    pub fn turn_budget(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.turn_budget).unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }

    pub async fn get_game(&self, game_id: Uuid) -> Result<MatchRecord, GameError> {
        Ok(self.store.get(game_id).await?)
    }

    pub async fn list_games(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MatchRecord>, GameError> {
        Ok(self.store.list(limit, offset).await?)
    }

    #[instrument(skip(self))]
    pub async fn make_move(
        &self,
        game_id: Uuid,
        player_id: &str,
        position: usize,
    ) -> Result<MatchRecord, GameError> {
        let m = self
            .mutate(game_id, |m| {
                engine::apply_move(m, player_id, position, Utc::now()).map(|_| ())
            })
            .await
            .inspect_err(|e| tracing::debug!("Move rejected: {}", e))?;

        match m.winner {
            Some(outcome) => tracing::info!(
                winner = outcome.as_str(),
                score_x = m.score_x,
                score_o = m.score_o,
                "Round finished"
            ),
            None => tracing::debug!(next = %m.current_turn, "Move applied"),
        }
        Ok(m)
    }

    /// Settles a turn that ran past the budget. Early signals and signals
    /// for a finished round leave the record as it is.
    #[instrument(skip(self))]
    pub async fn handle_timeout(
        &self,
        game_id: Uuid,
        player_id: &str,
    ) -> Result<MatchRecord, GameError> {
        let budget = self.turn_budget();
        let result = self
            .mutate(game_id, |m| {
                if m.symbol_of(player_id).is_none() {
                    return Err(GameError::NotAPlayer);
                }
                if m.status == Status::Playing
                    && !m.turn_expired(Utc::now(), budget)
                {
                    return Err(GameError::TurnNotExpired);
                }
                engine::apply_timeout(m).map(|_| ())
            })
            .await;

        match result {
            Ok(m) => {
                tracing::info!(
                    winner = m.winner.map(|w| w.as_str()),
                    score_x = m.score_x,
                    score_o = m.score_o,
                    "Turn timed out"
                );
                Ok(m)
            }
            Err(GameError::TurnNotExpired | GameError::AlreadyFinished) => {
                tracing::debug!("Timeout ignored");
                self.get_game(game_id).await
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn continue_round(
        &self,
        game_id: Uuid,
        player_id: &str,
        decision: Decision,
    ) -> Result<Continuation, GameError> {
        let current = self.store.get(game_id).await?;
        if current.symbol_of(player_id).is_none() {
            return Err(GameError::NotAPlayer);
        }

        match decision {
            Decision::End => {
                self.gate.clear(game_id);
                self.store.delete(game_id).await?;
                let _ = self.tx.send(GameEvent::Ended { game_id });
                tracing::info!(
                    score_x = current.score_x,
                    score_o = current.score_o,
                    "Match ended"
                );
                Ok(Continuation::Ended)
            }
            Decision::Continue => {
                self.gate.check(&current, Instant::now())?;
                let m = self
                    .mutate(game_id, |m| engine::continue_round(m, Utc::now()))
                    .await?;
                self.gate.clear(game_id);
                tracing::info!("New round started");
                Ok(Continuation::Continued(m))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn join_queue(&self, player_id: &str) -> Result<JoinOutcome, GameError> {
        self.matchmaker.join(player_id, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn leave_queue(&self, player_id: &str) -> Result<(), GameError> {
        self.matchmaker.leave(player_id).await
    }

    pub async fn match_status(&self, player_id: &str) -> Result<JoinOutcome, GameError> {
        self.matchmaker.status(player_id).await
    }

    pub async fn waiting(&self) -> Result<Vec<QueueEntry>, GameError> {
        Ok(self.store.list_waiting().await?)
    }

    /// Read, apply `f`, write back if nobody else wrote in between; otherwise
    /// start over from the fresh record.
    async fn mutate<F>(&self, game_id: Uuid, mut f: F) -> Result<MatchRecord, GameError>
    where
        F: FnMut(&mut MatchRecord) -> Result<(), GameError> + Send,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut m = self.store.get(game_id).await?;
            f(&mut m)?;

            match self.store.update(&m).await {
                Ok(saved) => {
                    let _ = self.tx.send(GameEvent::Updated {
                        game: saved.clone(),
                    });
                    return Ok(saved);
                }
                Err(StoreError::Conflict) => {
                    tracing::debug!(attempt, "Version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(%game_id, "Gave up after {} conflicting writes", MAX_ATTEMPTS);
        Err(GameError::Conflict)
    }
}
