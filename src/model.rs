use anyhow::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::schema::{Board, Outcome, Status, Symbol};

/// State of one pairing, kept across rounds until a player ends the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub player_x: String,
    pub player_o: String,
    pub board: Board,
    pub current_turn: Symbol,
    pub status: Status,
    pub winner: Option<Outcome>,
    pub score_x: u32,
    pub score_o: u32,
    pub turn_started_at: DateTime<Utc>,
    /// Bumped by the store on every successful write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(player_x: impl Into<String>, player_o: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_x: player_x.into(),
            player_o: player_o.into(),
            board: Board::new(),
            current_turn: Symbol::X,
            status: Status::Playing,
            winner: None,
            score_x: 0,
            score_o: 0,
            turn_started_at: now,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn symbol_of(&self, player_id: &str) -> Option<Symbol> {
        if self.player_x == player_id {
            Some(Symbol::X)
        } else if self.player_o == player_id {
            Some(Symbol::O)
        } else {
            None
        }
    }

    pub fn player(&self, symbol: Symbol) -> &str {
        match symbol {
            Symbol::X => &self.player_x,
            Symbol::O => &self.player_o,
        }
    }

    pub fn score_gap(&self) -> u32 {
        self.score_x.abs_diff(self.score_o)
    }

    pub(crate) fn award(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::X => self.score_x += 1,
            Symbol::O => self.score_o += 1,
        }
    }

    pub fn turn_elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.turn_started_at
    }

    pub fn turn_expired(&self, now: DateTime<Utc>, budget: chrono::Duration) -> bool {
        self.status == Status::Playing && self.turn_elapsed(now) >= budget
    }
}

// For sqlx
#[derive(Debug, sqlx::FromRow)]
pub struct GameModel {
    pub id: Uuid,
    pub player_x_id: String,
    pub player_o_id: String,
    pub board: Json<Board>,
    pub current_turn: Symbol,
    pub status: Status,
    pub winner: Option<String>,
    pub player_x_score: i32,
    pub player_o_score: i32,
    pub turn_started_at: DateTime<Utc>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<GameModel> for MatchRecord {
    type Error = Error;

    fn try_from(m: GameModel) -> Result<Self, Self::Error> {
        Ok(Self {
            id: m.id,
            player_x: m.player_x_id,
            player_o: m.player_o_id,
            board: m.board.0,
            current_turn: m.current_turn,
            status: m.status,
            winner: m.winner.map(Outcome::try_from).transpose()?,
            score_x: u32::try_from(m.player_x_score)?,
            score_o: u32::try_from(m.player_o_score)?,
            turn_started_at: m.turn_started_at,
            version: m.version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub player_id: String,
    pub joined_at: DateTime<Utc>,
}
