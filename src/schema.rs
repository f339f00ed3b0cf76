use std::fmt;

use anyhow::{anyhow, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

use crate::model::MatchRecord;

pub const BOARD_SIZE: usize = 9;

/// Per-player marker. X always opens a round.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Type)]
#[sqlx(type_name = "symbol")]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::X => f.write_str("X"),
            Symbol::O => f.write_str("O"),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    #[serde(rename = "")]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Symbol::X),
            Cell::O => Some(Symbol::O),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Symbol> for Cell {
    fn from(symbol: Symbol) -> Self {
        match symbol {
            Symbol::X => Cell::X,
            Symbol::O => Cell::O,
        }
    }
}

/// Nine cells in row-major order. Serializes as `["", "X", "O", ...]`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Board([Cell; BOARD_SIZE]);

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [Cell; BOARD_SIZE]) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[Cell; BOARD_SIZE] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.0.get(index).copied()
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(|c| !c.is_empty())
    }

    /// Writes `symbol` into an empty in-range cell. Returns `false` and leaves
    /// the board untouched otherwise.
    pub fn place(&mut self, index: usize, symbol: Symbol) -> bool {
        match self.0.get_mut(index) {
            Some(cell) if cell.is_empty() => {
                *cell = symbol.into();
                true
            }
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "game_status", rename_all = "lowercase")]
pub enum Status {
    Playing,
    Finished,
}

/// Result of a finished round.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Outcome {
    X,
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl Outcome {
    pub fn winner(self) -> Option<Symbol> {
        match self {
            Outcome::X => Some(Symbol::X),
            Outcome::O => Some(Symbol::O),
            Outcome::Draw => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::X => "X",
            Outcome::O => "O",
            Outcome::Draw => "draw",
        }
    }
}

impl From<Symbol> for Outcome {
    fn from(symbol: Symbol) -> Self {
        match symbol {
            Symbol::X => Outcome::X,
            Symbol::O => Outcome::O,
        }
    }
}

impl TryFrom<&str> for Outcome {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        match s {
            "X" => Ok(Outcome::X),
            "O" => Ok(Outcome::O),
            "draw" => Ok(Outcome::Draw),
            _ => Err(anyhow!("Invalid outcome: {}", s)),
        }
    }
}

// For String
impl TryFrom<String> for Outcome {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Outcome::try_from(s.as_str())
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Continue,
    End,
}

#[derive(Deserialize, Debug, Default)]
pub struct Pagination {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
pub struct MoveRequest {
    pub player_id: String,
    // Signed so that negative positions surface as an invalid move.
    pub position: i64,
}

#[derive(Deserialize, Debug)]
pub struct PlayerRequest {
    pub player_id: String,
}

#[derive(Deserialize, Debug)]
pub struct PlayerQuery {
    pub player_id: String,
}

#[derive(Deserialize, Debug)]
pub struct ContinueRequest {
    pub player_id: String,
    pub decision: Decision,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct EndedResponse {
    pub ended: bool,
}

/// Outcome of a `join` or a match poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Waiting,
    Matched { game_id: Uuid, symbol: Symbol },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct MatchmakingResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_symbol: Option<Symbol>,
}

impl From<JoinOutcome> for MatchmakingResponse {
    fn from(outcome: JoinOutcome) -> Self {
        match outcome {
            JoinOutcome::Waiting => Self {
                matched: false,
                game_id: None,
                your_symbol: None,
            },
            JoinOutcome::Matched { game_id, symbol } => Self {
                matched: true,
                game_id: Some(game_id),
                your_symbol: Some(symbol),
            },
        }
    }
}

// For json response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GetGameSchema {
    pub id: Uuid,
    pub player_x_id: String,
    pub player_o_id: String,
    pub board: Board,
    pub current_turn: Symbol,
    pub status: Status,
    pub winner: Option<Outcome>,
    pub player_x_score: u32,
    pub player_o_score: u32,
    pub turn_started_at: DateTime<Utc>,
    pub time_left_ms: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GetGameSchema {
    pub fn new(m: &MatchRecord, turn_budget: chrono::Duration, now: DateTime<Utc>) -> Self {
        let time_left_ms = match m.status {
            Status::Playing => turn_budget
                .checked_sub(&m.turn_elapsed(now))
                .map_or(0, |left| left.num_milliseconds().max(0)),
            Status::Finished => 0,
        };
        Self {
            id: m.id,
            player_x_id: m.player_x.clone(),
            player_o_id: m.player_o.clone(),
            board: m.board,
            current_turn: m.current_turn,
            status: m.status,
            winner: m.winner,
            player_x_score: m.score_x,
            player_o_score: m.score_o,
            turn_started_at: m.turn_started_at,
            time_left_ms,
            version: m.version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Change notification pushed to live subscribers.
#[derive(Debug, Clone)]
pub enum GameEvent {
    Updated { game: MatchRecord },
    Ended { game_id: Uuid },
}

/// Messages a WebSocket client may send for its game.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Move { player_id: String, position: i64 },
    Timeout { player_id: String },
}

/// Messages pushed to a WebSocket client.
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Snapshot { game: GetGameSchema },
    Updated { game: GetGameSchema },
    Ended { game_id: Uuid },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_serializes_with_three_way_cells() {
        let mut board = Board::new();
        assert!(board.place(0, Symbol::X));
        assert!(board.place(4, Symbol::O));

        let json = serde_json::to_value(board).unwrap();
        assert_eq!(
            json,
            serde_json::json!(["X", "", "", "", "O", "", "", "", ""])
        );
    }

    #[test]
    fn place_rejects_occupied_and_out_of_range() {
        let mut board = Board::new();
        assert!(board.place(8, Symbol::O));
        assert!(!board.place(8, Symbol::X));
        assert!(!board.place(9, Symbol::X));
        assert_eq!(board.get(8), Some(Cell::O));
    }

    #[test]
    fn outcome_parses_db_text() {
        assert_eq!(Outcome::try_from("draw").unwrap(), Outcome::Draw);
        assert_eq!(Outcome::try_from("O".to_string()).unwrap(), Outcome::O);
        assert!(Outcome::try_from("tied").is_err());
    }

    #[test]
    fn matchmaking_response_omits_game_while_waiting() {
        let json = serde_json::to_value(MatchmakingResponse::from(JoinOutcome::Waiting)).unwrap();
        assert_eq!(json, serde_json::json!({ "matched": false }));
    }

    #[test]
    fn decision_uses_lowercase_names() {
        let d: Decision = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(d, Decision::Continue);
    }
}
