//! Round state machine. Every function here validates first and mutates
//! only on success, so a rejected call leaves the record untouched.

use chrono::{DateTime, Utc};

use crate::{
    error::GameError,
    model::MatchRecord,
    rules,
    schema::{Board, Outcome, Status, Symbol},
};

/// Places the acting player's symbol at `index` and settles the round if the
/// move ends it.
pub fn apply_move(
    record: &mut MatchRecord,
    player_id: &str,
    index: usize,
    now: DateTime<Utc>,
) -> Result<Option<Outcome>, GameError> {
    if record.status == Status::Finished {
        return Err(GameError::AlreadyFinished);
    }

    let symbol = record.current_turn;
    if record.player(symbol) != player_id {
        return Err(GameError::NotYourTurn);
    }

    if !record.board.place(index, symbol) {
        return Err(GameError::InvalidMove);
    }

    match rules::evaluate(&record.board) {
        None => {
            record.current_turn = symbol.opponent();
            record.turn_started_at = now;
            Ok(None)
        }
        Some(outcome) => {
            finish(record, outcome);
            Ok(Some(outcome))
        }
    }
}

/// Ends the round in favour of whoever is not on turn. The caller is
/// responsible for deciding that the turn actually ran out.
pub fn apply_timeout(record: &mut MatchRecord) -> Result<Symbol, GameError> {
    if record.status == Status::Finished {
        return Err(GameError::AlreadyFinished);
    }

    let winner = record.current_turn.opponent();
    finish(record, winner.into());
    Ok(winner)
}

/// Resets a finished record for another round. Scores carry over.
pub fn continue_round(record: &mut MatchRecord, now: DateTime<Utc>) -> Result<(), GameError> {
    if record.status != Status::Finished {
        return Err(GameError::RoundInProgress);
    }

    record.board = Board::new();
    record.current_turn = Symbol::X;
    record.winner = None;
    record.status = Status::Playing;
    record.turn_started_at = now;
    Ok(())
}

fn finish(record: &mut MatchRecord, outcome: Outcome) {
    record.status = Status::Finished;
    record.winner = Some(outcome);
    if let Some(winner) = outcome.winner() {
        record.award(winner);
    }
}
