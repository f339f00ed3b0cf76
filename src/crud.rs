use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query_as, types::Json, Pool, Postgres};
use uuid::Uuid;

use crate::{
    model::{GameModel, MatchRecord, QueueEntry},
    store::{GameStore, StoreError},
};

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow!("Unable to query model from db: {}", e))
}

fn to_record(m: GameModel) -> Result<MatchRecord, StoreError> {
    MatchRecord::try_from(m)
        .map_err(|e| StoreError::Backend(anyhow!("Unable to parse game from db: {}", e)))
}

fn score(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|e| StoreError::Backend(anyhow!("Score out of range: {}", e)))
}

pub async fn crud_get_games(
    db: &Pool<Postgres>,
    limit: usize,
    offset: usize,
) -> Result<Vec<MatchRecord>, StoreError> {
    let games: Vec<GameModel> =
        sqlx::query_as(r#"SELECT * FROM games ORDER by created_at, id LIMIT $1 OFFSET $2"#)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(db)
            .await
            .map_err(db_error)?;

    games.into_iter().map(to_record).collect()
}

pub async fn crud_get_game(db: &Pool<Postgres>, id: Uuid) -> Result<MatchRecord, StoreError> {
    let game: Option<GameModel> = sqlx::query_as(r#"SELECT * FROM games WHERE id = $1"#)
        .bind(id)
        .fetch_optional(db)
        .await
        .map_err(db_error)?;

    game.map(to_record).ok_or(StoreError::NotFound)?
}

pub async fn crud_find_game_by_player(
    db: &Pool<Postgres>,
    player_id: &str,
) -> Result<Option<MatchRecord>, StoreError> {
    let game: Option<GameModel> = sqlx::query_as(
        r#"
        SELECT * FROM games
        WHERE player_x_id = $1 OR player_o_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(player_id)
    .fetch_optional(db)
    .await
    .map_err(db_error)?;

    game.map(to_record).transpose()
}

pub async fn crud_create_game(db: &Pool<Postgres>, m: &MatchRecord) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO games (
            id, player_x_id, player_o_id, board, current_turn, status, winner,
            player_x_score, player_o_score, turn_started_at, version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(m.id)
    .bind(&m.player_x)
    .bind(&m.player_o)
    .bind(Json(m.board))
    .bind(m.current_turn)
    .bind(m.status)
    .bind(m.winner.map(|w| w.as_str()))
    .bind(score(m.score_x)?)
    .bind(score(m.score_o)?)
    .bind(m.turn_started_at)
    .bind(m.version)
    .bind(m.created_at)
    .bind(m.updated_at)
    .execute(db)
    .await
    .map_err(db_error)?;

    Ok(())
}

pub async fn crud_update_game(
    db: &Pool<Postgres>,
    m: &MatchRecord,
) -> Result<MatchRecord, StoreError> {
    let updated: Option<GameModel> = query_as(
        r#"
        UPDATE games
        SET board = $3, current_turn = $4, status = $5, winner = $6,
            player_x_score = $7, player_o_score = $8, turn_started_at = $9,
            version = version + 1, updated_at = NOW()
        WHERE id = $1 AND version = $2
        RETURNING *
        "#,
    )
    .bind(m.id)
    .bind(m.version)
    .bind(Json(m.board))
    .bind(m.current_turn)
    .bind(m.status)
    .bind(m.winner.map(|w| w.as_str()))
    .bind(score(m.score_x)?)
    .bind(score(m.score_o)?)
    .bind(m.turn_started_at)
    .fetch_optional(db)
    .await
    .map_err(db_error)?;

    match updated {
        Some(game) => to_record(game),
        None => {
            // Either gone or written by someone else since it was read.
            let (exists,): (bool,) =
                sqlx::query_as(r#"SELECT EXISTS (SELECT 1 FROM games WHERE id = $1)"#)
                    .bind(m.id)
                    .fetch_one(db)
                    .await
                    .map_err(db_error)?;
            Err(if exists {
                StoreError::Conflict
            } else {
                StoreError::NotFound
            })
        }
    }
}

pub async fn crud_delete_game(db: &Pool<Postgres>, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query(r#"DELETE FROM games WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn crud_enqueue(
    db: &Pool<Postgres>,
    player_id: &str,
    joined_at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO matchmaking_queue (player_id, joined_at)
        VALUES ($1, $2)
        ON CONFLICT (player_id) DO NOTHING
        "#,
    )
    .bind(player_id)
    .bind(joined_at)
    .execute(db)
    .await
    .map_err(db_error)?;

    Ok(result.rows_affected() == 1)
}

pub async fn crud_dequeue_oldest(
    db: &Pool<Postgres>,
    exclude: &str,
) -> Result<Option<QueueEntry>, StoreError> {
    // SKIP LOCKED keeps two concurrent joiners from claiming the same entry.
    query_as(
        r#"
        DELETE FROM matchmaking_queue
        WHERE player_id = (
            SELECT player_id FROM matchmaking_queue
            WHERE player_id <> $1
            ORDER BY joined_at, seq
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING player_id, joined_at
        "#,
    )
    .bind(exclude)
    .fetch_optional(db)
    .await
    .map_err(db_error)
}

pub async fn crud_remove_from_queue(
    db: &Pool<Postgres>,
    player_id: &str,
) -> Result<bool, StoreError> {
    let result = sqlx::query(r#"DELETE FROM matchmaking_queue WHERE player_id = $1"#)
        .bind(player_id)
        .execute(db)
        .await
        .map_err(db_error)?;

    Ok(result.rows_affected() > 0)
}

pub async fn crud_get_queue(db: &Pool<Postgres>) -> Result<Vec<QueueEntry>, StoreError> {
    query_as(r#"SELECT player_id, joined_at FROM matchmaking_queue ORDER BY joined_at, seq"#)
        .fetch_all(db)
        .await
        .map_err(db_error)
}

pub async fn crud_is_queued(db: &Pool<Postgres>, player_id: &str) -> Result<bool, StoreError> {
    let (queued,): (bool,) = sqlx::query_as(
        r#"SELECT EXISTS (SELECT 1 FROM matchmaking_queue WHERE player_id = $1)"#,
    )
    .bind(player_id)
    .fetch_one(db)
    .await
    .map_err(db_error)?;

    Ok(queued)
}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GameStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<MatchRecord, StoreError> {
        crud_get_game(&self.db, id).await
    }

    async fn insert(&self, record: &MatchRecord) -> Result<(), StoreError> {
        crud_create_game(&self.db, record).await
    }

    async fn update(&self, record: &MatchRecord) -> Result<MatchRecord, StoreError> {
        crud_update_game(&self.db, record).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        crud_delete_game(&self.db, id).await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MatchRecord>, StoreError> {
        crud_get_games(&self.db, limit, offset).await
    }

    async fn find_by_player(&self, player_id: &str) -> Result<Option<MatchRecord>, StoreError> {
        crud_find_game_by_player(&self.db, player_id).await
    }

    async fn enqueue(
        &self,
        player_id: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        crud_enqueue(&self.db, player_id, joined_at).await
    }

    async fn dequeue_oldest(&self, exclude: &str) -> Result<Option<QueueEntry>, StoreError> {
        crud_dequeue_oldest(&self.db, exclude).await
    }

    async fn remove_by_player(&self, player_id: &str) -> Result<bool, StoreError> {
        crud_remove_from_queue(&self.db, player_id).await
    }

    async fn list_waiting(&self) -> Result<Vec<QueueEntry>, StoreError> {
        crud_get_queue(&self.db).await
    }

    async fn is_waiting(&self, player_id: &str) -> Result<bool, StoreError> {
        crud_is_queued(&self.db, player_id).await
    }
}
