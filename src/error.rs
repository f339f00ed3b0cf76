use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Game not found")]
    NotFound,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Invalid move")]
    InvalidMove,
    #[error("Round already finished")]
    AlreadyFinished,
    #[error("Round still in progress")]
    RoundInProgress,
    #[error("Player is not part of this game")]
    NotAPlayer,
    #[error("Turn has not expired yet")]
    TurnNotExpired,
    #[error("Continuing is locked for another {}s", .remaining.as_secs_f64().ceil())]
    PunishmentPending { remaining: Duration },
    #[error("Game was updated concurrently, try again")]
    Conflict,
    #[error(transparent)]
    Store(anyhow::Error),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => GameError::NotFound,
            StoreError::Conflict => GameError::Conflict,
            StoreError::Backend(e) => GameError::Store(e),
        }
    }
}

impl GameError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GameError::NotFound => StatusCode::NOT_FOUND,
            GameError::NotYourTurn | GameError::InvalidMove | GameError::TurnNotExpired => {
                StatusCode::BAD_REQUEST
            }
            GameError::NotAPlayer => StatusCode::FORBIDDEN,
            GameError::AlreadyFinished | GameError::RoundInProgress | GameError::Conflict => {
                StatusCode::CONFLICT
            }
            GameError::PunishmentPending { .. } => StatusCode::TOO_MANY_REQUESTS,
            GameError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Make our own error that wraps `anyhow::Error`.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Some(err) = self.0.downcast_ref::<GameError>() else {
            tracing::error!("Request failed: {:#}", self.0);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Something went wrong" })),
            )
                .into_response();
        };

        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.0);
        }

        let body = match err {
            GameError::PunishmentPending { remaining } => serde_json::json!({
                "error": err.to_string(),
                "retry_after_secs": remaining.as_secs_f64().ceil() as u64,
            }),
            _ => serde_json::json!({ "error": err.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, anyhow::Error>` to turn them into
// `Result<_, AppError>`.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
