use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::extract::Path;
use axum::extract::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::Json;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AppError, GameError};
use crate::model::MatchRecord;
use crate::schema::ClientMessage;
use crate::schema::ContinueRequest;
use crate::schema::EndedResponse;
use crate::schema::GameEvent;
use crate::schema::GetGameSchema;
use crate::schema::MatchmakingResponse;
use crate::schema::MoveRequest;
use crate::schema::PlayerQuery;
use crate::schema::PlayerRequest;
use crate::schema::ServerMessage;
use crate::service::Continuation;
use crate::{schema::Pagination, AppState};

fn to_schema(state: &AppState, m: &MatchRecord) -> GetGameSchema {
    GetGameSchema::new(m, state.service.turn_budget(), Utc::now())
}

fn position(raw: i64) -> Result<usize, GameError> {
    usize::try_from(raw).map_err(|_| GameError::InvalidMove)
}

pub async fn get_games_handler(
    opts: Option<Query<Pagination>>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let Query(opts) = opts.unwrap_or_default();

    let limit = opts.limit.unwrap_or(10);
    let offset = opts.offset.unwrap_or(0);

    let games = data.service.list_games(limit, offset).await?;
    let games: Vec<GetGameSchema> = games.iter().map(|m| to_schema(&data, m)).collect();

    let json_response = serde_json::json!({
        "count": games.len(),
        "games": games
    });

    Ok(Json(json_response))
}

pub async fn get_game_by_id_handler(
    Path(game_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let m = data.service.get_game(game_id).await?;
    Ok(Json(to_schema(&data, &m)))
}

pub async fn make_move_handler(
    Path(game_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
    Json(body): Json<MoveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let m = data
        .service
        .make_move(game_id, &body.player_id, position(body.position)?)
        .await?;
    Ok(Json(to_schema(&data, &m)))
}

pub async fn timeout_handler(
    Path(game_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
    Json(body): Json<PlayerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let m = data
        .service
        .handle_timeout(game_id, &body.player_id)
        .await?;
    Ok(Json(to_schema(&data, &m)))
}

pub async fn continue_handler(
    Path(game_id): Path<Uuid>,
    State(data): State<Arc<AppState>>,
    Json(body): Json<ContinueRequest>,
) -> Result<axum::response::Response, AppError> {
    let response = match data
        .service
        .continue_round(game_id, &body.player_id, body.decision)
        .await?
    {
        Continuation::Continued(m) => Json(to_schema(&data, &m)).into_response(),
        Continuation::Ended => Json(EndedResponse { ended: true }).into_response(),
    };
    Ok(response)
}

pub async fn join_queue_handler(
    State(data): State<Arc<AppState>>,
    Json(body): Json<PlayerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if body.player_id.trim().is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Player ID required" })),
        )
            .into_response());
    }

    let outcome = data.service.join_queue(&body.player_id).await?;
    Ok(Json(MatchmakingResponse::from(outcome)).into_response())
}

pub async fn match_status_handler(
    Query(params): Query<PlayerQuery>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = data.service.match_status(&params.player_id).await?;
    Ok(Json(MatchmakingResponse::from(outcome)))
}

pub async fn leave_queue_handler(
    Query(params): Query<PlayerQuery>,
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    data.service.leave_queue(&params.player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_queue_handler(
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let waiting = data.service.waiting().await?;
    Ok(Json(serde_json::json!({
        "count": waiting.len(),
        "waiting": waiting
    })))
}

pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    Path(game_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    // Refuse the upgrade for games that do not exist.
    let game = state.service.get_game(game_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket_connection(socket, state, game)))
}

async fn handle_socket_connection(mut socket: WebSocket, state: Arc<AppState>, game: MatchRecord) {
    let game_id = game.id;

    // Subscribe before sending the snapshot so no update slips in between.
    let mut rx = state.service.subscribe();

    let current_connections = state.connection_count.fetch_add(1, Ordering::SeqCst);
    tracing::info!(
        %game_id,
        "New connection. Total connections: {}",
        current_connections + 1
    );

    let snapshot = ServerMessage::Snapshot {
        game: to_schema(&state, &game),
    };
    if let Ok(initial_message) = serde_json::to_string(&snapshot) {
        let _ = socket.send(Message::Text(initial_message)).await;
    }

    let (mut sender, mut receiver) = socket.split();
    let turn_budget = state.service.turn_budget();

    // Replies to this client only, e.g. rejected moves.
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(16);

    // Handles sending messages from this server to the client
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                event = rx.recv() => match event {
                    Ok(GameEvent::Updated { game }) if game.id == game_id => ServerMessage::Updated {
                        game: GetGameSchema::new(&game, turn_budget, Utc::now()),
                    },
                    Ok(GameEvent::Ended { game_id: ended }) if ended == game_id => {
                        ServerMessage::Ended { game_id }
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%game_id, skipped, "Subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };

            let ended = matches!(msg, ServerMessage::Ended { .. });
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            if ended {
                let _ = sender.close().await;
                break;
            }
        }
    });

    // Handles receiving messages sent from the client to this server
    let mut receive_task = {
        let state = state.clone();
        tokio::spawn(async move {
            while let Some(Ok(message)) = receiver.next().await {
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };

                let result = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Move {
                        player_id,
                        position: raw,
                    }) => match position(raw) {
                        Ok(pos) => state
                            .service
                            .make_move(game_id, &player_id, pos)
                            .await
                            .map(|_| ()),
                        Err(e) => Err(e),
                    },
                    Ok(ClientMessage::Timeout { player_id }) => state
                        .service
                        .handle_timeout(game_id, &player_id)
                        .await
                        .map(|_| ()),
                    Err(e) => {
                        tracing::debug!(%game_id, "Unreadable client message: {}", e);
                        let message = format!("Invalid message: {}", e);
                        if reply_tx.send(ServerMessage::Error { message }).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                if let Err(e) = result {
                    let message = e.to_string();
                    if reply_tx.send(ServerMessage::Error { message }).await.is_err() {
                        break;
                    }
                }
            }
        })
    };

    // Wait for either task to finish and then cleanup
    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    };

    let remaining = state.connection_count.fetch_sub(1, Ordering::SeqCst) - 1;
    tracing::info!(
        %game_id,
        "Connection closed. Remaining connections: {}",
        remaining
    );
}
