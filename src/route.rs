use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{any, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handler::{
        continue_handler, get_game_by_id_handler, get_games_handler, get_queue_handler,
        handle_websocket, join_queue_handler, leave_queue_handler, make_move_handler,
        match_status_handler, timeout_handler,
    },
    AppState,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE]);

    let trace_layer =
        TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/ws/games/:game_id", any(handle_websocket))
        .route("/api/games", get(get_games_handler))
        .route(
            "/api/games/:game_id",
            get(get_game_by_id_handler).post(make_move_handler),
        )
        .route("/api/games/:game_id/timeout", post(timeout_handler))
        .route("/api/games/:game_id/continue", post(continue_handler))
        .route(
            "/api/matchmaking",
            post(join_queue_handler)
                .get(match_status_handler)
                .delete(leave_queue_handler),
        )
        .route("/api/matchmaking/queue", get(get_queue_handler))
        .layer(cors)
        .layer(trace_layer)
        .with_state(state)
}
