use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ttt_arena::{
    config::GameConfig, memory::MemoryStore, punishment::PunishmentPolicy, route::create_router,
    service::GameService, AppState,
};

fn app_with(config: GameConfig) -> Router {
    let service = GameService::new(Arc::new(MemoryStore::new()), config);
    create_router(AppState::new(service))
}

fn app() -> Router {
    app_with(GameConfig::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Pairs "a" (X) with "b" (O) and returns the game id.
async fn pair(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/api/matchmaking", Some(json!({ "player_id": "a" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "matched": false }));

    let (status, body) = send(app, "POST", "/api/matchmaking", Some(json!({ "player_id": "b" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], json!(true));
    assert_eq!(body["your_symbol"], json!("O"));
    body["game_id"].as_str().unwrap().to_owned()
}

async fn play(app: &Router, game_id: &str, player: &str, position: i64) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/api/games/{game_id}"),
        Some(json!({ "player_id": player, "position": position })),
    )
    .await
}

#[tokio::test]
async fn first_player_finds_match_by_polling() {
    let app = app();
    let game_id = pair(&app).await;

    let (status, body) = send(&app, "GET", "/api/matchmaking?player_id=a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "matched": true, "game_id": game_id, "your_symbol": "X" })
    );

    let (_, body) = send(&app, "GET", &format!("/api/games/{game_id}"), None).await;
    assert_eq!(body["player_x_id"], json!("a"));
    assert_eq!(body["player_o_id"], json!("b"));
    assert_eq!(body["board"], json!(["", "", "", "", "", "", "", "", ""]));
    assert_eq!(body["current_turn"], json!("X"));
    assert_eq!(body["status"], json!("playing"));
}

#[tokio::test]
async fn a_round_is_played_to_a_win() {
    let app = app();
    let game_id = pair(&app).await;

    for (player, position) in [("a", 0), ("b", 4), ("a", 1), ("b", 7)] {
        let (status, _) = play(&app, &game_id, player, position).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = play(&app, &game_id, "a", 2).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("finished"));
    assert_eq!(body["winner"], json!("X"));
    assert_eq!(body["player_x_score"], json!(1));
    assert_eq!(body["player_o_score"], json!(0));
    assert_eq!(body["time_left_ms"], json!(0));

    let (status, body) = play(&app, &game_id, "b", 8).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("Round already finished"));
}

#[tokio::test]
async fn bad_moves_are_rejected() {
    let app = app();
    let game_id = pair(&app).await;

    let (status, body) = play(&app, &game_id, "b", 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Not your turn"));

    play(&app, &game_id, "a", 0).await;
    let (status, body) = play(&app, &game_id, "b", 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid move"));

    for position in [-1, 9, 42] {
        let (status, _) = play(&app, &game_id, "b", position).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (_, body) = send(&app, "GET", &format!("/api/games/{game_id}"), None).await;
    assert_eq!(body["board"], json!(["X", "", "", "", "", "", "", "", ""]));
    assert_eq!(body["current_turn"], json!("O"));
}

#[tokio::test]
async fn unknown_game_is_not_found() {
    let app = app();
    let missing = uuid::Uuid::new_v4();

    let (status, body) = send(&app, "GET", &format!("/api/games/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Game not found"));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/games/{missing}/timeout"),
        Some(json!({ "player_id": "a" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn timeout_then_continue_keeps_scores() {
    let app = app_with(GameConfig {
        turn_budget: Duration::ZERO,
        ..GameConfig::default()
    });
    let game_id = pair(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/games/{game_id}/timeout"),
        Some(json!({ "player_id": "b" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["winner"], json!("O"));
    assert_eq!(body["player_o_score"], json!(1));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/games/{game_id}/continue"),
        Some(json!({ "player_id": "a", "decision": "continue" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("playing"));
    assert_eq!(body["winner"], Value::Null);
    assert_eq!(body["current_turn"], json!("X"));
    assert_eq!(body["player_o_score"], json!(1));
}

#[tokio::test]
async fn lopsided_match_is_held_back() {
    let app = app_with(GameConfig {
        turn_budget: Duration::ZERO,
        punishment: PunishmentPolicy {
            threshold: 1,
            duration: Duration::from_secs(10),
        },
    });
    let game_id = pair(&app).await;
    send(
        &app,
        "POST",
        &format!("/api/games/{game_id}/timeout"),
        Some(json!({ "player_id": "a" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/games/{game_id}/continue"),
        Some(json!({ "player_id": "a", "decision": "continue" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["retry_after_secs"], json!(10));

    // The winner cannot start the next round early either.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/games/{game_id}/continue"),
        Some(json!({ "player_id": "b", "decision": "continue" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (_, body) = send(&app, "GET", &format!("/api/games/{game_id}"), None).await;
    assert_eq!(body["status"], json!("finished"));
}

#[tokio::test]
async fn ending_a_match_discards_it() {
    let app = app();
    let game_id = pair(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/games/{game_id}/continue"),
        Some(json!({ "player_id": "b", "decision": "end" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ended": true }));

    let (status, _) = send(&app, "GET", &format!("/api/games/{game_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn outsiders_cannot_end_a_match() {
    let app = app();
    let game_id = pair(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/games/{game_id}/continue"),
        Some(json!({ "player_id": "mallory", "decision": "end" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn leaving_the_queue() {
    let app = app();
    send(&app, "POST", "/api/matchmaking", Some(json!({ "player_id": "a" }))).await;
    send(&app, "POST", "/api/matchmaking", Some(json!({ "player_id": "a" }))).await;

    let (_, body) = send(&app, "GET", "/api/matchmaking/queue", None).await;
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["waiting"][0]["player_id"], json!("a"));

    let (status, _) = send(&app, "DELETE", "/api/matchmaking?player_id=a", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", "/api/matchmaking?player_id=a", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", "/api/matchmaking/queue", None).await;
    assert_eq!(body["count"], json!(0));
}

#[tokio::test]
async fn join_requires_a_player_id() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/matchmaking", Some(json!({ "player_id": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Player ID required"));
}

#[tokio::test]
async fn games_are_listed_with_pagination() {
    let app = app();
    pair(&app).await;

    let (status, body) = send(&app, "GET", "/api/games?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));

    let (_, body) = send(&app, "GET", "/api/games?offset=1", None).await;
    assert_eq!(body["count"], json!(0));
}
