//! HTTP surface driven through the full middleware stack

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use dailyrun::{
    api::build_app,
    config::{ArcadeConfig, SecretKey},
    fairness::SeedKey,
    games::{mines, GameId},
    metrics::ArcadeMetrics,
    service::ArcadeService,
    store::MemoryGameStore,
    time::FixedClock,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "api-secret";

fn app() -> Router {
    let mut config = ArcadeConfig::ephemeral();
    config.fairness.secret_key = SecretKey::new(SECRET);
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap());
    let service = ArcadeService::new(
        &config,
        Arc::new(MemoryGameStore::in_memory()),
        Arc::new(clock),
        Some(Arc::new(ArcadeMetrics::new().unwrap())),
    )
    .unwrap();
    build_app(Arc::new(service), &config.server)
}

struct Reply {
    status: StatusCode,
    request_id: Option<String>,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        request_id,
        body,
    }
}

fn get(uri: &str, player: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(player) = player {
        builder = builder.header("x-player-id", player);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, player: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(player) = player {
        builder = builder.header("x-player-id", player);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_health_and_catalog() {
    let app = app();

    let health = send(&app, get("/health", None)).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["date"], "2024-03-10");
    assert!(health.request_id.is_some());

    let games = send(&app, get("/api/games", None)).await;
    assert_eq!(games.status, StatusCode::OK);
    let games = games.json();
    let list = games["games"].as_array().unwrap();
    assert_eq!(list.len(), 5);
    assert_eq!(list[0]["id"], "crash");
    assert_eq!(list[0]["maxCoinsPerDay"], 500);
    assert!(list[0].get("runsToday").is_none());
    assert!(list[0].get("coinsToday").is_none());

    let mine = send(&app, get("/api/games", Some("alice"))).await.json();
    assert_eq!(mine["games"][0]["runsToday"], 0);
    assert_eq!(mine["games"][0]["coinsToday"], 0);
}

#[tokio::test]
async fn test_identity_required() {
    let app = app();

    let reply = send(&app, post("/api/run/start", None, json!({ "gameId": "crash" }))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let body = reply.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["request_id"].as_str(), reply.request_id.as_deref());

    let reply = send(&app, get("/api/profile", Some("bad:id"))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let app = app();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-123")
        .body(Body::empty())
        .unwrap();
    let reply = send(&app, request).await;
    assert_eq!(reply.request_id.as_deref(), Some("trace-123"));
}

#[tokio::test]
async fn test_browser_can_read_request_id() {
    let app = app();
    let request = Request::builder()
        .uri("/api/games")
        .header(header::ORIGIN, "https://arcade.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let exposed = headers[header::ACCESS_CONTROL_EXPOSE_HEADERS].to_str().unwrap();
    assert!(exposed.contains("x-request-id"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_bad_requests() {
    let app = app();

    let unknown = send(&app, post("/api/run/start", Some("alice"), json!({ "gameId": "poker" }))).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.json()["error"]["code"], "BAD_REQUEST");

    let malformed = send(&app, post("/api/run/start", Some("alice"), json!({ "game": "crash" }))).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let scope = send(
        &app,
        get("/api/leaderboard?gameId=crash&scope=weekly", None),
    )
    .await;
    assert_eq!(scope.status, StatusCode::BAD_REQUEST);

    let missing = send(
        &app,
        post("/api/run/finish", Some("alice"), json!({ "runId": "nope" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_lifecycle_over_http() {
    let app = app();

    let started = send(&app, post("/api/run/start", Some("alice"), json!({ "gameId": "mines" }))).await;
    assert_eq!(started.status, StatusCode::OK);
    let started = started.json();
    let run_id = started["runId"].as_str().unwrap().to_string();
    assert_eq!(started["date"], "2024-03-10");
    assert_eq!(started["gameId"], "mines");

    let seed = SeedKey::new(&SecretKey::new(SECRET))
        .unwrap()
        .derive(GameId::Mines, "2024-03-10");
    let mines = mines::mine_positions(&seed);
    let safe: Vec<usize> = (0..mines::GRID_SIZE)
        .filter(|c| !mines.contains(c))
        .take(3)
        .collect();

    let first = send(
        &app,
        post(
            "/api/run/action",
            Some("alice"),
            json!({ "runId": run_id, "action": { "type": "reveal", "at": 0, "payload": { "index": safe[0] } } }),
        ),
    )
    .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["transcript"].as_array().unwrap().len(), 1);

    // Someone else's run looks missing
    let foreign = send(
        &app,
        post("/api/run/finish", Some("mallory"), json!({ "runId": run_id })),
    )
    .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let transcript = json!([
        { "type": "reveal", "at": 0, "payload": { "index": safe[0] } },
        { "type": "reveal", "at": 1, "payload": { "index": safe[1] } },
        "garbage",
        { "type": "reveal", "at": 2, "payload": { "index": safe[2] } },
        { "type": "bank", "at": 3 }
    ]);
    let finished = send(
        &app,
        post(
            "/api/run/finish",
            Some("alice"),
            json!({ "runId": run_id, "transcript": transcript }),
        ),
    )
    .await;
    assert_eq!(finished.status, StatusCode::OK);
    let finished = finished.json();
    assert_eq!(finished["score"], 18.0);
    assert_eq!(finished["coins"], 36);
    assert_eq!(finished["verified"], true);

    // A retried finish gets the committed result back
    let again = send(
        &app,
        post("/api/run/finish", Some("alice"), json!({ "runId": run_id, "transcript": [] })),
    )
    .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.json(), finished);

    let late_action = send(
        &app,
        post(
            "/api/run/action",
            Some("alice"),
            json!({ "runId": run_id, "action": { "type": "bank", "at": 4 } }),
        ),
    )
    .await;
    assert_eq!(late_action.status, StatusCode::CONFLICT);

    let board = send(
        &app,
        get("/api/leaderboard?gameId=mines&scope=daily", Some("alice")),
    )
    .await;
    assert_eq!(board.status, StatusCode::OK);
    let board = board.json();
    assert_eq!(board["top"][0]["playerId"], "alice");
    assert_eq!(board["myRank"], 1);

    let profile = send(&app, get("/api/profile", Some("alice"))).await.json();
    assert_eq!(profile["balance"], 36);

    let metrics = send(&app, get("/metrics", None)).await;
    assert_eq!(metrics.status, StatusCode::OK);
    let text = String::from_utf8(metrics.body).unwrap();
    assert!(text.contains("dailyrun_runs_finished_total{game=\"mines\"} 1"));
}

#[tokio::test]
async fn test_seed_reveal_rules() {
    let app = app();

    let today = send(&app, get("/api/seeds/crash/2024-03-10", None)).await;
    assert_eq!(today.status, StatusCode::FORBIDDEN);
    assert_eq!(today.json()["error"]["code"], "FORBIDDEN");

    let past = send(&app, get("/api/seeds/crash/2024-03-09", None)).await;
    assert_eq!(past.status, StatusCode::OK);
    let expected = SeedKey::new(&SecretKey::new(SECRET))
        .unwrap()
        .derive(GameId::Crash, "2024-03-09");
    assert_eq!(past.json()["seed"], expected);

    let bad_date = send(&app, get("/api/seeds/crash/yesterday", None)).await;
    assert_eq!(bad_date.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_players_and_friends() {
    let app = app();

    let registered = send(
        &app,
        post("/api/players", Some("bob"), json!({ "displayName": "Bob" })),
    )
    .await;
    assert_eq!(registered.status, StatusCode::OK);
    let profile = registered.json();
    assert_eq!(profile["displayName"], "Bob");
    assert_eq!(profile["balance"], 500);

    let friend = send(&app, post("/api/friends", Some("bob"), json!({ "friendId": "alice" }))).await;
    assert_eq!(friend.status, StatusCode::OK);
    assert_eq!(friend.json()["ok"], true);

    let myself = send(&app, post("/api/friends", Some("bob"), json!({ "friendId": "bob" }))).await;
    assert_eq!(myself.status, StatusCode::BAD_REQUEST);
}
