//! Request Handlers
//!
//! Thin adapters over `ArcadeService`. Every service call runs on the
//! blocking pool under the configured storage deadline.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::{
    config::ServerConfig,
    errors::{ArcadeError, ArcadeResult, StorageError},
    fairness::RevealedSeed,
    games::GameId,
    leaderboard::{LeaderboardView, Scope},
    service::{authenticate, ArcadeService, FinishedRun, Profile, StartedRun},
    store::PlayerId,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Shared application state
pub struct AppState {
    pub service: Arc<ArcadeService>,
    /// Header carrying the caller identity set by the account gateway
    pub player_header: String,
    pub storage_timeout: Duration,
}

impl AppState {
    pub fn new(service: Arc<ArcadeService>, config: &ServerConfig) -> Self {
        Self {
            service,
            player_header: config.player_header.to_ascii_lowercase(),
            storage_timeout: Duration::from_millis(config.storage_timeout_ms),
        }
    }

    fn fail(&self, request_id: &RequestId, err: ArcadeError) -> ApiError {
        ApiError::from_service(request_id.0.clone(), err)
    }

    fn caller(&self, request_id: &RequestId, headers: &HeaderMap) -> Result<PlayerId, ApiError> {
        let raw = headers
            .get(self.player_header.as_str())
            .map(|v| v.to_str().unwrap_or_default());
        authenticate(raw).map_err(|e| self.fail(request_id, e))
    }

    /// Anonymous callers are allowed; a malformed identity is not
    fn optional_caller(
        &self,
        request_id: &RequestId,
        headers: &HeaderMap,
    ) -> Result<Option<PlayerId>, ApiError> {
        if headers.contains_key(self.player_header.as_str()) {
            self.caller(request_id, headers).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Run a blocking service call with the storage deadline applied
    async fn call<T, F>(&self, request_id: &RequestId, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ArcadeService) -> ArcadeResult<T> + Send + 'static,
    {
        let service = self.service.clone();
        let task = tokio::task::spawn_blocking(move || op(&service));

        match tokio::time::timeout(self.storage_timeout, task).await {
            Ok(Ok(result)) => result.map_err(|e| self.fail(request_id, e)),
            Ok(Err(join_error)) => Err(ApiError::internal_error(
                request_id.0.clone(),
                format!("service task failed: {}", join_error),
            )),
            Err(_) => {
                let err = ArcadeError::from(StorageError::Timeout {
                    timeout_ms: self.storage_timeout.as_millis() as u64,
                });
                warn!(request_id = %request_id.0, error = %err, "storage deadline exceeded");
                if let Some(metrics) = self.service.metrics() {
                    metrics.record_error(&err);
                }
                Err(self.fail(request_id, err))
            }
        }
    }
}

fn parse_game(state: &AppState, request_id: &RequestId, raw: &str) -> Result<GameId, ApiError> {
    raw.parse::<GameId>().map_err(|e| state.fail(request_id, e))
}

/// Health check handler
/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        date: state.service.today(),
    })
}

/// Game catalog, with today's run counts for an identified caller
/// GET /api/games
pub async fn games_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<GamesResponse>, ApiError> {
    let caller = state.optional_caller(&request_id, &headers)?;
    let games = state
        .call(&request_id, move |service| service.catalog(caller.as_ref()))
        .await?;
    Ok(Json(GamesResponse { games }))
}

/// POST /api/run/start
pub async fn start_run_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<StartRunRequest>, JsonRejection>,
) -> Result<Json<StartedRun>, ApiError> {
    let caller = state.caller(&request_id, &headers)?;
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;
    let game = parse_game(&state, &request_id, &body.game_id)?;

    let started = state
        .call(&request_id, move |service| service.start_run(&caller, game))
        .await?;
    Ok(Json(started))
}

/// POST /api/run/action
pub async fn action_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let caller = state.caller(&request_id, &headers)?;
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;

    let transcript = state
        .call(&request_id, move |service| {
            service.append_action(&caller, &body.run_id, body.action)
        })
        .await?;
    Ok(Json(ActionResponse {
        ok: true,
        transcript,
    }))
}

/// POST /api/run/finish
pub async fn finish_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<FinishRequest>, JsonRejection>,
) -> Result<Json<FinishedRun>, ApiError> {
    let caller = state.caller(&request_id, &headers)?;
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;
    let (run_id, transcript) = body.into_actions();

    let finished = state
        .call(&request_id, move |service| {
            service.finish_run(&caller, &run_id, transcript)
        })
        .await?;
    Ok(Json(finished))
}

/// GET /api/leaderboard?gameId={game}&scope={daily|alltime}&friendsOnly={bool}
pub async fn leaderboard_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<LeaderboardView>, ApiError> {
    let Query(query) =
        query.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;
    let game = parse_game(&state, &request_id, &query.game_id)?;
    let scope = match query.scope.as_deref() {
        Some(raw) => raw
            .parse::<Scope>()
            .map_err(|e| state.fail(&request_id, e))?,
        None => Scope::default(),
    };
    let friends_only = query.friends_only.unwrap_or(false);
    let caller = state.optional_caller(&request_id, &headers)?;

    let view = state
        .call(&request_id, move |service| {
            service.leaderboard(game, scope, caller.as_ref(), friends_only)
        })
        .await?;
    Ok(Json(view))
}

/// Reveal a finished day's seed
/// GET /api/seeds/:game/:date
pub async fn seed_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path((game, date)): Path<(String, String)>,
) -> Result<Json<RevealedSeed>, ApiError> {
    let game = parse_game(&state, &request_id, &game)?;
    let revealed = state
        .call(&request_id, move |service| service.reveal_seed(game, &date))
        .await?;
    Ok(Json(revealed))
}

/// GET /api/profile
pub async fn profile_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Profile>, ApiError> {
    let caller = state.caller(&request_id, &headers)?;
    let profile = state
        .call(&request_id, move |service| service.profile(&caller))
        .await?;
    Ok(Json(profile))
}

/// POST /api/players
pub async fn register_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let caller = state.caller(&request_id, &headers)?;
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;

    let profile = state
        .call(&request_id, move |service| {
            service.register_player(&caller, &body.display_name)
        })
        .await?;
    Ok(Json(profile))
}

/// POST /api/friends
pub async fn friend_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<FriendRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let caller = state.caller(&request_id, &headers)?;
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;

    state
        .call(&request_id, move |service| {
            service.add_friend(&caller, &body.friend_id)
        })
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Prometheus text exposition
/// GET /metrics
pub async fn metrics_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let metrics = state.service.metrics().ok_or_else(|| {
        ApiError::not_found(request_id.0.clone(), "metrics are disabled".to_string())
    })?;
    let body = metrics
        .render()
        .map_err(|e| ApiError::internal_error(request_id.0.clone(), e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
