//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/games", get(games_handler))
        // Run lifecycle
        .route("/api/run/start", post(start_run_handler))
        .route("/api/run/action", post(action_handler))
        .route("/api/run/finish", post(finish_handler))
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/api/seeds/:game/:date", get(seed_handler))
        // Player records
        .route("/api/profile", get(profile_handler))
        .route("/api/players", post(register_handler))
        .route("/api/friends", post(friend_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
