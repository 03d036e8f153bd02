//! API Request and Response Models
//!
//! Wire shapes owned by the HTTP layer. Service results are serialized as-is.

use crate::{games::RunAction, service::CatalogEntry};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current civil date in the configured zone
    pub date: String,
}

/// POST /api/run/start
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunRequest {
    pub game_id: String,
}

/// POST /api/run/action
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub run_id: String,
    pub action: RunAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub transcript: Vec<RunAction>,
}

/// POST /api/run/finish
///
/// Transcript entries stay raw here; malformed ones are dropped rather than
/// failing the request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub run_id: String,
    #[serde(default)]
    pub transcript: Option<Vec<serde_json::Value>>,
}

impl FinishRequest {
    pub fn into_actions(self) -> (String, Option<Vec<RunAction>>) {
        let actions = self.transcript.map(RunAction::transcript_from_values);
        (self.run_id, actions)
    }
}

/// GET /api/leaderboard
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub game_id: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub friends_only: Option<bool>,
}

/// POST /api/players
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub display_name: String,
}

/// POST /api/friends
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub friend_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GamesResponse {
    pub games: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}
