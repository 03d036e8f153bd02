//! Daily Run - provably fair daily mini-game service
//!
//! Each game gets one secret seed per civil day. Its SHA-256 commitment is
//! published up front, runs are replayed on the server from their recorded
//! decisions, and the seed is revealed once the day is over so any run can
//! be checked independently.

pub mod api;
pub mod config;
pub mod errors;
pub mod fairness;
pub mod games;
pub mod leaderboard;
pub mod metrics;
pub mod rewards;
pub mod service;
pub mod storage;
pub mod store;
pub mod time;

pub use config::ArcadeConfig;
pub use errors::{ArcadeError, ArcadeResult};
pub use games::{simulate, GameId, RunAction, SimulationResult};
pub use service::ArcadeService;
