//! HTTP API
//!
//! axum router over `ArcadeService`. Caller identity arrives in a trusted
//! header set by the account gateway in front of this service.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use errors::{ApiError, ErrorResponse};
pub use server::{build_app, ApiServer};
