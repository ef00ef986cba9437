mod token;
mod verify;

pub use token::*;
pub use verify::*;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Public routes without rate limiting. Split out so tests can drive the
/// handlers through `oneshot` without a peer address for the governor.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/verify", get(verify_license))
        .route("/token", post(issue_token))
}

pub fn router(rate_per_second: u64, rate_burst: u32) -> Router<AppState> {
    routes()
        .layer(rate_limit::public_layer(rate_per_second, rate_burst))
        // Health stays outside the layer so orchestration probes are never
        // throttled.
        .route("/health", get(health))
}
