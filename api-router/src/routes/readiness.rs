use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe. An uninitialized engine is still a 200: topic storage
/// works without it and queries fall back to the not-ready reply, so the
/// state is reported rather than gating traffic.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let engine = if state.engine.is_ready() {
        "ready"
    } else {
        "uninitialized"
    };
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "checks": { "engine": engine }
        })),
    )
}
