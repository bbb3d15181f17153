use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub workers: usize,
    pub queue_depth: usize,
}

/// GET /health — worker pool status.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let accepting = state.pool.is_accepting();

    let status_code = if accepting {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if accepting {
            "ok".to_string()
        } else {
            "shutting_down".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        workers: state.pool.size(),
        queue_depth: state.pool.queue_depth(),
    };

    (status_code, Json(response))
}
