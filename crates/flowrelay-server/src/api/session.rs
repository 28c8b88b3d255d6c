use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::info;

use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
}

// POST /api/reset-session
pub async fn reset_session(State(state): State<AppState>) -> Json<ResetResponse> {
    *state.session.write() = None;
    info!("chat session cleared");
    Json(ResetResponse {
        message: "Session reset".to_string(),
    })
}
