//! Health check endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::ApiState;

/// Health check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` while the session is alive, `degraded` once it has ended
    pub status: String,
    /// Service name
    pub service: String,
    /// Version
    pub version: String,
    /// Handshake state of the session
    pub session_state: String,
    /// Whether the signaling endpoint still accepts an offer
    pub accepting_offer: bool,
}

/// `GET /health`
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let session_state = state.session_state();

    tracing::debug!(state = %session_state, "Health check request received");

    Json(HealthResponse {
        status: if session_state.is_terminal() { "degraded" } else { "ok" }.to_string(),
        service: "reflect".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session_state: session_state.to_string(),
        accepting_offer: state.bridge.is_open(),
    })
}
