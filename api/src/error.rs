//! Signaling server errors as RFC 7807 problem responses.

use axum::{
    extract::ws::{close_code, CloseFrame},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest reason a WebSocket close frame can carry
const MAX_CLOSE_REASON: usize = 123;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types following RFC 7807 Problem Details.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request (400) - malformed request
    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// Conflict (409) - the session has already consumed its offer
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Service unavailable (503) - the session is gone
    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500)
    #[error("Internal Error: {0}")]
    InternalError(String),
}

/// RFC 7807 Problem Details response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary
    pub title: String,

    /// HTTP status code
    pub status: u16,

    /// Human-readable explanation
    pub detail: String,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg),
            Self::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable", msg)
            }
            Self::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", msg)
            }
        }
    }
}

impl ApiError {
    /// Close frame reporting this error on an upgraded socket.
    pub fn close_frame(&self) -> CloseFrame {
        let code = match self {
            Self::BadRequest(_) | Self::Conflict(_) => close_code::POLICY,
            Self::ServiceUnavailable(_) => close_code::AWAY,
            Self::InternalError(_) => close_code::ERROR,
        };

        let mut reason = self.to_string();
        if reason.len() > MAX_CLOSE_REASON {
            let mut end = MAX_CLOSE_REASON;
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            reason.truncate(end);
        }

        CloseFrame {
            code,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title, detail) = self.parts();

        let problem = ProblemDetails {
            type_uri: format!(
                "https://reflect.dev/errors/{}",
                title.to_lowercase().replace(' ', "-")
            ),
            title: title.to_string(),
            status: status.as_u16(),
            detail: detail.to_string(),
        };

        (status, Json(problem)).into_response()
    }
}

impl From<reflect_webrtc::ReflectError> for ApiError {
    fn from(err: reflect_webrtc::ReflectError) -> Self {
        use reflect_webrtc::ReflectError;

        match err {
            ReflectError::Decode(e) => ApiError::BadRequest(e.to_string()),
            ReflectError::Protocol(msg) => ApiError::BadRequest(msg),
            ReflectError::InvalidState { .. } => ApiError::Conflict(err.to_string()),
            ReflectError::Transport(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}
