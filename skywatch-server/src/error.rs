use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use skywatch_core::SourceError;
use thiserror::Error;

/// Errors surfaced to HTTP clients. The body is always `{"error": <msg>}`;
/// only the status differs: 400 for input the client can fix, 500 for
/// upstream or decoding failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Upstream(String),
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
