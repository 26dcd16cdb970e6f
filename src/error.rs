use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failures talking to the search backend. Any of these fails the whole
/// search request; there is no partial response.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("cannot connect to search service: {0}")]
    Unreachable(String),

    #[error("search backend timed out: {0}")]
    Timeout(String),

    #[error("search backend returned status {0}")]
    Status(u16),

    #[error("malformed search backend response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

/// Request-level errors. Per-URL failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl AdapterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdapterError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AdapterError::Upstream(UpstreamError::Unreachable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AdapterError::Upstream(UpstreamError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AdapterError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!("rejected request: {self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
