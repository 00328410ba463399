use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Errors surfaced by the proxy operations to the HTTP layer.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or unusable client input; no upstream request was made
    #[error("{0}")]
    BadRequest(String),

    /// The origin answered with a status >= 400
    #[error("{message}")]
    UpstreamStatus { status: u16, message: String },

    /// The origin could not be reached (connect, DNS, timeout, malformed URL)
    #[error("failed to fetch {operation}: {source}")]
    UpstreamTransport {
        operation: &'static str,
        #[source]
        source: FetchError,
    },

    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status used when this error is written to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamStatus { .. } | ProxyError::UpstreamTransport { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
