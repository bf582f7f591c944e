//! API error mapping.
//!
//! Storage failures of any kind are reported as one error, `502 Bad Gateway`,
//! with a `{"detail": ...}` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Upstream storage unavailable: {0}")]
    UpstreamUnavailable(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::UpstreamUnavailable(StorageError::Service { status, code, message }) => {
                tracing::warn!(upstream_status = status, code = %code, message = %message, "Storage backend rejected request");
            }
            ApiError::UpstreamUnavailable(e) => {
                tracing::error!(error = %e, "Storage backend call failed");
            }
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
