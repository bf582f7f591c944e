//! Storage backend error definitions.

use thiserror::Error;

/// Errors that can occur while talking to the storage service.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection string could not be parsed or lacks required parts.
    #[error("Invalid connection string: {0}")]
    ConnectionString(String),

    /// A request URL could not be built from the endpoint and resource name.
    #[error("Invalid resource URL: {0}")]
    Url(String),

    /// Connection, TLS or protocol failure.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The backend did not answer within the configured timeout.
    #[error("Storage request timed out after {0} seconds")]
    Timeout(u64),

    /// The backend answered with a non-success status.
    #[error("Storage service returned {status} ({code})")]
    Service { status: u16, code: String, message: String },

    /// The backend answered 2xx but the body was not understood.
    #[error("Malformed storage response: {0}")]
    Decode(String),
}

impl StorageError {
    /// Build a `Service` error from a failed response, consuming its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Unknown")
            .to_string();
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > 512 {
            let mut cut = 512;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        StorageError::Service {
            status,
            code,
            message,
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            StorageError::Timeout(timeout_secs)
        } else {
            StorageError::Transport(err)
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::ConnectionString(_) => "config",
            StorageError::Url(_) => "url",
            StorageError::Transport(_) => "transport",
            StorageError::Timeout(_) => "timeout",
            StorageError::Service { .. } => "service",
            StorageError::Decode(_) => "decode",
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
