//! Error types for the reqwest-based BigQuery client.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for reqwest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reqwest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("BigQuery returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    crate::Error::timeout()
                        .with_message(e.to_string())
                        .with_source(e)
                } else if e.is_connect() {
                    crate::Error::network_error()
                        .with_message("Connection failed")
                        .with_source(e)
                } else if e.is_decode() {
                    crate::Error::serialization()
                        .with_message(e.to_string())
                        .with_source(e)
                } else {
                    crate::Error::network_error()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Api { status, message } => {
                let kind = match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        crate::ErrorKind::Authentication
                    }
                    StatusCode::NOT_FOUND => crate::ErrorKind::NotFound,
                    StatusCode::TOO_MANY_REQUESTS => crate::ErrorKind::RateLimited,
                    StatusCode::REQUEST_TIMEOUT => crate::ErrorKind::Timeout,
                    s if s.is_server_error() => crate::ErrorKind::ServiceUnavailable,
                    _ => crate::ErrorKind::InvalidInput,
                };
                crate::Error::new(kind).with_message(format!("{status}: {message}"))
            }
            Error::Serde(e) => crate::Error::serialization()
                .with_message(e.to_string())
                .with_source(e),
        }
    }
}
