//! Error types for the Grafana API client.
//!
//! [`ApiError`] covers everything that can go wrong while talking to the
//! platform. [`HeaderDecodeError`] signals a caller bug detected by the
//! header codec, never a runtime failure.

use thiserror::Error;

/// Failure of a single call through the transport.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Network(String),
    /// The transport gave up waiting or the call was cancelled.
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    /// The addressed id, uid or name does not exist.
    #[error("not found (status {status}): {message}")]
    NotFound { status: u16, message: String },
    /// The platform rejected the document (validation failure or conflict).
    #[error("rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => ApiError::NotFound { status, message },
            400 | 409 | 412 | 422 => ApiError::Rejected { status, message },
            _ => ApiError::Status { status, message },
        }
    }

    /// HTTP status carried by the error, if the platform answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { status, .. }
            | ApiError::Rejected { status, .. }
            | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// The caller handed the header codec a map that breaks its contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderDecodeError {
    #[error("header name key '{key}' holds a {found} instead of a string")]
    NonStringHeaderName { key: String, found: &'static str },
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid GRAFANA_URL '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },
    #[error("invalid GRAFANA_ORG_ID '{0}'")]
    InvalidOrgId(String),
    #[error("invalid GRAFANA_TIMEOUT_SECS '{0}'")]
    InvalidTimeout(String),
    #[error("GRAFANA_BASIC_AUTH must be formatted as user:password")]
    InvalidBasicAuth,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
