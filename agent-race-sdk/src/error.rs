//! SDK error types and handling
//!
//! This module provides error handling for the SDK: HTTP failures carrying
//! the status and body, transport and stream errors, and configuration
//! problems.

use agent_race_core::CoreError;
use thiserror::Error;

/// The main error type for the SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// API returned a non-2xx response
    #[error("Request failed ({status}): {body}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// `detail` field of the error body, if the body was JSON
        detail: Option<String>,
        /// Raw response body text
        body: String,
    },

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Request timed out
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The event stream broke off before a terminal event
    #[error("Event stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// Operation needs state the session does not have
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A newer race replaced the one this action belonged to
    #[error("Result discarded: the race was replaced while the request was in flight")]
    Superseded,
}

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;

/// Error body returned by the race backend
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub detail: serde_json::Value,
}

impl SdkError {
    /// Create an API error from a non-2xx response
    pub fn from_response(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ApiErrorResponse>(body)
            .ok()
            .map(|response| match response.detail {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            });

        SdkError::ApiError {
            status,
            detail,
            body: body.to_string(),
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            SdkError::NetworkError(_) | SdkError::Timeout(_) => true,
            SdkError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SdkError::ApiError { status, .. } => Some(*status),
            SdkError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the error only means the result arrived for a replaced race
    pub fn is_superseded(&self) -> bool {
        matches!(self, SdkError::Superseded)
    }
}

impl From<CoreError> for SdkError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => SdkError::ValidationError(msg),
            CoreError::InvalidState(msg) => SdkError::InvalidState(msg),
            CoreError::Serialization(msg) => SdkError::InvalidState(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_json_response() {
        let error = SdkError::from_response(404, r#"{"detail": "Unknown race id"}"#);

        match &error {
            SdkError::ApiError { status, detail, body } => {
                assert_eq!(*status, 404);
                assert_eq!(detail.as_deref(), Some("Unknown race id"));
                assert_eq!(body, r#"{"detail": "Unknown race id"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            error.to_string(),
            r#"Request failed (404): {"detail": "Unknown race id"}"#
        );
    }

    #[test]
    fn test_error_from_plain_body() {
        let error = SdkError::from_response(502, "Bad Gateway");
        assert_eq!(error.to_string(), "Request failed (502): Bad Gateway");
        assert_eq!(error.status_code(), Some(502));
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(SdkError::from_response(503, "").is_retryable());
        assert!(SdkError::from_response(429, "").is_retryable());
        assert!(!SdkError::from_response(404, "").is_retryable());
        assert!(!SdkError::Superseded.is_retryable());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: SdkError = CoreError::Validation("task too short".to_string()).into();
        assert!(matches!(err, SdkError::ValidationError(_)));
    }
}
