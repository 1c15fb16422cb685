use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised by request construction and payload decoding.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),
}

/// Errors from loading configuration out of the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Classification of a failed generation.
///
/// Every kind maps to a distinct user-facing message (see
/// [`crate::messages`]). Failures are recorded as values so that a bulk
/// run can continue past them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// The response carried no recognisable image payload.
    NoImageFound,
    /// A candidate payload was found but is malformed or too short.
    InvalidImageData,
    /// The generation endpoint answered with a non-2xx status.
    ServiceError { status: u16 },
    /// The endpoint answered 2xx with an empty body.
    EmptyResponse,
    /// The round trip exceeded the per-call timeout.
    Timeout,
    /// The run was cancelled before or during the call.
    Cancelled,
    /// The credit budget did not cover the item; no call was issued.
    InsufficientCredits,
    /// Connection, DNS, TLS or body-read failure.
    NetworkError,
}

impl ErrorKind {
    /// Short machine-friendly label, used in logs and summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::NoImageFound => "no_image_found",
            Self::InvalidImageData => "invalid_image_data",
            Self::ServiceError { .. } => "service_error",
            Self::EmptyResponse => "empty_response",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::InsufficientCredits => "insufficient_credits",
            Self::NetworkError => "network_error",
        }
    }

    /// Whether resubmitting the same request has a reasonable chance of
    /// succeeding.
    pub fn is_retryable(self) -> bool {
        match self {
            Self::ServiceError { status } => status >= 500 || status == 429,
            Self::NoImageFound | Self::EmptyResponse | Self::Timeout | Self::NetworkError => true,
            Self::InvalidImageData | Self::Cancelled | Self::InsufficientCredits => false,
        }
    }
}

/// Failure of the network round trip itself, before any response body
/// could be inspected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Network(_) => ErrorKind::NetworkError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_distinct() {
        let kinds = [
            ErrorKind::NoImageFound,
            ErrorKind::InvalidImageData,
            ErrorKind::ServiceError { status: 500 },
            ErrorKind::EmptyResponse,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
            ErrorKind::InsufficientCredits,
            ErrorKind::NetworkError,
        ];
        let mut labels: Vec<_> = kinds.iter().map(|k| k.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), kinds.len());
    }

    #[test]
    fn server_side_statuses_are_retryable() {
        assert!(ErrorKind::ServiceError { status: 503 }.is_retryable());
        assert!(ErrorKind::ServiceError { status: 429 }.is_retryable());
        assert!(!ErrorKind::ServiceError { status: 404 }.is_retryable());
    }

    #[test]
    fn credit_and_cancel_failures_are_not_retryable() {
        assert!(!ErrorKind::InsufficientCredits.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn service_error_serializes_with_status() {
        let json = serde_json::to_value(ErrorKind::ServiceError { status: 502 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "service_error", "status": 502}));
    }

    #[test]
    fn transport_error_kinds() {
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(120)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            TransportError::Network("connection refused".into()).kind(),
            ErrorKind::NetworkError
        );
    }
}
