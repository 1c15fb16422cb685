use serde::Serialize;

use crate::archetype::Archetype;
use crate::error::{ErrorKind, TransportError};
use crate::extraction::ExtractError;
use crate::messages;
use crate::types::Credits;

/// A classified generation failure with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct GenerationFailure {
    pub reason: ErrorKind,
    pub message: String,
}

impl GenerationFailure {
    /// Failure with the default message for `reason`.
    pub fn new(reason: ErrorKind) -> Self {
        Self {
            reason,
            message: messages::for_kind(reason),
        }
    }

    pub fn with_message(reason: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn service_error(status: u16, reason: Option<&str>, body: &str) -> Self {
        Self::with_message(
            ErrorKind::ServiceError { status },
            messages::service_error(status, reason, body),
        )
    }

    pub fn insufficient_credits(archetype: Archetype, available: Credits) -> Self {
        Self::with_message(
            ErrorKind::InsufficientCredits,
            messages::insufficient_credits(archetype, archetype.credit_cost(), available),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }
}

impl From<&TransportError> for GenerationFailure {
    fn from(err: &TransportError) -> Self {
        Self::new(err.kind())
    }
}

impl From<ExtractError> for GenerationFailure {
    fn from(err: ExtractError) -> Self {
        Self::new(err.kind())
    }
}

/// Outcome of one generation: an image or a classified failure, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationResult {
    Success {
        image_base64: String,
        archetype: Archetype,
    },
    Failure(GenerationFailure),
}

impl GenerationResult {
    pub fn failure(reason: ErrorKind) -> Self {
        Self::Failure(GenerationFailure::new(reason))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure kind, if this is a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure.reason),
        }
    }

    pub fn image_base64(&self) -> Option<&str> {
        match self {
            Self::Success { image_base64, .. } => Some(image_base64),
            Self::Failure(_) => None,
        }
    }

    /// Convert into a `Result`, for the single-submission path that
    /// surfaces failures to the caller.
    pub fn into_result(self) -> Result<String, GenerationFailure> {
        match self {
            Self::Success { image_base64, .. } => Ok(image_base64),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl From<GenerationFailure> for GenerationResult {
    fn from(failure: GenerationFailure) -> Self {
        Self::Failure(failure)
    }
}
