use imagegen_core::types::{Credits, UserId};
use imagegen_core::ConfigError;

/// Errors from record and history stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No balance exists for the user.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A deduction would take the balance below zero. Nothing was changed.
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: Credits, available: Credits },

    /// A concurrent writer kept changing the balance underneath us.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// A history record with this id already exists.
    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    /// The HTTP request itself failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("Backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
