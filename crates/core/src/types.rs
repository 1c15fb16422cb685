/// Users are identified by the opaque id issued by the hosted auth backend.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Credit amounts and balances. Never negative.
pub type Credits = u32;
