//! Persistence collaborators for the generation pipeline.
//!
//! - [`RecordStore`]: per-user credit balances and the audit log of
//!   successful generations. [`MemoryRecordStore`] for tests and offline
//!   runs, [`RestRecordStore`] for a PostgREST backend.
//! - [`HistoryStore`]: the local list of generated images, newest first.
//!   [`MemoryHistoryStore`] and the file-backed [`JsonFileHistoryStore`].

pub mod error;
pub mod history;
pub mod records;
pub mod rest;

pub use error::StoreError;
pub use history::{DynHistoryStore, HistoryStore, JsonFileHistoryStore, MemoryHistoryStore};
pub use records::{DynRecordStore, MemoryRecordStore, RecordStore};
pub use rest::{RestRecordStore, RestStoreConfig};
