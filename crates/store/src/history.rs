//! Local history of generated images.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use imagegen_core::HistoryRecord;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// The user's list of past generations.
///
/// Records are immutable once appended. Listing returns the newest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<(), StoreError>;

    /// Remove one record. Returns `false` when no record had that id.
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<HistoryRecord>, StoreError>;
}

pub type DynHistoryStore = Arc<dyn HistoryStore>;

/// Records are held oldest first; listing reverses.
fn push_unique(records: &mut Vec<HistoryRecord>, record: HistoryRecord) -> Result<(), StoreError> {
    if records.iter().any(|r| r.id == record.id) {
        return Err(StoreError::DuplicateId(record.id));
    }
    records.push(record);
    Ok(())
}

fn newest_first(records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    records.iter().rev().cloned().collect()
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryHistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), StoreError> {
        push_unique(&mut *self.records.write().await, record)
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        Ok(newest_first(&self.records.read().await))
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// History persisted as a JSON array in a single file.
///
/// The whole list is rewritten on every change, via a sibling temp file
/// and a rename so a crash never leaves a half-written history.
#[derive(Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
    records: RwLock<Vec<HistoryRecord>>,
}

impl JsonFileHistoryStore {
    /// Open the history at `path`. A missing file is an empty history.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records: Vec<HistoryRecord> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), count = records.len(), "History loaded");

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[HistoryRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        push_unique(&mut records, record)?;
        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let Some(pos) = records.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        let removed = records.remove(pos);
        if let Err(e) = self.persist(&records).await {
            records.insert(pos, removed);
            return Err(e);
        }
        Ok(true)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        self.persist(&[]).await?;
        records.clear();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        Ok(newest_first(&self.records.read().await))
    }
}
