//! Credit balances and the generation audit log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use imagegen_core::types::{Credits, UserId};
use imagegen_core::GenerationRecord;
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Remote bookkeeping for authenticated users.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current balance for `user_id`.
    async fn get_credits(&self, user_id: &str) -> Result<Credits, StoreError>;

    /// Subtract `amount` and return the new balance.
    ///
    /// Fails with [`StoreError::InsufficientCredits`] instead of going
    /// negative; the balance is unchanged in that case.
    async fn deduct_credits(&self, user_id: &str, amount: Credits) -> Result<Credits, StoreError>;

    /// Append one successful generation to the audit log.
    async fn save_generation(&self, record: &GenerationRecord) -> Result<(), StoreError>;
}

pub type DynRecordStore = Arc<dyn RecordStore>;

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    credits: HashMap<UserId, Credits>,
    generations: Vec<GenerationRecord>,
}

/// Process-local [`RecordStore`], used by tests and offline runs.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user with a starting balance.
    pub fn with_user(mut self, user_id: impl Into<UserId>, credits: Credits) -> Self {
        self.state.get_mut().credits.insert(user_id.into(), credits);
        self
    }

    pub async fn set_credits(&self, user_id: impl Into<UserId>, credits: Credits) {
        self.state.lock().await.credits.insert(user_id.into(), credits);
    }

    /// Every generation saved so far, oldest first.
    pub async fn generations(&self) -> Vec<GenerationRecord> {
        self.state.lock().await.generations.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_credits(&self, user_id: &str) -> Result<Credits, StoreError> {
        self.state
            .lock()
            .await
            .credits
            .get(user_id)
            .copied()
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
    }

    async fn deduct_credits(&self, user_id: &str, amount: Credits) -> Result<Credits, StoreError> {
        let mut state = self.state.lock().await;
        let balance = state
            .credits
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        let remaining = balance
            .checked_sub(amount)
            .ok_or(StoreError::InsufficientCredits {
                required: amount,
                available: *balance,
            })?;
        *balance = remaining;
        Ok(remaining)
    }

    async fn save_generation(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        self.state.lock().await.generations.push(record.clone());
        Ok(())
    }
}
