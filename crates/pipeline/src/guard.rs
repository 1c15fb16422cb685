//! One generation activity at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::PipelineError;

/// Admits at most one single submission or batch at a time.
#[derive(Debug, Clone, Default)]
pub struct ProcessingGuard {
    active: Arc<AtomicBool>,
}

impl ProcessingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard, or fail with [`PipelineError::Busy`] if another
    /// activity holds it. Released when the permit is dropped.
    pub fn try_acquire(&self) -> Result<ProcessingPermit, PipelineError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::Busy)?;
        Ok(ProcessingPermit {
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Held for the duration of one activity.
#[derive(Debug)]
pub struct ProcessingPermit {
    active: Arc<AtomicBool>,
}

impl Drop for ProcessingPermit {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
