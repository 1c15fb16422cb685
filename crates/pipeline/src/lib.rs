//! Generation pipeline: the single-submission path and the batch
//! orchestrator, with credit budgeting and the one-activity-at-a-time
//! processing guard.

pub mod batch;
pub mod bookkeeping;
pub mod budget;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod pipeline;

pub use batch::{BatchJob, BatchOrchestrator};
pub use bookkeeping::Bookkeeper;
pub use budget::{BudgetTracker, Charge, CreditBudget, Reservation};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use guard::{ProcessingGuard, ProcessingPermit};
pub use pipeline::{ImagePipeline, SubmitOutcome};
