//! The caller-facing pipeline: single submissions, retries and batches,
//! one activity at a time.

use std::sync::Arc;

use imagegen_core::{
    CreditLedgerEntry, GenerationFailure, GenerationRequest, HistoryRecord, ImageGenerator,
    SessionContext,
};
use imagegen_events::EventBus;
use imagegen_store::{DynHistoryStore, DynRecordStore, StoreError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchJob, BatchOrchestrator};
use crate::bookkeeping::Bookkeeper;
use crate::budget::CreditBudget;
use crate::config::PipelineConfig;
use crate::dispatch::dispatch;
use crate::error::PipelineError;
use crate::guard::ProcessingGuard;

/// A successful single submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub record: HistoryRecord,
    /// The charge against the user's balance; `None` when unmetered.
    pub charge: Option<CreditLedgerEntry>,
}

pub struct ImagePipeline {
    generator: Arc<dyn ImageGenerator>,
    bookkeeper: Arc<Bookkeeper>,
    orchestrator: BatchOrchestrator,
    config: PipelineConfig,
    guard: ProcessingGuard,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl ImagePipeline {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        records: Option<DynRecordStore>,
        history: DynHistoryStore,
        events: Arc<EventBus>,
        config: PipelineConfig,
    ) -> Self {
        let bookkeeper = Arc::new(Bookkeeper::new(records, history, events));
        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&generator),
            Arc::clone(&bookkeeper),
            config.call_timeout,
        );
        Self {
            generator,
            bookkeeper,
            orchestrator,
            config,
            guard: ProcessingGuard::new(),
            last_request: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.bookkeeper.events()
    }

    pub fn is_processing(&self) -> bool {
        self.guard.is_active()
    }

    // -----------------------------------------------------------------------
    // Single submission
    // -----------------------------------------------------------------------

    /// Generate one image.
    ///
    /// Failures come back as [`PipelineError::Generation`] carrying the
    /// user-facing message. On success the image is always returned, even
    /// if recording it in the backend or history failed.
    pub async fn submit(
        &self,
        ctx: &SessionContext,
        request: GenerationRequest,
    ) -> Result<SubmitOutcome, PipelineError> {
        let _permit = self.guard.try_acquire()?;
        *self.last_request.lock().await = Some(request.clone());
        self.generate(ctx, &request).await
    }

    /// Resubmit the whole of the most recent request.
    pub async fn retry_last(&self, ctx: &SessionContext) -> Result<SubmitOutcome, PipelineError> {
        let request = self
            .last_request
            .lock()
            .await
            .clone()
            .ok_or(PipelineError::NothingToRetry)?;
        tracing::info!(archetype = %request.archetype(), "Retrying last request");
        self.submit(ctx, request).await
    }

    pub async fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().await.clone()
    }

    async fn generate(
        &self,
        ctx: &SessionContext,
        request: &GenerationRequest,
    ) -> Result<SubmitOutcome, PipelineError> {
        let archetype = request.archetype();
        let cost = archetype.credit_cost();

        let available = self.bookkeeper.available_credits(ctx).await;
        if let Some(available) = available.filter(|&credits| credits < cost) {
            tracing::warn!(%archetype, required = cost, available, "Insufficient credits");
            return Err(GenerationFailure::insufficient_credits(archetype, available).into());
        }

        tracing::info!(%archetype, user_id = ?ctx.user_id(), "Generating image");

        let result = dispatch(
            self.generator.as_ref(),
            request,
            self.config.call_timeout,
            &CancellationToken::new(),
        )
        .await;

        let image_base64 = result.into_result().map_err(|failure| {
            tracing::warn!(
                %archetype,
                error_kind = failure.reason.label(),
                "Generation failed",
            );
            failure
        })?;

        let (record, backend_balance) = self
            .bookkeeper
            .record_success(ctx, request, image_base64)
            .await;

        let charge = ctx.user().and_then(|user| match backend_balance {
            Some(balance_after) => Some(CreditLedgerEntry {
                user_id: user.id.clone(),
                cost_charged: cost,
                balance_after,
            }),
            None => CreditLedgerEntry::charge(
                user.id.clone(),
                available.unwrap_or(user.credits),
                cost,
            ),
        });

        tracing::info!(history_id = %record.id, %archetype, "Image generated");

        Ok(SubmitOutcome { record, charge })
    }

    // -----------------------------------------------------------------------
    // Batch
    // -----------------------------------------------------------------------

    /// Run a batch under the processing guard.
    ///
    /// Refuses to start when the budget cannot pay for even the cheapest
    /// item. Otherwise per-item outcomes, including credit shortfalls
    /// part-way through, are reported in the returned [`BatchJob`].
    pub async fn run_batch(
        &self,
        ctx: &SessionContext,
        items: Vec<GenerationRequest>,
        budget: CreditBudget,
        cancel: &CancellationToken,
    ) -> Result<BatchJob, PipelineError> {
        let _permit = self.guard.try_acquire()?;

        let Some(cheapest) = items
            .iter()
            .map(GenerationRequest::archetype)
            .min_by_key(|a| a.credit_cost())
        else {
            return Err(PipelineError::EmptyBatch);
        };
        if !budget.can_afford(cheapest) {
            return Err(PipelineError::InsufficientCredits {
                archetype: cheapest,
                required: cheapest.credit_cost(),
                available: budget.remaining().unwrap_or_default(),
            });
        }

        Ok(self
            .orchestrator
            .run_batch(ctx, items, budget, self.config.concurrency, cancel)
            .await)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Generated images, newest first.
    pub async fn history(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        self.bookkeeper.history().list().await
    }

    pub async fn remove_from_history(&self, id: &str) -> Result<bool, StoreError> {
        self.bookkeeper.history().remove(id).await
    }

    pub async fn clear_history(&self) -> Result<(), StoreError> {
        self.bookkeeper.history().clear().await
    }
}
