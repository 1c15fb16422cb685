//! Post-success persistence shared by the single and batch paths.
//!
//! Every step here is best effort: failures are logged and swallowed, and
//! never take an already generated image away from the caller.

use std::sync::Arc;

use imagegen_core::types::Credits;
use imagegen_core::{GenerationRecord, GenerationRequest, HistoryRecord, SessionContext};
use imagegen_events::{EventBus, GenerationEvent};
use imagegen_store::{DynHistoryStore, DynRecordStore};

/// Persists the side effects of a successful generation.
pub struct Bookkeeper {
    records: Option<DynRecordStore>,
    history: DynHistoryStore,
    events: Arc<EventBus>,
}

impl Bookkeeper {
    pub fn new(
        records: Option<DynRecordStore>,
        history: DynHistoryStore,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            records,
            history,
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn history(&self) -> &DynHistoryStore {
        &self.history
    }

    /// Credits the session can spend right now; `None` when unmetered.
    ///
    /// Reads the backend balance when a record store is configured, since
    /// the session's own figure goes stale after every charge. Falls back to
    /// that figure if the backend cannot be reached.
    pub async fn available_credits(&self, ctx: &SessionContext) -> Option<Credits> {
        let user = ctx.user()?;
        let Some(store) = &self.records else {
            return Some(user.credits);
        };
        match store.get_credits(&user.id).await {
            Ok(credits) => Some(credits),
            Err(e) => {
                tracing::warn!(
                    user_id = %user.id,
                    error = %e,
                    "Could not read backend balance; using session credits",
                );
                Some(user.credits)
            }
        }
    }

    /// Record a successful generation: deduct the backend balance, save
    /// the generation row, append to local history and announce it.
    ///
    /// Returns the history record and, when the backend deduction went
    /// through, the balance it reported.
    pub async fn record_success(
        &self,
        ctx: &SessionContext,
        request: &GenerationRequest,
        image_base64: String,
    ) -> (HistoryRecord, Option<Credits>) {
        let record = HistoryRecord::from_success(request, image_base64);
        let backend_balance = self.persist_remote(ctx, &record).await;

        if let Err(e) = self.history.append(record.clone()).await {
            tracing::warn!(
                history_id = %record.id,
                error = %e,
                "Failed to append to history",
            );
        }

        self.events.publish(GenerationEvent::ImageGenerated {
            history_id: record.id.clone(),
            archetype: record.archetype,
        });

        (record, backend_balance)
    }

    async fn persist_remote(&self, ctx: &SessionContext, record: &HistoryRecord) -> Option<Credits> {
        let (Some(store), Some(user_id)) = (&self.records, ctx.user_id()) else {
            return None;
        };
        let cost = record.archetype.credit_cost();

        let balance = match store.deduct_credits(user_id, cost).await {
            Ok(balance) => {
                tracing::debug!(user_id, cost, balance, "Credits deducted");
                Some(balance)
            }
            Err(e) => {
                tracing::warn!(user_id, cost, error = %e, "Failed to deduct credits");
                None
            }
        };

        if let Err(e) = store
            .save_generation(&GenerationRecord::new(user_id, record))
            .await
        {
            tracing::warn!(
                user_id,
                history_id = %record.id,
                error = %e,
                "Failed to save generation record",
            );
        }

        balance
    }
}
