//! Batch orchestration.
//!
//! Items are taken in order. Each one reserves its credit cost from the
//! shared [`BudgetTracker`] before its call is issued; an item the budget
//! cannot cover fails with `InsufficientCredits` without touching the
//! network, and the batch moves on. Up to `concurrency_limit` calls are in
//! flight at once. A progress event is published after every item.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use imagegen_core::{
    CreditLedgerEntry, GenerationFailure, GenerationRequest, GenerationResult, ImageGenerator,
    SessionContext,
};
use imagegen_events::GenerationEvent;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bookkeeping::Bookkeeper;
use crate::budget::{BudgetTracker, CreditBudget, Reservation};
use crate::dispatch::dispatch;

// ---------------------------------------------------------------------------
// BatchJob
// ---------------------------------------------------------------------------

/// The outcome of a batch run.
///
/// `results[i]` is the outcome of `items[i]`. Items never started because
/// the run was cancelled are recorded as `Cancelled` failures but are not
/// counted in `completed`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub items: Vec<GenerationRequest>,
    /// Items that reached an outcome, in any order.
    pub completed: usize,
    pub total: usize,
    pub results: Vec<GenerationResult>,
    /// History record id per item, for the ones that succeeded.
    pub history_ids: Vec<Option<String>>,
    /// One entry per committed charge, in commit order.
    pub ledger: Vec<CreditLedgerEntry>,
    pub cancelled: bool,
}

impl BatchJob {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded()
    }

    /// Failure counts keyed by [`ErrorKind::label`](imagegen_core::ErrorKind::label).
    pub fn failure_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.results.iter().filter_map(GenerationResult::error_kind) {
            *counts.entry(kind.label()).or_insert(0) += 1;
        }
        counts
    }

    /// Successful items as `(index, request, image_base64)`.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &GenerationRequest, &str)> {
        self.items
            .iter()
            .zip(&self.results)
            .enumerate()
            .filter_map(|(index, (request, result))| {
                result.image_base64().map(|image| (index, request, image))
            })
    }

    /// Total credits charged across the run.
    pub fn credits_spent(&self) -> u64 {
        self.ledger.iter().map(|e| u64::from(e.cost_charged)).sum()
    }
}

/// Running counters, published after every item.
struct Progress<'a> {
    batch_id: Uuid,
    bookkeeper: &'a Bookkeeper,
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    results: Vec<Option<GenerationResult>>,
}

impl<'a> Progress<'a> {
    fn new(batch_id: Uuid, bookkeeper: &'a Bookkeeper, total: usize) -> Self {
        Self {
            batch_id,
            bookkeeper,
            total,
            completed: 0,
            succeeded: 0,
            failed: 0,
            results: vec![None; total],
        }
    }

    fn finish(&mut self, index: usize, result: GenerationResult) {
        let failure = result.error_kind();
        self.completed += 1;
        match failure {
            None => self.succeeded += 1,
            Some(_) => self.failed += 1,
        }
        self.results[index] = Some(result);

        tracing::info!(
            batch_id = %self.batch_id,
            index,
            completed = self.completed,
            total = self.total,
            "Batch item finished",
        );

        self.bookkeeper
            .events()
            .publish(GenerationEvent::ItemCompleted {
                batch_id: self.batch_id,
                index,
                completed: self.completed,
                total: self.total,
                succeeded: self.succeeded,
                failed: self.failed,
                failure,
            });
    }

    /// Results in item order, filling never-started items as cancelled.
    fn into_results(self) -> Vec<GenerationResult> {
        self.results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| GenerationFailure::cancelled().into()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BatchOrchestrator
// ---------------------------------------------------------------------------

/// Drives a list of requests through the generator.
pub struct BatchOrchestrator {
    generator: Arc<dyn ImageGenerator>,
    bookkeeper: Arc<Bookkeeper>,
    call_timeout: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        bookkeeper: Arc<Bookkeeper>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            bookkeeper,
            call_timeout,
        }
    }

    /// Process `items` against `budget` until all are done or `cancel`
    /// fires.
    ///
    /// Cancellation is checked before each dispatch; calls already in
    /// flight are abandoned and recorded as `Cancelled`. A single item's
    /// failure never stops the batch.
    pub async fn run_batch(
        &self,
        ctx: &SessionContext,
        items: Vec<GenerationRequest>,
        budget: CreditBudget,
        concurrency_limit: usize,
        cancel: &CancellationToken,
    ) -> BatchJob {
        let batch_id = Uuid::now_v7();
        let total = items.len();
        let concurrency = concurrency_limit.max(1);
        let tracker = BudgetTracker::new(budget);
        let mut progress = Progress::new(batch_id, &self.bookkeeper, total);
        let mut history_ids: Vec<Option<String>> = vec![None; total];
        let mut ledger = Vec::new();

        tracing::info!(
            batch_id = %batch_id,
            total,
            concurrency,
            budget = ?budget.remaining(),
            "Batch started",
        );
        self.bookkeeper
            .events()
            .publish(GenerationEvent::BatchStarted { batch_id, total });

        let mut in_flight = FuturesUnordered::new();
        let mut next = 0;

        loop {
            while in_flight.len() < concurrency && next < total && !cancel.is_cancelled() {
                let index = next;
                next += 1;
                let request = &items[index];
                let archetype = request.archetype();

                match tracker.reserve(archetype.credit_cost()).await {
                    Ok(reservation) => {
                        tracing::debug!(batch_id = %batch_id, index, %archetype, "Dispatching item");
                        in_flight.push(async move {
                            let result =
                                dispatch(self.generator.as_ref(), request, self.call_timeout, cancel)
                                    .await;
                            (index, reservation, result)
                        });
                    }
                    Err(available) => {
                        tracing::warn!(
                            batch_id = %batch_id,
                            index,
                            %archetype,
                            required = archetype.credit_cost(),
                            available,
                            "Skipping item: insufficient credits",
                        );
                        progress.finish(
                            index,
                            GenerationFailure::insufficient_credits(archetype, available).into(),
                        );
                    }
                }
            }

            let Some((index, reservation, result)) = in_flight.next().await else {
                break;
            };

            let (result, success) = self
                .settle(ctx, &tracker, &items[index], reservation, result)
                .await;
            if let Some((history_id, entry)) = success {
                history_ids[index] = Some(history_id);
                ledger.extend(entry);
            }
            progress.finish(index, result);
        }
        drop(in_flight);

        let cancelled = cancel.is_cancelled();
        let completed = progress.completed;
        let results = progress.into_results();

        let job = BatchJob {
            id: batch_id,
            items,
            completed,
            total,
            results,
            history_ids,
            ledger,
            cancelled,
        };

        tracing::info!(
            batch_id = %batch_id,
            completed,
            total,
            succeeded = job.succeeded(),
            failed = job.failed(),
            cancelled,
            "Batch finished",
        );
        self.bookkeeper
            .events()
            .publish(GenerationEvent::BatchFinished {
                batch_id,
                succeeded: job.succeeded(),
                failed: job.failed(),
                cancelled,
            });

        job
    }

    /// Commit or release the item's reservation and, on success, run the
    /// bookkeeping. Returns the result and, for successes, the history id
    /// and ledger entry.
    async fn settle(
        &self,
        ctx: &SessionContext,
        tracker: &BudgetTracker,
        request: &GenerationRequest,
        reservation: Reservation,
        result: GenerationResult,
    ) -> (GenerationResult, Option<(String, Option<CreditLedgerEntry>)>) {
        let (image_base64, archetype) = match result {
            GenerationResult::Success {
                image_base64,
                archetype,
            } => (image_base64, archetype),
            GenerationResult::Failure(failure) => {
                tracker.release(reservation).await;
                tracing::warn!(
                    archetype = %request.archetype(),
                    error_kind = failure.reason.label(),
                    "Batch item failed",
                );
                return (GenerationResult::Failure(failure), None);
            }
        };

        let cost = reservation.cost();
        let charge = tracker.commit(reservation).await;
        let entry = match (ctx.user_id(), charge) {
            (Some(user_id), Some(charge)) => {
                CreditLedgerEntry::charge(user_id, charge.balance_before, cost)
            }
            _ => None,
        };

        let (record, _) = self
            .bookkeeper
            .record_success(ctx, request, image_base64.clone())
            .await;

        (
            GenerationResult::Success {
                image_base64,
                archetype,
            },
            Some((record.id, entry)),
        )
    }
}
