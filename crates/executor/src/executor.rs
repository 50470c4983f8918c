//! The batch write executor.
//!
//! Runs one client batch against a sharded namespace as a sequence of rounds:
//! target and build child batches, dispatch them concurrently, fold the results
//! into the ledger, then decide whether another round is needed.

use std::sync::Arc;

use shardwrite_core::{BatchedWriteRequest, RouterConfig, WriteError};

use crate::builder::ChildBatchBuilder;
use crate::context::RoutingContext;
use crate::dispatch::{apply_outcomes, RoundDispatcher, Transport};
use crate::ledger::OperationLedger;
use crate::response::{BatchResult, ExecutionStats};
use crate::retry::{ProgressTracker, RetryPolicy};
use crate::targeter::Targeter;
use crate::transaction::TransactionAdapter;
use crate::{Error, Result};

/// Executes batched writes against shards.
///
/// The executor is **stateless** between calls: every call owns its own
/// ledger, so one executor can serve concurrent batches.
///
/// # Thread Safety
///
/// `BatchWriteExecutor` is `Send + Sync` and can be shared across tasks.
///
/// # Example
///
/// ```ignore
/// use shardwrite_executor::{BatchWriteExecutor, RoutingContext};
/// use shardwrite_core::{BatchedWriteRequest, Namespace, RouterConfig};
///
/// let executor = BatchWriteExecutor::new(transport, RouterConfig::default())?;
/// let request = BatchedWriteRequest::insert(Namespace::new("db", "coll"), docs);
/// let (result, stats) = executor
///     .execute_batch(&RoutingContext::new(), &targeter, &request)
///     .await?;
/// ```
pub struct BatchWriteExecutor {
    transport: Arc<dyn Transport>,
    config: RouterConfig,
}

impl BatchWriteExecutor {
    /// Create an executor sending child batches through `transport`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Core` if `config` is invalid.
    pub fn new(transport: Arc<dyn Transport>, config: RouterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    /// Router configuration in force
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Execute one client batch.
    ///
    /// Per-operation failures are reported inside the returned
    /// [`BatchResult`]. The call itself fails only when the routing context is
    /// cancelled, when a transaction must be aborted, or on shutdown-class
    /// transport failures.
    pub async fn execute_batch(
        &self,
        ctx: &RoutingContext,
        targeter: &dyn Targeter,
        request: &BatchedWriteRequest,
    ) -> Result<(BatchResult, ExecutionStats)> {
        let txn = TransactionAdapter::new(ctx.transaction());
        let policy = RetryPolicy::new(request.is_retryable_write(), txn.is_active());
        let builder = ChildBatchBuilder::new(self.config.limits());
        let dispatcher = RoundDispatcher::new(self.transport.as_ref());
        let mut progress = ProgressTracker::new(self.config.max_rounds_without_progress);
        let mut ledger = OperationLedger::new(request.len());
        let mut stats = ExecutionStats::default();

        tracing::debug!(
            target: "shardwrite::exec",
            namespace = %request.namespace(),
            ops = request.len(),
            ordered = request.is_ordered(),
            in_transaction = txn.is_active(),
            "Executing batch write"
        );

        while !ledger.is_finished() {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }
            stats.num_rounds += 1;
            ledger.requeue_retryable();

            let plan = builder.build_round(request, targeter, &ledger);
            let mut progressed = !plan.target_errors.is_empty() || !plan.already_applied.is_empty();
            for (index, error) in plan.target_errors.iter().cloned() {
                ledger.note_target_error(index, error);
            }
            for &index in &plan.already_applied {
                ledger.note_targeted(index, Vec::new(), false);
            }
            for (index, endpoints) in plan.sent_endpoints() {
                ledger.note_targeted(index, endpoints, plan.deferred.contains(&index));
            }

            if !plan.is_empty() {
                let outcomes = tokio::select! {
                    biased;
                    _ = ctx.cancellation_token().cancelled() => return Err(Error::Cancelled),
                    outcomes = dispatcher.dispatch(request, &plan.batches, txn.is_active()) => outcomes,
                };
                for batch in &plan.batches {
                    stats.note_child_batch(&batch.endpoint.shard);
                }
                apply_outcomes(&mut ledger, &plan.batches, outcomes, request.is_ordered(), &txn)?;
            }

            let round = ledger.finish_round(|e| policy.is_retryable(e));
            progressed |= !round.completed.is_empty()
                || round.failed.iter().any(|(_, e)| !policy.is_retryable(e));

            let stale = round.stale_failures().count();
            if stale > 0 {
                stats.num_stale_batches += 1;
                if !txn.is_active() {
                    tracing::debug!(
                        target: "shardwrite::retry",
                        round = stats.num_rounds,
                        stale,
                        "Stale routing, refreshing metadata"
                    );
                    match targeter.refresh_metadata(request.namespace()).await {
                        Ok(changed) => {
                            if changed && !targeter.no_progress_possible() {
                                progressed = true;
                            }
                        }
                        Err(error) => {
                            // Next round targets with the cached routing table
                            tracing::warn!(
                                target: "shardwrite::retry",
                                namespace = %request.namespace(),
                                %error,
                                "Routing metadata refresh failed"
                            );
                        }
                    }
                }
            }

            if request.is_ordered() {
                let first_failure = ledger
                    .first_terminal_failure()
                    .map(|(index, error)| (index, error.clone()));
                if let Some((index, error)) = first_failure {
                    let skipped = ledger.skip_after(index, &error);
                    if skipped > 0 {
                        tracing::debug!(target: "shardwrite::exec", index, skipped, "Ordered batch stopped at failure");
                    }
                }
            }

            tracing::trace!(
                target: "shardwrite::exec",
                round = stats.num_rounds,
                completed = round.completed.len(),
                failed = round.failed.len(),
                requeued = round.requeued.len(),
                progressed,
                "Round finished"
            );

            if !ledger.is_finished() && progress.record_round(progressed) {
                ledger.fail_unresolved(&WriteError::no_progress(stats.num_rounds));
            }
        }

        let result = ledger.to_result();
        tracing::debug!(
            target: "shardwrite::exec",
            rounds = stats.num_rounds,
            stale_batches = stats.num_stale_batches,
            child_batches = stats.num_child_batches,
            n = result.n,
            errors = result.write_errors.len(),
            "Batch write finished"
        );
        Ok((result, stats))
    }
}
