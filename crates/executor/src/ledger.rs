//! Operation ledger: per-batch progress of every write operation.
//!
//! The ledger is owned by one executor call. It records, for each operation
//! of the original batch:
//! - its [`OperationOutcome`]
//! - the endpoints it was dispatched to in the current round
//! - the shards that have already applied it (never re-sent)
//! - the results received for the current round
//!
//! The round dispatcher feeds shard results in with the `note_*` methods;
//! [`OperationLedger::finish_round`] then folds them into outcomes.

use std::collections::BTreeSet;

use shardwrite_core::{Endpoint, ShardId, WriteError};

use crate::response::{BatchResult, IndexedWriteError};

/// Progress of one logical write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Not yet resolved; targeted on the next round
    Pending,
    /// Applied on every endpoint it targeted
    Completed {
        /// Number of shards that applied the write
        applied: usize,
    },
    /// Failed with `error`
    Failed {
        /// Error attributed to the operation
        error: WriteError,
        /// Whether the retry policy may resend the operation
        retryable: bool,
    },
}

impl OperationOutcome {
    /// Completed or non-retryable failure
    pub fn is_terminal(&self) -> bool {
        match self {
            OperationOutcome::Pending => false,
            OperationOutcome::Completed { .. } => true,
            OperationOutcome::Failed { retryable, .. } => !retryable,
        }
    }

    /// Whether the next targeting pass should pick the operation up
    pub fn needs_targeting(&self) -> bool {
        !self.is_terminal()
    }
}

/// Result of one targeted write within a round
#[derive(Debug, Clone)]
enum WriteResult {
    Applied,
    Errored(WriteError),
    NotAttempted,
}

#[derive(Debug, Clone)]
struct OpState {
    outcome: OperationOutcome,
    in_flight: Vec<Endpoint>,
    // Some targeted endpoint was not sent this round
    held_back: bool,
    applied_shards: BTreeSet<ShardId>,
    round_results: Vec<(ShardId, WriteResult)>,
}

impl OpState {
    fn new() -> Self {
        OpState {
            outcome: OperationOutcome::Pending,
            in_flight: Vec::new(),
            held_back: false,
            applied_shards: BTreeSet::new(),
            round_results: Vec::new(),
        }
    }
}

/// What one round did to the operations it carried
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoundResults {
    /// Operations that became Completed
    pub completed: Vec<usize>,
    /// Operations that failed this round, with the error chosen for each
    pub failed: Vec<(usize, WriteError)>,
    /// Operations sent this round that must be sent again (not attempted)
    pub requeued: Vec<usize>,
}

impl RoundResults {
    /// Failures whose error signals stale routing
    pub fn stale_failures(&self) -> impl Iterator<Item = &(usize, WriteError)> {
        self.failed.iter().filter(|(_, e)| e.code.is_stale_routing())
    }
}

/// Per-batch operation state.
#[derive(Debug, Clone)]
pub struct OperationLedger {
    ops: Vec<OpState>,
    n: u64,
    n_modified: u64,
}

impl OperationLedger {
    /// Ledger for a batch of `len` operations, all Pending.
    pub fn new(len: usize) -> Self {
        OperationLedger {
            ops: (0..len).map(|_| OpState::new()).collect(),
            n: 0,
            n_modified: 0,
        }
    }

    /// Number of operations tracked
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Outcome of the operation at `index`
    pub fn outcome(&self, index: usize) -> &OperationOutcome {
        &self.ops[index].outcome
    }

    /// Indices the next targeting pass must route, in original order
    pub fn indices_to_target(&self) -> Vec<usize> {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| op.outcome.needs_targeting())
            .map(|(i, _)| i)
            .collect()
    }

    /// Shards that already applied the operation
    pub fn applied_shards(&self, index: usize) -> &BTreeSet<ShardId> {
        &self.ops[index].applied_shards
    }

    /// Whether every operation reached a terminal outcome
    pub fn is_finished(&self) -> bool {
        self.ops.iter().all(|op| op.outcome.is_terminal())
    }

    /// Total applied count reported by shards
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Total modified count reported by shards
    pub fn n_modified(&self) -> u64 {
        self.n_modified
    }

    /// Move retryable failures back to Pending before a new round.
    pub fn requeue_retryable(&mut self) -> usize {
        let mut requeued = 0;
        for op in &mut self.ops {
            if matches!(op.outcome, OperationOutcome::Failed { retryable: true, .. }) {
                op.outcome = OperationOutcome::Pending;
                requeued += 1;
            }
        }
        requeued
    }

    /// Record the endpoints the operation is sent to this round.
    ///
    /// Endpoints on shards that already applied the write are dropped. If
    /// none remain, the operation is completed on the spot. `held_back` marks
    /// an operation with targeted endpoints left for a later round; it cannot
    /// complete this round. Returns the endpoints left to send.
    pub fn note_targeted(
        &mut self,
        index: usize,
        endpoints: Vec<Endpoint>,
        held_back: bool,
    ) -> Vec<Endpoint> {
        let op = &mut self.ops[index];
        op.outcome = OperationOutcome::Pending;
        op.held_back = held_back;
        let remaining: Vec<Endpoint> = endpoints
            .into_iter()
            .filter(|ep| !op.applied_shards.contains(&ep.shard))
            .collect();
        if remaining.is_empty() && !held_back {
            op.outcome = OperationOutcome::Completed {
                applied: op.applied_shards.len(),
            };
        }
        op.in_flight = remaining.clone();
        op.round_results.clear();
        remaining
    }

    /// The operation could not be routed; terminal.
    pub fn note_target_error(&mut self, index: usize, error: WriteError) {
        let op = &mut self.ops[index];
        op.in_flight.clear();
        op.round_results.clear();
        op.outcome = OperationOutcome::Failed {
            error,
            retryable: false,
        };
    }

    /// Shard applied the write.
    pub fn note_write_applied(&mut self, index: usize, shard: &ShardId) {
        self.ops[index]
            .round_results
            .push((shard.clone(), WriteResult::Applied));
    }

    /// Shard reported an error for the write.
    pub fn note_write_error(&mut self, index: usize, shard: &ShardId, error: WriteError) {
        self.ops[index]
            .round_results
            .push((shard.clone(), WriteResult::Errored(error)));
    }

    /// Shard stopped before reaching the write (ordered child batch).
    pub fn note_write_not_attempted(&mut self, index: usize, shard: &ShardId) {
        self.ops[index]
            .round_results
            .push((shard.clone(), WriteResult::NotAttempted));
    }

    /// Accumulate the counts of a successful shard response.
    pub fn add_counts(&mut self, n: u64, n_modified: u64) {
        self.n += n;
        self.n_modified += n_modified;
    }

    /// Fold this round's shard results into operation outcomes.
    ///
    /// `is_retryable` classifies each error. An operation with several
    /// errors keeps the first non-retryable one, or else the first one.
    pub fn finish_round<F>(&mut self, is_retryable: F) -> RoundResults
    where
        F: Fn(&WriteError) -> bool,
    {
        let mut results = RoundResults::default();

        for (index, op) in self.ops.iter_mut().enumerate() {
            if op.in_flight.is_empty() {
                continue;
            }
            let in_flight = std::mem::take(&mut op.in_flight);
            let held_back = std::mem::replace(&mut op.held_back, false);
            let round_results = std::mem::take(&mut op.round_results);

            let mut errors = Vec::new();
            let mut unresolved = false;
            for endpoint in &in_flight {
                let result = round_results
                    .iter()
                    .find(|(shard, _)| shard == &endpoint.shard)
                    .map(|(_, r)| r);
                match result {
                    Some(WriteResult::Applied) => {
                        op.applied_shards.insert(endpoint.shard.clone());
                    }
                    Some(WriteResult::Errored(e)) => errors.push(e.clone()),
                    Some(WriteResult::NotAttempted) | None => unresolved = true,
                }
            }

            if !errors.is_empty() {
                let chosen = errors
                    .iter()
                    .find(|e| !is_retryable(e))
                    .unwrap_or(&errors[0])
                    .clone();
                let retryable = is_retryable(&chosen);
                op.outcome = OperationOutcome::Failed {
                    error: chosen.clone(),
                    retryable,
                };
                results.failed.push((index, chosen));
            } else if unresolved || held_back {
                op.outcome = OperationOutcome::Pending;
                results.requeued.push(index);
            } else {
                op.outcome = OperationOutcome::Completed {
                    applied: op.applied_shards.len(),
                };
                results.completed.push(index);
            }
        }

        results
    }

    /// Lowest-index terminal failure, if any
    pub fn first_terminal_failure(&self) -> Option<(usize, &WriteError)> {
        self.ops.iter().enumerate().find_map(|(i, op)| match &op.outcome {
            OperationOutcome::Failed {
                error,
                retryable: false,
            } => Some((i, error)),
            _ => None,
        })
    }

    /// Fail every uncompleted operation after `index` with `error`.
    ///
    /// Used by ordered batches. Later operations report the first failure,
    /// even when they already hold an error of their own (e.g. a targeting
    /// error recorded in the same round). Returns how many outcomes changed.
    pub fn skip_after(&mut self, index: usize, error: &WriteError) -> usize {
        let skipped = OperationOutcome::Failed {
            error: error.clone(),
            retryable: false,
        };
        let mut changed = 0;
        for op in self.ops.iter_mut().skip(index + 1) {
            if matches!(op.outcome, OperationOutcome::Completed { .. }) || op.outcome == skipped {
                continue;
            }
            op.outcome = skipped.clone();
            changed += 1;
        }
        changed
    }

    /// Fail every unresolved operation with `error`.
    pub fn fail_unresolved(&mut self, error: &WriteError) -> usize {
        let mut failed = 0;
        for op in &mut self.ops {
            if !op.outcome.is_terminal() {
                op.outcome = OperationOutcome::Failed {
                    error: error.clone(),
                    retryable: false,
                };
                failed += 1;
            }
        }
        failed
    }

    /// Build the client response. Every operation must be terminal.
    pub fn to_result(&self) -> BatchResult {
        let write_errors = self
            .ops
            .iter()
            .enumerate()
            .filter_map(|(i, op)| match &op.outcome {
                OperationOutcome::Failed { error, .. } => {
                    Some(IndexedWriteError::new(i, error.clone()))
                }
                _ => None,
            })
            .collect();

        BatchResult {
            ok: true,
            n: self.n,
            n_modified: self.n_modified,
            write_errors,
        }
    }
}
