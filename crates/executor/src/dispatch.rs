//! Round dispatch: concurrent fan-out of child batches and fan-in of results.
//!
//! A round is a barrier. Every child batch is sent at once through the
//! [`Transport`], and results are applied to the ledger only after all sends
//! have returned.

use async_trait::async_trait;
use futures::future::join_all;
use shardwrite_core::{BatchType, BatchedWriteRequest, Endpoint, Namespace, SessionInfo, WriteError, WriteOperation};

use crate::builder::ChildBatch;
use crate::error::Error;
use crate::ledger::OperationLedger;
use crate::transaction::{check_fatal_transport, TransactionAdapter};

/// Command sent to one shard for one child batch
#[derive(Debug, Clone, PartialEq)]
pub struct ChildBatchCommand {
    /// Target namespace
    pub namespace: Namespace,
    /// Kind of every operation in the batch
    pub batch_type: BatchType,
    /// Whether the shard must stop at the first error
    pub ordered: bool,
    /// Operations in batch order; each keeps its original index
    pub operations: Vec<WriteOperation>,
    /// Session attached to the client batch
    pub session: Option<SessionInfo>,
    /// Whether the batch runs inside a multi-statement transaction
    pub in_transaction: bool,
}

impl ChildBatchCommand {
    /// Build the command for `batch`.
    pub fn for_batch(request: &BatchedWriteRequest, batch: &ChildBatch, in_transaction: bool) -> Self {
        ChildBatchCommand {
            namespace: request.namespace().clone(),
            batch_type: request.batch_type(),
            ordered: request.is_ordered(),
            operations: batch
                .writes
                .iter()
                .filter_map(|&index| request.operation(index).cloned())
                .collect(),
            session: request.session().copied(),
            in_transaction,
        }
    }

    /// Original indices of the carried operations
    pub fn indices(&self) -> Vec<usize> {
        self.operations.iter().map(|op| op.index()).collect()
    }
}

/// Per-write error inside a shard response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardWriteError {
    /// Position inside the child batch
    pub index: usize,
    /// Reported status
    pub error: WriteError,
}

/// Parsed shard reply to a child batch command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardResponse {
    /// Command-level error; applies to every write of the batch
    pub status: Option<WriteError>,
    /// Documents inserted, matched or deleted
    pub n: u64,
    /// Documents modified
    pub n_modified: u64,
    /// Per-write errors keyed by in-batch position
    pub write_errors: Vec<ShardWriteError>,
}

impl ShardResponse {
    /// Successful response applying `n` documents
    pub fn ok(n: u64) -> Self {
        ShardResponse {
            n,
            ..Default::default()
        }
    }

    /// Response whose command failed as a whole
    pub fn command_error(error: WriteError) -> Self {
        ShardResponse {
            status: Some(error),
            ..Default::default()
        }
    }

    /// Set the modified count
    pub fn with_n_modified(mut self, n_modified: u64) -> Self {
        self.n_modified = n_modified;
        self
    }

    /// Add an error for the write at in-batch position `index`
    pub fn with_write_error(mut self, index: usize, error: WriteError) -> Self {
        self.write_errors.push(ShardWriteError { index, error });
        self
    }

    /// Error reported for in-batch position `index`
    pub fn error_at(&self, index: usize) -> Option<&WriteError> {
        self.write_errors
            .iter()
            .find(|e| e.index == index)
            .map(|e| &e.error)
    }

    /// Lowest in-batch position carrying an error
    pub fn first_error_index(&self) -> Option<usize> {
        self.write_errors.iter().map(|e| e.index).min()
    }
}

/// Outcome of sending one child batch: a parsed reply or a transport failure
pub type DispatchOutcome = Result<ShardResponse, WriteError>;

/// Network seam to the shards.
///
/// Implementations perform the actual remote call. A returned `Err` is a
/// transport-level failure (unreachable host, cancelled send, local shutdown);
/// shard-reported failures belong in the [`ShardResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one child batch command to `endpoint`
    async fn send(&self, endpoint: &Endpoint, command: ChildBatchCommand) -> DispatchOutcome;
}

/// Sends a round's child batches and folds the results into the ledger
pub struct RoundDispatcher<'a> {
    transport: &'a dyn Transport,
}

impl<'a> RoundDispatcher<'a> {
    /// Dispatcher over `transport`
    pub fn new(transport: &'a dyn Transport) -> Self {
        RoundDispatcher { transport }
    }

    /// Send every batch concurrently and wait for all of them.
    ///
    /// Outcomes are returned in `batches` order.
    pub async fn dispatch(
        &self,
        request: &BatchedWriteRequest,
        batches: &[ChildBatch],
        in_transaction: bool,
    ) -> Vec<DispatchOutcome> {
        let sends = batches.iter().map(|batch| {
            let command = ChildBatchCommand::for_batch(request, batch, in_transaction);
            tracing::debug!(
                target: "shardwrite::dispatch",
                endpoint = %batch.endpoint,
                writes = batch.len(),
                bytes = batch.size_bytes,
                "Sending child batch"
            );
            self.transport.send(&batch.endpoint, command)
        });
        join_all(sends).await
    }
}

/// Record every outcome of a round in the ledger.
///
/// Aborts the call for shutdown-class transport failures and, inside a
/// transaction, for transient transaction errors.
pub(crate) fn apply_outcomes(
    ledger: &mut OperationLedger,
    batches: &[ChildBatch],
    outcomes: Vec<DispatchOutcome>,
    ordered: bool,
    txn: &TransactionAdapter<'_>,
) -> Result<(), Error> {
    for (batch, outcome) in batches.iter().zip(outcomes) {
        let shard = &batch.endpoint.shard;
        match outcome {
            Err(error) => {
                tracing::warn!(target: "shardwrite::dispatch", endpoint = %batch.endpoint, %error, "Child batch send failed");
                check_fatal_transport(&error)?;
                txn.check_transient(&error)?;
                for &index in &batch.writes {
                    ledger.note_write_error(index, shard, error.clone());
                }
            }
            Ok(ShardResponse {
                status: Some(error),
                ..
            }) => {
                tracing::debug!(target: "shardwrite::dispatch", endpoint = %batch.endpoint, %error, "Child batch command failed");
                txn.check_transient(&error)?;
                for &index in &batch.writes {
                    ledger.note_write_error(index, shard, error.clone());
                }
            }
            Ok(response) => {
                for e in &response.write_errors {
                    txn.check_transient(&e.error)?;
                }
                ledger.add_counts(response.n, response.n_modified);
                let stop_at = if ordered {
                    response.first_error_index()
                } else {
                    None
                };
                for (position, &index) in batch.writes.iter().enumerate() {
                    if let Some(error) = response.error_at(position) {
                        ledger.note_write_error(index, shard, error.clone());
                    } else if stop_at.map_or(false, |stop| position > stop) {
                        ledger.note_write_not_attempted(index, shard);
                    } else {
                        ledger.note_write_applied(index, shard);
                    }
                }
            }
        }
    }
    Ok(())
}
