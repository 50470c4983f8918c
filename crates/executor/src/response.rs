//! Client-visible batch result and execution statistics.

use serde::{Deserialize, Serialize};
use shardwrite_core::{ErrorCode, ShardId, WriteError};
use std::collections::BTreeSet;

/// Per-operation error, attributed by original batch index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedWriteError {
    /// Original batch index
    pub index: usize,
    /// Numeric error code
    pub code: i32,
    /// Error code name
    #[serde(rename = "codeName")]
    pub code_name: String,
    /// Error message
    #[serde(rename = "errmsg")]
    pub reason: String,
    /// Full status, for callers that classify errors
    #[serde(skip)]
    pub error: Option<WriteError>,
}

impl IndexedWriteError {
    /// Build from an operation index and its status
    pub fn new(index: usize, error: WriteError) -> Self {
        IndexedWriteError {
            index,
            code: error.code.code(),
            code_name: error.code.name().to_string(),
            reason: error.reason.clone(),
            error: Some(error),
        }
    }

    /// Typed error code
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// Aggregated response of one batch write
///
/// `ok` reflects only whether the router could run the batch; per-operation
/// failures are listed in `write_errors` in original index order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Router-level status
    pub ok: bool,
    /// Documents inserted, matched or deleted
    pub n: u64,
    /// Documents modified (updates only)
    #[serde(rename = "nModified")]
    pub n_modified: u64,
    /// Per-operation errors ordered by index
    #[serde(rename = "writeErrors", default, skip_serializing_if = "Vec::is_empty")]
    pub write_errors: Vec<IndexedWriteError>,
}

impl BatchResult {
    /// Whether any operation failed
    pub fn has_write_errors(&self) -> bool {
        !self.write_errors.is_empty()
    }

    /// Error reported for the operation at `index`
    pub fn write_error_at(&self, index: usize) -> Option<&IndexedWriteError> {
        self.write_errors.iter().find(|e| e.index == index)
    }
}

/// Execution statistics for diagnostics and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Rounds executed
    pub num_rounds: usize,
    /// Rounds that saw at least one stale routing error
    pub num_stale_batches: usize,
    /// Child batches sent across all rounds
    pub num_child_batches: usize,
    /// Shards that received at least one child batch
    pub targeted_shards: BTreeSet<ShardId>,
}

impl ExecutionStats {
    /// Record a child batch sent to `shard`
    pub fn note_child_batch(&mut self, shard: &ShardId) {
        self.num_child_batches += 1;
        if !self.targeted_shards.contains(shard) {
            self.targeted_shards.insert(shard.clone());
        }
    }
}
