//! Physical limits for child batches
//!
//! A child batch sent to one shard may hold at most `max_write_batch_size`
//! operations and at most `max_batch_bytes` of estimated payload. Estimated
//! payload is the encoded operation plus a fixed per-operation framing cost,
//! plus a statement-id cost when the batch is a retryable write.
//!
//! The defaults mirror what shards accept; custom limits are set through
//! [`RouterConfig`](crate::RouterConfig).

use crate::error::Error;
use crate::operation::WriteOperation;

/// Size limits for child batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum operations per child batch (default: 100,000)
    pub max_write_batch_size: usize,

    /// Maximum estimated payload per child batch (default: 16MB)
    pub max_batch_bytes: usize,

    /// Framing bytes added to every operation (default: 2)
    pub per_op_overhead_bytes: usize,

    /// Extra bytes per operation under a retryable-write session (default: 8)
    pub retryable_write_overhead_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits {
            max_write_batch_size: 100_000,
            max_batch_bytes: 16 * 1024 * 1024, // 16MB
            per_op_overhead_bytes: 2,
            retryable_write_overhead_bytes: 8,
        }
    }
}

impl BatchLimits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        BatchLimits {
            max_write_batch_size: 10,
            max_batch_bytes: 1000,
            per_op_overhead_bytes: 0,
            retryable_write_overhead_bytes: 0,
        }
    }

    /// Estimated size of one operation inside a child batch
    pub fn estimated_size(&self, op: &WriteOperation, retryable_write: bool) -> usize {
        let mut size = op.size_bytes() + self.per_op_overhead_bytes;
        if retryable_write {
            size += self.retryable_write_overhead_bytes;
        }
        size
    }

    /// Check that an operation fits into an otherwise empty child batch
    pub fn validate_operation(
        &self,
        op: &WriteOperation,
        retryable_write: bool,
    ) -> Result<usize, Error> {
        let size = self.estimated_size(op, retryable_write);
        if size > self.max_batch_bytes {
            return Err(Error::OperationTooLarge {
                index: op.index(),
                size,
                max: self.max_batch_bytes,
            });
        }
        Ok(size)
    }

    /// Reject limits that could never admit an operation
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_write_batch_size == 0 {
            return Err(Error::Config(
                "max_write_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_batch_bytes == 0 {
            return Err(Error::Config(
                "max_batch_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
