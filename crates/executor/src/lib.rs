//! # Shardwrite Executor
//!
//! Executes a client batch write against a sharded namespace.
//!
//! A batch runs as a sequence of rounds. Each round:
//! 1. targets the operations that still need a shard ([`Targeter`])
//! 2. packs them into bounded child batches, one per endpoint ([`ChildBatchBuilder`])
//! 3. sends every child batch concurrently and waits for all replies ([`RoundDispatcher`])
//! 4. folds the replies into the [`OperationLedger`] and applies the retry policy
//!
//! ## Quick Start
//!
//! ```text
//! use shardwrite_executor::{BatchWriteExecutor, RoutingContext};
//!
//! let executor = BatchWriteExecutor::new(transport, RouterConfig::default())?;
//! let (result, stats) = executor.execute_batch(&RoutingContext::new(), &targeter, &request).await?;
//! assert!(result.ok);
//! ```
//!
//! ## Error Handling
//!
//! | Condition | Reported as |
//! |-----------|-------------|
//! | Unroutable or oversized operation | per-operation error |
//! | Stale routing | retried after refresh, then `NoProgressMade` |
//! | Transient server error | retried under a retryable-write session only |
//! | Stale epoch | per-operation error, never retried |
//! | Transient transaction error | [`Error::Aborted`] |
//! | Local shutdown | [`Error::Aborted`] |
//! | Cancelled routing context | [`Error::Cancelled`] |

#![warn(missing_docs)]

mod builder;
mod context;
mod dispatch;
mod error;
mod executor;
mod ledger;
mod response;
mod retry;
mod targeter;
mod transaction;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API
// =============================================================================

pub use builder::{ChildBatch, ChildBatchBuilder, RoundPlan};
pub use context::RoutingContext;
pub use dispatch::{
    ChildBatchCommand, DispatchOutcome, RoundDispatcher, ShardResponse, ShardWriteError, Transport,
};
pub use error::Error;
pub use executor::BatchWriteExecutor;
pub use ledger::{OperationLedger, OperationOutcome, RoundResults};
pub use response::{BatchResult, ExecutionStats, IndexedWriteError};
pub use retry::{ErrorClass, ProgressTracker, RetryPolicy};
pub use targeter::{Targetable, Targeter};
pub use transaction::{ActiveTransaction, TransactionContext};

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, Error>;
