//! Shardwrite - write routing for a sharded query router
//!
//! Shardwrite takes a client batch of inserts, updates or deletes against one
//! sharded namespace and drives it to completion across the shards that own
//! the affected data.
//!
//! # Quick Start
//!
//! ```ignore
//! use shardwrite::{BatchWriteExecutor, BatchedWriteRequest, Namespace, RouterConfig, RoutingContext};
//!
//! let executor = BatchWriteExecutor::new(transport, RouterConfig::default())?;
//! let request = BatchedWriteRequest::insert(Namespace::new("db", "coll"), docs);
//!
//! let (result, stats) = executor
//!     .execute_batch(&RoutingContext::new(), &targeter, &request)
//!     .await?;
//! for err in &result.write_errors {
//!     eprintln!("op {} failed: {}", err.index, err.reason);
//! }
//! ```
//!
//! # Architecture
//!
//! The data model (namespaces, endpoints, operations, limits, configuration)
//! lives in `shardwrite-core`. The round-based executor and its seams
//! ([`Targeter`], [`Transport`], [`TransactionContext`]) live in
//! `shardwrite-executor`. Both are re-exported here.

// Re-export the executor API
pub use shardwrite_executor::*;

// Re-export the data model so users don't need shardwrite-core directly
pub use shardwrite_core::{
    BatchLimits, BatchType, BatchedWriteRequest, DeleteEntry, Document, Endpoint, ErrorCode,
    Namespace, RouterConfig, RoutingVersion, SessionInfo, ShardId, UpdateEntry, WriteError,
    WriteOp, WriteOperation, CONFIG_FILE_NAME, DEFAULT_MAX_ROUNDS_WITHOUT_PROGRESS,
    TRANSIENT_TRANSACTION_ERROR_LABEL,
};

/// Data-model error (configuration, oversized operations)
pub use shardwrite_core::Error as CoreError;
