//! Core types for the shardwrite router
//!
//! This crate defines the data model shared by the write executor:
//! - Namespace, ShardId, RoutingVersion, Endpoint: shard addressing
//! - SessionInfo: logical session and retryable-write transaction number
//! - WriteOperation, BatchedWriteRequest: the client batch
//! - ErrorCode, WriteError: per-operation status values
//! - BatchLimits, RouterConfig: child-batch thresholds and retry budget
//! - Error: data-model error hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod limits;
pub mod operation;
pub mod types;

pub use config::{RouterConfig, CONFIG_FILE_NAME, DEFAULT_MAX_ROUNDS_WITHOUT_PROGRESS};
pub use error::{Error, ErrorCode, Result, WriteError, TRANSIENT_TRANSACTION_ERROR_LABEL};
pub use limits::BatchLimits;
pub use operation::{
    BatchType, BatchedWriteRequest, DeleteEntry, UpdateEntry, WriteOp, WriteOperation,
};
pub use types::{Endpoint, Namespace, RoutingVersion, SessionInfo, ShardId};

/// Document type carried by write operations
pub type Document = serde_json::Value;
