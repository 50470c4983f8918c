//! Error types for the write router
//!
//! Two kinds of error live here:
//! - [`ErrorCode`] / [`WriteError`]: status values reported by shards (or
//!   synthesised by the router) and attributed to individual write operations.
//!   These are data, not Rust errors: they end up in a batch response.
//! - [`Error`]: failures of the data-model layer itself (targeting, limits,
//!   configuration). We use `thiserror` for `Display` and `Error`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error label a server attaches to errors that doom the whole transaction
/// but that a client may fix by retrying the transaction from the start.
pub const TRANSIENT_TRANSACTION_ERROR_LABEL: &str = "TransientTransactionError";

/// Server error codes understood by the router
///
/// Numeric values match the codes shards put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Unclassified failure
    UnknownError,
    /// Target host could not be reached
    HostUnreachable,
    /// Network operation timed out
    NetworkTimeout,
    /// Operation made no progress after repeated stale-routing retries
    NoProgressMade,
    /// Outstanding request was cancelled before it completed
    CallbackCanceled,
    /// Server is shutting down
    ShutdownInProgress,
    /// Concurrent transaction touched the same document
    WriteConflict,
    /// Shard's routing version differs from the one the router sent
    StaleShardVersion,
    /// Collection was dropped and recreated since routing was loaded
    StaleEpoch,
    /// Primary stepped down while the operation ran
    PrimarySteppedDown,
    /// Single operation exceeds the maximum batch payload size
    ObjectTooLarge,
    /// Node is no longer primary
    NotPrimary,
    /// Operation interrupted because the node is shutting down
    InterruptedAtShutdown,
    /// Operation interrupted by a replica-set state change
    InterruptedDueToReplStateChange,
    /// Node is neither primary nor secondary-ok
    NotPrimaryNoSecondaryOk,
    /// Node is neither primary nor secondary
    NotPrimaryOrSecondary,
    /// Operation could not be routed to any shard (router-local)
    InvalidTarget,
}

impl ErrorCode {
    /// Numeric wire code
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::UnknownError => 8,
            ErrorCode::HostUnreachable => 6,
            ErrorCode::NoProgressMade => 82,
            ErrorCode::NetworkTimeout => 89,
            ErrorCode::CallbackCanceled => 90,
            ErrorCode::ShutdownInProgress => 91,
            ErrorCode::WriteConflict => 112,
            ErrorCode::StaleShardVersion => 63,
            ErrorCode::StaleEpoch => 150,
            ErrorCode::PrimarySteppedDown => 189,
            ErrorCode::ObjectTooLarge => 10334,
            ErrorCode::NotPrimary => 10107,
            ErrorCode::InterruptedAtShutdown => 11600,
            ErrorCode::InterruptedDueToReplStateChange => 11602,
            ErrorCode::NotPrimaryNoSecondaryOk => 13435,
            ErrorCode::NotPrimaryOrSecondary => 13436,
            ErrorCode::InvalidTarget => 20001,
        }
    }

    /// Wire name of the code
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::UnknownError => "UnknownError",
            ErrorCode::HostUnreachable => "HostUnreachable",
            ErrorCode::NoProgressMade => "NoProgressMade",
            ErrorCode::NetworkTimeout => "NetworkTimeout",
            ErrorCode::CallbackCanceled => "CallbackCanceled",
            ErrorCode::ShutdownInProgress => "ShutdownInProgress",
            ErrorCode::WriteConflict => "WriteConflict",
            ErrorCode::StaleShardVersion => "StaleShardVersion",
            ErrorCode::StaleEpoch => "StaleEpoch",
            ErrorCode::PrimarySteppedDown => "PrimarySteppedDown",
            ErrorCode::ObjectTooLarge => "BSONObjectTooLarge",
            ErrorCode::NotPrimary => "NotWritablePrimary",
            ErrorCode::InterruptedAtShutdown => "InterruptedAtShutdown",
            ErrorCode::InterruptedDueToReplStateChange => "InterruptedDueToReplStateChange",
            ErrorCode::NotPrimaryNoSecondaryOk => "NotPrimaryNoSecondaryOk",
            ErrorCode::NotPrimaryOrSecondary => "NotPrimaryOrSecondary",
            ErrorCode::InvalidTarget => "InvalidTarget",
        }
    }

    /// Shard rejected the write because the router's routing version is outdated
    ///
    /// `StaleEpoch` is not stale routing: the collection identity changed.
    pub fn is_stale_routing(&self) -> bool {
        matches!(self, ErrorCode::StaleShardVersion)
    }

    /// Transient errors that are safe to retry under a retryable-write session
    pub fn is_retryable_write_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::HostUnreachable
                | ErrorCode::NetworkTimeout
                | ErrorCode::ShutdownInProgress
                | ErrorCode::PrimarySteppedDown
                | ErrorCode::NotPrimary
                | ErrorCode::InterruptedAtShutdown
                | ErrorCode::InterruptedDueToReplStateChange
                | ErrorCode::NotPrimaryNoSecondaryOk
                | ErrorCode::NotPrimaryOrSecondary
        )
    }

    /// The local process is going away
    pub fn is_shutdown_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::ShutdownInProgress | ErrorCode::InterruptedAtShutdown
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// Status attached to a single write operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteError {
    /// Error code
    pub code: ErrorCode,
    /// Human readable reason
    pub reason: String,
    /// Server error labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl WriteError {
    /// Create a write error without labels
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        WriteError {
            code,
            reason: reason.into(),
            labels: Vec::new(),
        }
    }

    /// Attach an error label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Whether the given label is present
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Synthetic error reported when the stale-routing retry budget runs out
    pub fn no_progress(rounds: usize) -> Self {
        WriteError::new(
            ErrorCode::NoProgressMade,
            format!("no progress was made executing batch write op after {rounds} rounds"),
        )
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.reason)
    }
}

/// Error types for the router data model
#[derive(Debug, Error)]
pub enum Error {
    /// Operation cannot be routed to any shard
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// A single operation exceeds the per-child-batch payload limit
    #[error("Operation {index} too large: {size} bytes exceeds maximum {max}")]
    OperationTooLarge {
        /// Original batch index
        index: usize,
        /// Estimated operation size
        size: usize,
        /// Maximum child batch payload
        max: usize,
    },

    /// Invalid router configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error reading or writing configuration
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Convert into the status value attributed to the failing operation
    pub fn to_write_error(&self) -> WriteError {
        match self {
            Error::InvalidTarget(reason) => WriteError::new(ErrorCode::InvalidTarget, reason.clone()),
            Error::OperationTooLarge { .. } => {
                WriteError::new(ErrorCode::ObjectTooLarge, self.to_string())
            }
            Error::Config(_) | Error::Io(_) => {
                WriteError::new(ErrorCode::UnknownError, self.to_string())
            }
        }
    }
}
