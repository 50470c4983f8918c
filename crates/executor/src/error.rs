//! Error types for batch execution.
//!
//! Per-operation failures are NOT errors at this level: they are reported
//! inside an otherwise successful [`BatchResult`](crate::BatchResult). The
//! [`Error`] enum covers only conditions the caller must see as a failure of
//! the whole call.
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `Aborted` | A transient transaction error inside a transaction, or a shutdown-class transport failure |
//! | `Cancelled` | The routing context was cancelled |
//! | `Core` | Invalid configuration |

use shardwrite_core::{ErrorCode, WriteError};

/// Batch execution errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Execution aborted by an error that belongs to the whole call
    #[error("batch aborted: {0}")]
    Aborted(WriteError),

    /// The caller cancelled the routing context
    #[error("batch cancelled by routing context")]
    Cancelled,

    /// Invalid configuration or data-model failure
    #[error("{reason}")]
    Core {
        /// Rendered core error
        reason: String,
    },
}

impl Error {
    /// Error code carried by the failure
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Aborted(err) => err.code,
            Error::Cancelled => ErrorCode::CallbackCanceled,
            Error::Core { .. } => ErrorCode::UnknownError,
        }
    }
}

impl From<shardwrite_core::Error> for Error {
    fn from(e: shardwrite_core::Error) -> Self {
        Error::Core {
            reason: e.to_string(),
        }
    }
}
