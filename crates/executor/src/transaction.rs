//! Transaction-mode adapter.
//!
//! Inside a multi-statement transaction the router never retries on its own:
//! the transaction layer owns retries of the whole transaction. This module
//! holds the [`TransactionContext`] seam the executor consults and the small
//! set of decisions that differ in transaction mode.

use shardwrite_core::{ErrorCode, WriteError, TRANSIENT_TRANSACTION_ERROR_LABEL};

use crate::error::Error;

/// Transaction state the executor consults.
///
/// Implemented by the transaction coordinator; the executor only reads it.
pub trait TransactionContext: Send + Sync {
    /// Whether the batch runs inside an active multi-statement transaction
    fn is_active(&self) -> bool;

    /// Whether `error` dooms the transaction in a way the client should retry
    /// from the start
    fn classify_transient_error(&self, error: &WriteError) -> bool {
        error.has_label(TRANSIENT_TRANSACTION_ERROR_LABEL)
            || matches!(error.code, ErrorCode::WriteConflict)
    }
}

/// An active transaction identified by its transaction number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTransaction {
    /// Transaction number within the session
    pub txn_number: i64,
}

impl ActiveTransaction {
    /// Transaction with the given number
    pub fn new(txn_number: i64) -> Self {
        ActiveTransaction { txn_number }
    }
}

impl TransactionContext for ActiveTransaction {
    fn is_active(&self) -> bool {
        true
    }
}

/// Transaction-aware error handling for one batch
#[derive(Clone, Copy)]
pub(crate) struct TransactionAdapter<'a> {
    txn: Option<&'a dyn TransactionContext>,
}

impl<'a> TransactionAdapter<'a> {
    pub(crate) fn new(txn: Option<&'a dyn TransactionContext>) -> Self {
        TransactionAdapter {
            txn: txn.filter(|t| t.is_active()),
        }
    }

    /// Whether transaction overrides apply
    pub(crate) fn is_active(&self) -> bool {
        self.txn.is_some()
    }

    /// Abort the call if `error` is a transient transaction error.
    pub(crate) fn check_transient(&self, error: &WriteError) -> Result<(), Error> {
        match self.txn {
            Some(txn) if txn.classify_transient_error(error) => {
                Err(Error::Aborted(error.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Shutdown-class transport failures are execution-environment failures,
/// never write errors.
pub(crate) fn check_fatal_transport(error: &WriteError) -> Result<(), Error> {
    if error.code.is_shutdown_error() {
        return Err(Error::Aborted(error.clone()));
    }
    Ok(())
}
