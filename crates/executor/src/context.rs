//! Ambient routing context for one batch execution.
//!
//! The context carries what the caller owns rather than what the batch is:
//! the cancellation token and, when present, the transaction the batch runs in.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::transaction::TransactionContext;

/// Caller-owned execution context.
#[derive(Clone, Default)]
pub struct RoutingContext {
    cancel: CancellationToken,
    transaction: Option<Arc<dyn TransactionContext>>,
}

impl RoutingContext {
    /// Context with a fresh cancellation token and no transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context observing an existing cancellation token.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        RoutingContext {
            cancel,
            transaction: None,
        }
    }

    /// Attach a transaction.
    pub fn with_transaction(mut self, txn: Arc<dyn TransactionContext>) -> Self {
        self.transaction = Some(txn);
        self
    }

    /// Cancellation token the executor observes.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the batch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the caller has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Attached transaction, if any.
    pub fn transaction(&self) -> Option<&dyn TransactionContext> {
        self.transaction.as_deref()
    }

    /// Whether the batch runs inside an active transaction.
    pub fn in_transaction(&self) -> bool {
        self.transaction().map_or(false, |t| t.is_active())
    }
}

impl fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingContext")
            .field("cancelled", &self.is_cancelled())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}
