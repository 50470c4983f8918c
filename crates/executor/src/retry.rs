//! Retry policy and progress tracking.
//!
//! Errors fall into three classes:
//!
//! | Class | Retried when |
//! |-------|--------------|
//! | Stale routing | always, after a metadata refresh (bounded by progress) |
//! | Retryable write | only under a retryable-write session |
//! | Terminal | never |
//!
//! Inside an active transaction every error is terminal.

use shardwrite_core::WriteError;

/// How the executor treats a per-operation error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Routing version outdated; refresh and resend
    StaleRouting,
    /// Transient server or transport error
    RetryableWrite,
    /// Reported to the client as is
    Terminal,
}

/// Per-batch retry decisions
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    retryable_write: bool,
    in_transaction: bool,
}

impl RetryPolicy {
    /// Policy for a batch with or without a retryable-write session
    pub fn new(retryable_write: bool, in_transaction: bool) -> Self {
        RetryPolicy {
            retryable_write,
            in_transaction,
        }
    }

    /// Classify `error`
    pub fn classify(&self, error: &WriteError) -> ErrorClass {
        if self.in_transaction {
            return ErrorClass::Terminal;
        }
        if error.code.is_stale_routing() {
            ErrorClass::StaleRouting
        } else if error.code.is_retryable_write_error() {
            ErrorClass::RetryableWrite
        } else {
            ErrorClass::Terminal
        }
    }

    /// Whether an operation failing with `error` goes back to Pending
    pub fn is_retryable(&self, error: &WriteError) -> bool {
        match self.classify(error) {
            ErrorClass::StaleRouting => true,
            ErrorClass::RetryableWrite => self.retryable_write,
            ErrorClass::Terminal => false,
        }
    }
}

/// Counts consecutive rounds that made no progress.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    rounds_without_progress: usize,
    max_rounds_without_progress: usize,
}

impl ProgressTracker {
    /// Tracker that gives up once more than `max` consecutive rounds stall
    pub fn new(max: usize) -> Self {
        ProgressTracker {
            rounds_without_progress: 0,
            max_rounds_without_progress: max,
        }
    }

    /// Record a finished round. Returns true once the budget is exhausted.
    pub fn record_round(&mut self, progressed: bool) -> bool {
        if progressed {
            self.rounds_without_progress = 0;
            return false;
        }
        self.rounds_without_progress += 1;
        if self.rounds_without_progress > self.max_rounds_without_progress {
            tracing::warn!(
                target: "shardwrite::retry",
                rounds = self.rounds_without_progress,
                "No progress made, abandoning retries"
            );
            return true;
        }
        false
    }

    /// Consecutive stalled rounds so far
    pub fn rounds_without_progress(&self) -> usize {
        self.rounds_without_progress
    }
}
