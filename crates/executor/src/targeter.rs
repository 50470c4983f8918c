//! Routing seam: map write operations to shard endpoints.
//!
//! The [`Targeter`] is owned outside this crate (it wraps the routing-table
//! cache). The executor only calls its lookup and refresh contract.
//! [`Targetable`] lets the builder target any operation kind without knowing
//! which one it holds.

use std::collections::HashSet;

use async_trait::async_trait;
use shardwrite_core::{DeleteEntry, Document, Endpoint, Namespace, UpdateEntry, WriteError, WriteOp};

/// Routing-table lookups for one namespace.
#[async_trait]
pub trait Targeter: Send + Sync {
    /// Endpoint owning the shard key of `document`
    fn target_insert(&self, document: &Document) -> Result<Endpoint, WriteError>;

    /// Endpoints whose chunks may hold documents matched by `entry`
    fn target_update(&self, entry: &UpdateEntry) -> Result<Vec<Endpoint>, WriteError>;

    /// Endpoints whose chunks may hold documents matched by `entry`
    fn target_delete(&self, entry: &DeleteEntry) -> Result<Vec<Endpoint>, WriteError>;

    /// Reload routing metadata for `namespace`.
    ///
    /// Returns whether the routing table changed. Idempotent and best-effort:
    /// on error the executor keeps targeting with the cached table.
    async fn refresh_metadata(&self, namespace: &Namespace) -> Result<bool, WriteError>;

    /// Hint that refreshing cannot change anything. Production targeters
    /// always allow progress through refresh.
    fn no_progress_possible(&self) -> bool {
        false
    }
}

/// Something that can be routed by a [`Targeter`].
pub trait Targetable {
    /// Endpoints this item must be sent to, in targeter order
    fn target(&self, targeter: &dyn Targeter) -> Result<Vec<Endpoint>, WriteError>;
}

impl Targetable for Document {
    fn target(&self, targeter: &dyn Targeter) -> Result<Vec<Endpoint>, WriteError> {
        targeter.target_insert(self).map(|endpoint| vec![endpoint])
    }
}

impl Targetable for UpdateEntry {
    fn target(&self, targeter: &dyn Targeter) -> Result<Vec<Endpoint>, WriteError> {
        targeter.target_update(self)
    }
}

impl Targetable for DeleteEntry {
    fn target(&self, targeter: &dyn Targeter) -> Result<Vec<Endpoint>, WriteError> {
        targeter.target_delete(self)
    }
}

impl Targetable for WriteOp {
    fn target(&self, targeter: &dyn Targeter) -> Result<Vec<Endpoint>, WriteError> {
        let mut endpoints = match self {
            WriteOp::Insert { document } => document.target(targeter)?,
            WriteOp::Update(entry) => entry.target(targeter)?,
            WriteOp::Delete(entry) => entry.target(targeter)?,
        };
        // One write per shard
        let mut seen = HashSet::new();
        endpoints.retain(|ep| seen.insert(ep.shard.clone()));
        Ok(endpoints)
    }
}
