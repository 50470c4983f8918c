//! Routing identity types
//!
//! This module defines the identifiers the router uses to address shards:
//! - Namespace: `db.collection` pair a batch writes to
//! - ShardId: logical shard name
//! - RoutingVersion: opaque per-shard token used to detect stale routing
//! - Endpoint: a shard plus the routing version it was targeted under
//! - SessionInfo: logical session id and write transaction number

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fully qualified collection name (`db.collection`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name
    pub db: String,
    /// Collection name
    pub collection: String,
}

impl Namespace {
    /// Create a namespace from its two parts
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Namespace {
            db: db.into(),
            collection: collection.into(),
        }
    }

    /// Parse `db.collection`; the collection part may itself contain dots
    pub fn parse(full: &str) -> Option<Self> {
        let (db, collection) = full.split_once('.')?;
        if db.is_empty() || collection.is_empty() {
            return None;
        }
        Some(Namespace::new(db, collection))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// Logical shard name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(String);

impl ShardId {
    /// Create a shard id
    pub fn new(name: impl Into<String>) -> Self {
        ShardId(name.into())
    }

    /// Shard name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ShardId {
    fn from(s: String) -> Self {
        ShardId(s)
    }
}

impl From<&str> for ShardId {
    fn from(s: &str) -> Self {
        ShardId::new(s)
    }
}

/// Per-shard routing version token
///
/// `epoch` identifies the incarnation of the collection; it changes only when
/// the collection is dropped and recreated. `(major, minor)` advance as chunk
/// ownership moves between shards. Two versions are only comparable when they
/// share an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingVersion {
    /// Collection incarnation
    pub epoch: Uuid,
    /// Bumped on migrations
    pub major: u32,
    /// Bumped on splits
    pub minor: u32,
}

impl RoutingVersion {
    /// Create a routing version under the given epoch
    pub fn new(major: u32, minor: u32, epoch: Uuid) -> Self {
        RoutingVersion {
            epoch,
            major,
            minor,
        }
    }

    /// Version used for writes to unsharded collections
    pub fn unsharded() -> Self {
        RoutingVersion {
            epoch: Uuid::nil(),
            major: 0,
            minor: 0,
        }
    }

    /// Whether both versions belong to the same collection incarnation
    pub fn same_epoch(&self, other: &RoutingVersion) -> bool {
        self.epoch == other.epoch
    }

    /// Whether `self` is strictly older than `other` within one epoch
    ///
    /// Returns `false` across epochs; an epoch change is not staleness.
    pub fn is_older_than(&self, other: &RoutingVersion) -> bool {
        self.same_epoch(other) && (self.major, self.minor) < (other.major, other.minor)
    }
}

impl fmt::Display for RoutingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}||{}", self.major, self.minor, self.epoch)
    }
}

/// A shard addressed under a specific routing version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    /// Owning shard
    pub shard: ShardId,
    /// Routing version the targeter used
    pub version: RoutingVersion,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(shard: impl Into<ShardId>, version: RoutingVersion) -> Self {
        Endpoint {
            shard: shard.into(),
            version,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.shard, self.version)
    }
}

/// Logical session attached to a batch
///
/// A session with a transaction number is a retryable-write session: the
/// shards can deduplicate a re-sent statement, so generic transient errors
/// may be retried by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Logical session id
    pub lsid: Uuid,
    /// Write transaction number within the session
    pub txn_number: Option<i64>,
}

impl SessionInfo {
    /// Session without a transaction number
    pub fn new(lsid: Uuid) -> Self {
        SessionInfo {
            lsid,
            txn_number: None,
        }
    }

    /// Session carrying a transaction number
    pub fn with_txn_number(lsid: Uuid, txn_number: i64) -> Self {
        SessionInfo {
            lsid,
            txn_number: Some(txn_number),
        }
    }

    /// Whether this session makes the batch a retryable write
    pub fn is_retryable_write(&self) -> bool {
        self.txn_number.is_some()
    }
}
