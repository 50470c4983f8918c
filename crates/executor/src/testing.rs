//! Scripted test doubles for the targeter and transport seams.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for downstream integration tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use shardwrite_core::{
    DeleteEntry, Document, Endpoint, ErrorCode, Namespace, ShardId, UpdateEntry, WriteError,
};

use crate::dispatch::{ChildBatchCommand, DispatchOutcome, ShardResponse, Transport};
use crate::targeter::Targeter;

/// Chunk range `[min, max)` on an integer shard key; `None` is unbounded
#[derive(Debug, Clone)]
pub struct MockRange {
    /// Owning endpoint
    pub endpoint: Endpoint,
    /// Inclusive lower bound
    pub min: Option<i64>,
    /// Exclusive upper bound
    pub max: Option<i64>,
}

impl MockRange {
    /// Range `[min, max)`
    pub fn new(endpoint: Endpoint, min: Option<i64>, max: Option<i64>) -> Self {
        MockRange { endpoint, min, max }
    }

    fn contains(&self, key: i64) -> bool {
        self.min.map_or(true, |min| key >= min) && self.max.map_or(true, |max| key < max)
    }
}

/// Targeter over a fixed set of chunk ranges.
///
/// Inserts route by the integer shard key. Updates and deletes route by the
/// shard key when their query pins it, and broadcast to every range otherwise.
pub struct MockTargeter {
    namespace: Namespace,
    shard_key: String,
    ranges: Vec<MockRange>,
    multi_endpoint_writes: Option<Vec<Endpoint>>,
    refresh_changes: bool,
    refresh_failure: Option<WriteError>,
    refreshes: Mutex<Vec<Namespace>>,
}

impl MockTargeter {
    /// Targeter over `ranges`, keyed on field `x`
    pub fn new(namespace: Namespace, ranges: Vec<MockRange>) -> Self {
        MockTargeter {
            namespace,
            shard_key: "x".to_string(),
            ranges,
            multi_endpoint_writes: None,
            refresh_changes: false,
            refresh_failure: None,
            refreshes: Mutex::new(Vec::new()),
        }
    }

    /// Every key lives on `endpoint`
    pub fn single_shard(namespace: Namespace, endpoint: Endpoint) -> Self {
        Self::new(namespace, vec![MockRange::new(endpoint, None, None)])
    }

    /// Negative keys on `low`, the rest on `high`
    pub fn split_at_zero(namespace: Namespace, low: Endpoint, high: Endpoint) -> Self {
        Self::new(
            namespace,
            vec![
                MockRange::new(low, None, Some(0)),
                MockRange::new(high, Some(0), None),
            ],
        )
    }

    /// Route on `field` instead of `x`
    pub fn with_shard_key(mut self, field: impl Into<String>) -> Self {
        self.shard_key = field.into();
        self
    }

    /// Send every update and delete to `endpoints`, whatever the query
    pub fn with_multi_endpoint_writes(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.multi_endpoint_writes = Some(endpoints);
        self
    }

    /// Report a changed routing table on every refresh
    pub fn with_refresh_changes(mut self, changes: bool) -> Self {
        self.refresh_changes = changes;
        self
    }

    /// Fail every refresh with `error`
    pub fn with_refresh_failure(mut self, error: WriteError) -> Self {
        self.refresh_failure = Some(error);
        self
    }

    /// Number of metadata refreshes requested
    pub fn refresh_count(&self) -> usize {
        self.refreshes.lock().len()
    }

    /// Namespaces passed to each refresh, in call order
    pub fn refreshed_namespaces(&self) -> Vec<Namespace> {
        self.refreshes.lock().clone()
    }

    fn key_of(&self, document: &Document) -> Option<i64> {
        document.get(&self.shard_key).and_then(|v| v.as_i64())
    }

    fn range_for(&self, key: i64) -> Result<Endpoint, WriteError> {
        self.ranges
            .iter()
            .find(|r| r.contains(key))
            .map(|r| r.endpoint.clone())
            .ok_or_else(|| {
                WriteError::new(ErrorCode::InvalidTarget, format!("no chunk owns key {key}"))
            })
    }

    fn target_query(&self, query: &Document) -> Result<Vec<Endpoint>, WriteError> {
        if let Some(endpoints) = &self.multi_endpoint_writes {
            return Ok(endpoints.clone());
        }
        match self.key_of(query) {
            Some(key) => self.range_for(key).map(|ep| vec![ep]),
            None => Ok(self.ranges.iter().map(|r| r.endpoint.clone()).collect()),
        }
    }
}

#[async_trait]
impl Targeter for MockTargeter {
    fn target_insert(&self, document: &Document) -> Result<Endpoint, WriteError> {
        let key = self.key_of(document).ok_or_else(|| {
            WriteError::new(
                ErrorCode::InvalidTarget,
                format!("document is missing shard key {}", self.shard_key),
            )
        })?;
        self.range_for(key)
    }

    fn target_update(&self, entry: &UpdateEntry) -> Result<Vec<Endpoint>, WriteError> {
        self.target_query(&entry.query)
    }

    fn target_delete(&self, entry: &DeleteEntry) -> Result<Vec<Endpoint>, WriteError> {
        self.target_query(&entry.query)
    }

    async fn refresh_metadata(&self, namespace: &Namespace) -> Result<bool, WriteError> {
        self.refreshes.lock().push(namespace.clone());
        if let Some(error) = &self.refresh_failure {
            return Err(error.clone());
        }
        if namespace != &self.namespace {
            return Err(WriteError::new(
                ErrorCode::InvalidTarget,
                format!("no routing table for {namespace}"),
            ));
        }
        Ok(self.refresh_changes)
    }

    fn no_progress_possible(&self) -> bool {
        !self.refresh_changes
    }
}

/// One scripted shard reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this response
    Respond(ShardResponse),
    /// Report `error` for every write of the child batch
    FailEachWrite(WriteError),
    /// Fail the send at the transport level
    TransportError(WriteError),
    /// Never answer
    Stall,
}

/// Transport answering from per-shard scripts.
///
/// A shard with an empty script acknowledges every write (`n` equals the
/// batch length). Every command sent is recorded.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<ShardId, VecDeque<MockReply>>>,
    requests: Mutex<Vec<(Endpoint, ChildBatchCommand)>>,
}

impl MockTransport {
    /// Transport with no scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for the next send to `shard`
    pub fn push(&self, shard: impl Into<ShardId>, reply: MockReply) {
        self.scripts
            .lock()
            .entry(shard.into())
            .or_default()
            .push_back(reply);
    }

    /// Queue a response
    pub fn push_response(&self, shard: impl Into<ShardId>, response: ShardResponse) {
        self.push(shard, MockReply::Respond(response));
    }

    /// Queue `times` replies failing every write with a stale routing error
    pub fn push_stale(&self, shard: impl Into<ShardId>, times: usize) {
        let shard = shard.into();
        for _ in 0..times {
            self.push(
                shard.clone(),
                MockReply::FailEachWrite(WriteError::new(
                    ErrorCode::StaleShardVersion,
                    "mock stale error",
                )),
            );
        }
    }

    /// Every command sent so far, in send order
    pub fn requests(&self) -> Vec<(Endpoint, ChildBatchCommand)> {
        self.requests.lock().clone()
    }

    /// Commands sent to `shard`
    pub fn requests_to(&self, shard: &str) -> Vec<ChildBatchCommand> {
        self.requests
            .lock()
            .iter()
            .filter(|(ep, _)| ep.shard.as_str() == shard)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    /// Number of commands sent
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, endpoint: &Endpoint, command: ChildBatchCommand) -> DispatchOutcome {
        let writes = command.operations.len();
        let reply = {
            self.requests.lock().push((endpoint.clone(), command));
            self.scripts
                .lock()
                .get_mut(&endpoint.shard)
                .and_then(|script| script.pop_front())
        };

        match reply {
            None => Ok(ShardResponse::ok(writes as u64)),
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::FailEachWrite(error)) => Ok((0..writes)
                .fold(ShardResponse::ok(0), |resp, i| resp.with_write_error(i, error.clone()))),
            Some(MockReply::TransportError(error)) => Err(error),
            Some(MockReply::Stall) => futures::future::pending().await,
        }
    }
}
