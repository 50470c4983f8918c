//! Common test utilities for batch write tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use shardwrite::testing::{MockTargeter, MockTransport};
use shardwrite::{
    BatchResult, BatchWriteExecutor, BatchedWriteRequest, Endpoint, ExecutionStats, Namespace,
    RouterConfig, RoutingContext, RoutingVersion,
};
use uuid::Uuid;

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once per process
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

pub fn ns() -> Namespace {
    Namespace::new("test", "coll")
}

pub fn endpoint(shard: &str) -> Endpoint {
    Endpoint::new(shard, RoutingVersion::new(1, 0, Uuid::from_u128(42)))
}

/// Negative keys on `shard-a`, the rest on `shard-b`
pub fn two_shards() -> MockTargeter {
    MockTargeter::split_at_zero(ns(), endpoint("shard-a"), endpoint("shard-b"))
}

pub fn inserts(keys: &[i64]) -> BatchedWriteRequest {
    let docs = keys.iter().map(|x| serde_json::json!({ "x": x })).collect();
    BatchedWriteRequest::insert(ns(), docs)
}

pub fn create_executor(config: RouterConfig) -> (Arc<MockTransport>, BatchWriteExecutor) {
    init_tracing();
    let transport = Arc::new(MockTransport::new());
    let executor = BatchWriteExecutor::new(transport.clone(), config).unwrap();
    (transport, executor)
}

/// Run a batch to completion on a fresh current-thread runtime
pub fn execute(
    executor: &BatchWriteExecutor,
    targeter: &MockTargeter,
    request: &BatchedWriteRequest,
) -> (BatchResult, ExecutionStats) {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(executor.execute_batch(&RoutingContext::new(), targeter, request))
        .unwrap()
}
