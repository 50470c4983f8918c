//! Test modules for the executor crate.

pub mod stale_routing;

use std::sync::Arc;

use shardwrite_core::{
    BatchLimits, BatchedWriteRequest, Endpoint, Namespace, RouterConfig, RoutingVersion,
};
use uuid::Uuid;

use crate::testing::{MockTargeter, MockTransport};
use crate::{BatchResult, BatchWriteExecutor, ExecutionStats, RoutingContext, Targeter};

const EPOCH: Uuid = Uuid::from_u128(0x5eed_0000_0000_0000_0000_0000_0000_0001);

pub(crate) fn ns() -> Namespace {
    Namespace::new("foo", "bar")
}

pub(crate) fn shard1() -> Endpoint {
    Endpoint::new("FakeShard1", RoutingVersion::new(100, 200, EPOCH))
}

pub(crate) fn shard2() -> Endpoint {
    Endpoint::new("FakeShard2", RoutingVersion::new(101, 200, EPOCH))
}

/// Single-shard targeter on `FakeShard1`
pub(crate) fn single_shard_targeter() -> MockTargeter {
    MockTargeter::single_shard(ns(), shard1())
}

/// Negative keys on `FakeShard1`, the rest on `FakeShard2`
pub(crate) fn two_shard_targeter() -> MockTargeter {
    MockTargeter::split_at_zero(ns(), shard1(), shard2())
}

pub(crate) fn inserts(keys: impl IntoIterator<Item = i64>) -> BatchedWriteRequest {
    let docs = keys
        .into_iter()
        .map(|x| serde_json::json!({ "x": x }))
        .collect();
    BatchedWriteRequest::insert(ns(), docs)
}

/// Limits that split child batches every `count` operations
pub(crate) fn count_limited(count: usize) -> RouterConfig {
    RouterConfig::with_limits(BatchLimits {
        max_write_batch_size: count,
        ..BatchLimits::default()
    })
}

pub(crate) fn create_executor(transport: &Arc<MockTransport>) -> BatchWriteExecutor {
    create_executor_with(transport, RouterConfig::default())
}

pub(crate) fn create_executor_with(
    transport: &Arc<MockTransport>,
    config: RouterConfig,
) -> BatchWriteExecutor {
    BatchWriteExecutor::new(transport.clone(), config).unwrap()
}

/// Execute outside any transaction and expect the call to succeed
pub(crate) async fn run(
    executor: &BatchWriteExecutor,
    targeter: &dyn Targeter,
    request: &BatchedWriteRequest,
) -> (BatchResult, ExecutionStats) {
    executor
        .execute_batch(&RoutingContext::new(), targeter, request)
        .await
        .unwrap()
}
