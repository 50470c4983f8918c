//! Stale routing tests: refresh-and-retry and the no-progress bound.

use std::sync::Arc;

use shardwrite_core::{ErrorCode, WriteError};

use super::*;
use crate::testing::{MockReply, MockTransport};

#[tokio::test]
async fn test_stale_op() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 1);
    let executor = create_executor(&transport);
    let targeter = single_shard_targeter();

    let (result, stats) = run(&executor, &targeter, &inserts([1])).await;

    assert!(!result.has_write_errors());
    assert_eq!(result.n, 1);
    assert_eq!(stats.num_rounds, 2);
    assert_eq!(stats.num_stale_batches, 1);
    assert_eq!(targeter.refresh_count(), 1);
}

#[tokio::test]
async fn test_multi_stale_op() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 3);
    let executor = create_executor(&transport);

    let (result, stats) = run(&executor, &single_shard_targeter(), &inserts([1])).await;

    assert!(!result.has_write_errors());
    assert_eq!(stats.num_stale_batches, 3);
    assert_eq!(stats.num_rounds, 4);
}

#[tokio::test]
async fn test_stale_then_success_up_to_budget() {
    for stale_rounds in 1..=5 {
        let transport = Arc::new(MockTransport::new());
        transport.push_stale("FakeShard1", stale_rounds);
        let executor = create_executor(&transport);

        let (result, stats) = run(&executor, &single_shard_targeter(), &inserts([1, 2])).await;

        assert!(!result.has_write_errors(), "k = {}", stale_rounds);
        assert_eq!(result.n, 2);
        assert_eq!(stats.num_stale_batches, stale_rounds);
        assert_eq!(stats.num_rounds, stale_rounds + 1);
    }
}

#[tokio::test]
async fn test_too_many_stale_op() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 10);
    let executor = create_executor(&transport);
    let request = inserts([1, 2]).with_ordered(false);

    let (result, stats) = run(&executor, &single_shard_targeter(), &request).await;

    assert!(result.ok);
    assert_eq!(result.n, 0);
    assert_eq!(result.write_errors.len(), 2);
    for error in &result.write_errors {
        assert_eq!(error.error_code(), Some(ErrorCode::NoProgressMade));
    }
    assert_eq!(stats.num_rounds, 6);
    assert_eq!(stats.num_stale_batches, 6);
    assert_eq!(transport.request_count(), 6);
}

#[tokio::test]
async fn test_configured_progress_budget() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 10);
    let mut config = RouterConfig::default();
    config.max_rounds_without_progress = 2;
    let executor = create_executor_with(&transport, config);

    let (result, stats) = run(&executor, &single_shard_targeter(), &inserts([1])).await;

    assert_eq!(result.write_errors[0].error_code(), Some(ErrorCode::NoProgressMade));
    assert_eq!(stats.num_rounds, 3);
}

#[tokio::test]
async fn test_refresh_change_counts_as_progress() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 8);
    let executor = create_executor(&transport);
    let targeter = single_shard_targeter().with_refresh_changes(true);

    let (result, stats) = run(&executor, &targeter, &inserts([1])).await;

    assert!(!result.has_write_errors());
    assert_eq!(stats.num_stale_batches, 8);
    assert_eq!(stats.num_rounds, 9);
    assert_eq!(targeter.refresh_count(), 8);
}

#[tokio::test]
async fn test_stale_epoch_not_retried() {
    let transport = Arc::new(MockTransport::new());
    transport.push(
        "FakeShard1",
        MockReply::FailEachWrite(WriteError::new(ErrorCode::StaleEpoch, "collection recreated")),
    );
    let executor = create_executor(&transport);
    let targeter = single_shard_targeter();

    let (result, stats) = run(&executor, &targeter, &inserts([1])).await;

    assert_eq!(result.write_errors.len(), 1);
    assert_eq!(result.write_errors[0].error_code(), Some(ErrorCode::StaleEpoch));
    assert_eq!(stats.num_rounds, 1);
    assert_eq!(stats.num_stale_batches, 0);
    assert_eq!(targeter.refresh_count(), 0);
}

#[tokio::test]
async fn test_stale_large_batch_resends_first_split() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 1);
    let executor = create_executor_with(&transport, count_limited(10));
    let request = inserts(0..25).with_ordered(false);

    let (result, stats) = run(&executor, &single_shard_targeter(), &request).await;

    assert_eq!(result.n, 25);
    assert!(!result.has_write_errors());
    assert_eq!(stats.num_stale_batches, 1);
    assert_eq!(stats.num_rounds, 4);

    let first_indices: Vec<Vec<usize>> = transport
        .requests()
        .iter()
        .take(2)
        .map(|(_, cmd)| cmd.indices())
        .collect();
    assert_eq!(first_indices[0], first_indices[1]);
}

#[tokio::test]
async fn test_stale_on_one_shard_only_resends_that_shard() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard2", 1);
    let executor = create_executor(&transport);
    let request = inserts([-1, 1, -2, 2]).with_ordered(false);

    let (result, stats) = run(&executor, &two_shard_targeter(), &request).await;

    assert_eq!(result.n, 4);
    assert_eq!(stats.num_rounds, 2);
    assert_eq!(transport.requests_to("FakeShard1").len(), 1);
    assert_eq!(transport.requests_to("FakeShard2").len(), 2);
    assert_eq!(stats.targeted_shards.len(), 2);
}

#[tokio::test]
async fn test_failed_refresh_retries_with_cached_routing() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 1);
    let executor = create_executor(&transport);
    let targeter = single_shard_targeter()
        .with_refresh_failure(WriteError::new(ErrorCode::HostUnreachable, "config server down"));

    let (result, stats) = run(&executor, &targeter, &inserts([1])).await;

    assert!(!result.has_write_errors());
    assert_eq!(result.n, 1);
    assert_eq!(stats.num_rounds, 2);
    assert_eq!(stats.num_stale_batches, 1);
    assert_eq!(targeter.refreshed_namespaces(), vec![ns()]);
}

#[tokio::test]
async fn test_failed_refresh_is_bounded_by_progress_budget() {
    let transport = Arc::new(MockTransport::new());
    transport.push_stale("FakeShard1", 10);
    let executor = create_executor(&transport);
    let targeter = single_shard_targeter()
        .with_refresh_changes(true)
        .with_refresh_failure(WriteError::new(ErrorCode::HostUnreachable, "config server down"));

    let (result, stats) = run(&executor, &targeter, &inserts([1])).await;

    assert_eq!(result.write_errors[0].error_code(), Some(ErrorCode::NoProgressMade));
    assert_eq!(stats.num_rounds, 6);
    assert_eq!(targeter.refresh_count(), 6);
}
