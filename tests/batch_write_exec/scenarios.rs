//! Scenario tests through the public facade.

use std::sync::Arc;

use serde_json::json;
use shardwrite::testing::MockReply;
use shardwrite::{
    ActiveTransaction, BatchType, BatchedWriteRequest, DeleteEntry, Error, ErrorCode,
    RouterConfig, RoutingContext, ShardResponse, UpdateEntry, WriteError,
};

use crate::common::*;

#[test]
fn test_executor_from_toml_config() {
    let config = RouterConfig::from_toml_str(
        r#"
        max_write_batch_size = 3
        max_rounds_without_progress = 1
        "#,
    )
    .unwrap();
    let (transport, executor) = create_executor(config);
    transport.push_stale("shard-b", 5);

    let (result, stats) = execute(&executor, &two_shards(), &inserts(&[1, 2, 3, 4]));

    assert_eq!(executor.config().max_write_batch_size, 3);
    assert_eq!(stats.num_rounds, 2);
    assert!(result
        .write_errors
        .iter()
        .all(|e| e.error_code() == Some(ErrorCode::NoProgressMade)));
    assert_eq!(result.write_errors.len(), 4);
}

#[test]
fn test_default_toml_builds_executor() {
    let config = RouterConfig::from_toml_str(RouterConfig::default_toml()).unwrap();
    assert_eq!(config, RouterConfig::default());
    let (_, executor) = create_executor(config);
    let (result, stats) = execute(&executor, &two_shards(), &inserts(&[-5, 5]));
    assert_eq!(result.n, 2);
    assert_eq!(stats.num_rounds, 2);
}

#[test]
fn test_result_wire_shape() {
    let (transport, executor) = create_executor(RouterConfig::default());
    transport.push_response(
        "shard-b",
        ShardResponse::ok(1).with_write_error(1, WriteError::new(ErrorCode::UnknownError, "dup key")),
    );
    let request = inserts(&[-1, 1, 2]).with_ordered(false);

    let (result, _) = execute(&executor, &two_shards(), &request);
    let wire = serde_json::to_value(&result).unwrap();

    assert_eq!(wire["ok"], true);
    assert_eq!(wire["n"], 2);
    assert_eq!(wire["writeErrors"][0]["index"], 2);
    assert_eq!(wire["writeErrors"][0]["codeName"], "UnknownError");
    assert_eq!(wire["writeErrors"][0]["errmsg"], "dup key");
}

#[test]
fn test_update_and_delete_batches() {
    let (transport, executor) = create_executor(RouterConfig::default());
    transport.push_response("shard-a", ShardResponse::ok(2).with_n_modified(2));
    transport.push_response("shard-b", ShardResponse::ok(1).with_n_modified(1));
    let updates = BatchedWriteRequest::update(
        ns(),
        vec![UpdateEntry::new(json!({}), json!({"$inc": {"n": 1}})).multi()],
    );

    let (result, _) = execute(&executor, &two_shards(), &updates);
    assert_eq!(result.n, 3);
    assert_eq!(result.n_modified, 3);
    assert!(transport
        .requests()
        .iter()
        .all(|(_, cmd)| cmd.batch_type == BatchType::Update));

    let (transport, executor) = create_executor(RouterConfig::default());
    let deletes = BatchedWriteRequest::delete(
        ns(),
        vec![DeleteEntry::one(json!({"x": -4})), DeleteEntry::one(json!({"x": 4}))],
    )
    .with_ordered(false);
    let (result, stats) = execute(&executor, &two_shards(), &deletes);
    assert_eq!(result.n, 2);
    assert_eq!(stats.num_rounds, 1);
    assert_eq!(transport.requests_to("shard-a")[0].indices(), vec![0]);
}

#[tokio::test]
async fn test_transaction_abort_through_facade() {
    let (transport, executor) = create_executor(RouterConfig::default());
    transport.push(
        "shard-a",
        MockReply::FailEachWrite(WriteError::new(ErrorCode::WriteConflict, "conflict")),
    );
    let ctx = RoutingContext::new().with_transaction(Arc::new(ActiveTransaction::new(1)));

    let err = executor
        .execute_batch(&ctx, &two_shards(), &inserts(&[-1, 1]).with_ordered(false))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Aborted(_)));
    assert_eq!(err.code(), ErrorCode::WriteConflict);
}

#[test]
fn test_stats_track_targeted_shards() {
    let (_, executor) = create_executor(RouterConfig::default());
    let (_, stats) = execute(&executor, &two_shards(), &inserts(&[1, 2, 3]));
    assert_eq!(stats.targeted_shards.len(), 1);
    assert_eq!(stats.num_child_batches, 1);
}
