//! Property tests: packing bounds and result completeness.

use std::collections::BTreeSet;

use proptest::prelude::*;
use shardwrite::testing::MockReply;
use shardwrite::{BatchLimits, ErrorCode, RouterConfig, WriteError};

use crate::common::*;

fn count_limited(count: usize) -> RouterConfig {
    RouterConfig::with_limits(BatchLimits {
        max_write_batch_size: count,
        ..BatchLimits::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_op_sent_exactly_once(
        keys in prop::collection::vec(-50i64..50, 1..60),
        limit in 1usize..8,
        ordered in any::<bool>(),
    ) {
        let (transport, executor) = create_executor(count_limited(limit));
        let request = inserts(&keys).with_ordered(ordered);

        let (result, stats) = execute(&executor, &two_shards(), &request);

        prop_assert!(!result.has_write_errors());
        prop_assert_eq!(result.n as usize, keys.len());

        let mut sent: Vec<usize> = Vec::new();
        for (_, command) in transport.requests() {
            prop_assert!(command.operations.len() <= limit);
            sent.extend(command.indices());
        }
        sent.sort_unstable();
        prop_assert_eq!(sent, (0..keys.len()).collect::<Vec<_>>());

        let min_batches = (keys.len() + limit - 1) / limit;
        prop_assert!(stats.num_child_batches >= min_batches);
        prop_assert!(stats.num_rounds <= stats.num_child_batches);
    }

    #[test]
    fn prop_single_shard_rounds_equal_splits(
        count in 1usize..80,
        limit in 1usize..12,
    ) {
        let (_, executor) = create_executor(count_limited(limit));
        let keys: Vec<i64> = (0..count as i64).collect();
        let request = inserts(&keys);

        let (_, stats) = execute(&executor, &two_shards(), &request);

        let splits = (count + limit - 1) / limit;
        prop_assert_eq!(stats.num_rounds, splits);
        prop_assert_eq!(stats.num_child_batches, splits);
    }

    #[test]
    fn prop_results_have_no_gaps_or_duplicates(
        keys in prop::collection::vec(-50i64..50, 1..40),
        limit in 1usize..6,
        ordered in any::<bool>(),
        fail_low in any::<bool>(),
    ) {
        let (transport, executor) = create_executor(count_limited(limit));
        let failing = if fail_low { "shard-a" } else { "shard-b" };
        transport.push(
            failing,
            MockReply::FailEachWrite(WriteError::new(ErrorCode::UnknownError, "injected")),
        );
        let request = inserts(&keys).with_ordered(ordered);

        let (result, _) = execute(&executor, &two_shards(), &request);

        let indices: Vec<usize> = result.write_errors.iter().map(|e| e.index).collect();
        let unique: BTreeSet<usize> = indices.iter().copied().collect();
        prop_assert_eq!(unique.len(), indices.len());
        prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(indices.iter().all(|&i| i < keys.len()));
        prop_assert_eq!(result.n as usize + indices.len(), keys.len());

        if ordered {
            if let Some(&first) = indices.first() {
                // Everything after the first failure is reported failed
                prop_assert_eq!(indices.len(), keys.len() - first);
            }
        }
    }
}
