//! Batch Write Execution Tests
//!
//! End-to-end tests through the `shardwrite` facade:
//! - scenarios: config-driven executors, mixed shards, stats
//! - properties: packing bounds and result completeness under random batches

mod common;

mod properties;
mod scenarios;
