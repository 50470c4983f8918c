//! Targeting and child-batch construction.
//!
//! Each round the builder routes the operations the ledger still needs, groups
//! the resulting targeted writes by endpoint, and packs every endpoint's
//! writes greedily (original order, no reordering) into child batches bounded
//! by [`BatchLimits`]. Only the first child batch of each endpoint is sent in a
//! round; the remainder is repacked on the next one.
//!
//! The builder reads the ledger but never mutates it.

use std::collections::{BTreeMap, BTreeSet};

use shardwrite_core::{BatchLimits, BatchedWriteRequest, Endpoint, WriteError};

use crate::ledger::OperationLedger;
use crate::targeter::{Targetable, Targeter};

/// Operations destined for one endpoint in one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildBatch {
    /// Target endpoint
    pub endpoint: Endpoint,
    /// Original batch indices, ascending
    pub writes: Vec<usize>,
    /// Estimated payload
    pub size_bytes: usize,
}

impl ChildBatch {
    fn new(endpoint: Endpoint) -> Self {
        ChildBatch {
            endpoint,
            writes: Vec::new(),
            size_bytes: 0,
        }
    }

    /// Number of writes in the batch
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch carries no writes
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Everything a round needs to dispatch, plus what targeting decided on its own
#[derive(Debug, Default, Clone)]
pub struct RoundPlan {
    /// Child batches to send, at most one per endpoint
    pub batches: Vec<ChildBatch>,
    /// Operations that could not be routed or can never fit a child batch
    pub target_errors: Vec<(usize, WriteError)>,
    /// Operations every targeted shard has already applied
    pub already_applied: Vec<usize>,
    /// Operations with at least one targeted write held back for a later
    /// round by the packing limits
    pub deferred: BTreeSet<usize>,
}

impl RoundPlan {
    /// Endpoints each operation is sent to this round, keyed by index
    pub fn sent_endpoints(&self) -> BTreeMap<usize, Vec<Endpoint>> {
        let mut sent: BTreeMap<usize, Vec<Endpoint>> = BTreeMap::new();
        for batch in &self.batches {
            for &index in &batch.writes {
                sent.entry(index).or_default().push(batch.endpoint.clone());
            }
        }
        sent
    }

    /// Whether the round has nothing to send
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Builds child batches under fixed physical limits
#[derive(Debug, Clone, Copy)]
pub struct ChildBatchBuilder {
    limits: BatchLimits,
}

impl ChildBatchBuilder {
    /// Builder enforcing `limits`
    pub fn new(limits: BatchLimits) -> Self {
        ChildBatchBuilder { limits }
    }

    /// Limits in force
    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    /// Pack `(index, size)` writes for one endpoint into child batches.
    ///
    /// Greedy in input order: the current batch is closed whenever the next
    /// write would exceed the count or byte limit. Every write must already
    /// fit an empty batch on its own.
    pub fn pack<I>(&self, endpoint: &Endpoint, writes: I) -> Vec<ChildBatch>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut batches = Vec::new();
        let mut current = ChildBatch::new(endpoint.clone());

        for (index, size) in writes {
            let over_count = current.len() + 1 > self.limits.max_write_batch_size;
            let over_bytes = current.size_bytes + size > self.limits.max_batch_bytes;
            if !current.is_empty() && (over_count || over_bytes) {
                batches.push(std::mem::replace(
                    &mut current,
                    ChildBatch::new(endpoint.clone()),
                ));
            }
            current.writes.push(index);
            current.size_bytes += size;
        }

        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    /// Target the ledger's outstanding operations and plan one round.
    pub fn build_round(
        &self,
        request: &BatchedWriteRequest,
        targeter: &dyn Targeter,
        ledger: &OperationLedger,
    ) -> RoundPlan {
        let mut plan = RoundPlan::default();
        let retryable_write = request.is_retryable_write();
        let mut grouped: BTreeMap<Endpoint, Vec<(usize, usize)>> = BTreeMap::new();
        // Ordered rounds carry one endpoint: the first operation's
        let mut ordered_endpoint: Option<Endpoint> = None;

        for index in ledger.indices_to_target() {
            let Some(operation) = request.operation(index) else {
                continue;
            };

            let size = match self.limits.validate_operation(operation, retryable_write) {
                Ok(size) => size,
                Err(e) => {
                    tracing::debug!(target: "shardwrite::target", index, error = %e, "Operation exceeds child batch limit");
                    plan.target_errors.push((index, e.to_write_error()));
                    if request.is_ordered() {
                        break;
                    }
                    continue;
                }
            };

            let endpoints = match operation.op().target(targeter) {
                Ok(endpoints) => endpoints,
                Err(error) => {
                    tracing::debug!(target: "shardwrite::target", index, %error, "Targeting failed");
                    plan.target_errors.push((index, error));
                    if request.is_ordered() {
                        break;
                    }
                    continue;
                }
            };

            let applied = ledger.applied_shards(index);
            let endpoints: Vec<Endpoint> = endpoints
                .into_iter()
                .filter(|ep| !applied.contains(&ep.shard))
                .collect();

            if endpoints.is_empty() {
                plan.already_applied.push(index);
                continue;
            }

            if request.is_ordered() {
                match &ordered_endpoint {
                    None if grouped.is_empty() => {
                        if endpoints.len() > 1 {
                            // Multi-endpoint writes go alone
                            for endpoint in endpoints {
                                grouped.entry(endpoint).or_default().push((index, size));
                            }
                            break;
                        }
                        ordered_endpoint = Some(endpoints[0].clone());
                    }
                    Some(first) if endpoints.len() == 1 && &endpoints[0] == first => {}
                    _ => break,
                }
            }

            for endpoint in endpoints {
                grouped.entry(endpoint).or_default().push((index, size));
            }
        }

        for (endpoint, writes) in grouped {
            let mut batches = self.pack(&endpoint, writes).into_iter();
            if let Some(first) = batches.next() {
                let held: Vec<usize> = batches.flat_map(|b| b.writes).collect();
                let deferred = held.len();
                if deferred > 0 {
                    tracing::debug!(
                        target: "shardwrite::target",
                        endpoint = %endpoint,
                        sent = first.len(),
                        deferred,
                        "Split child batch"
                    );
                }
                plan.deferred.extend(held);
                plan.batches.push(first);
            }
        }

        plan
    }
}
