//! Cycle-breaking topological traversal.
//!
//! Both path enumeration and probability analysis walk the legal subgraph
//! in a partial topological order: a node is expanded once every legal
//! predecessor (successor, for the backward pass) has merged into it. The
//! graph may contain cycles, so nodes inside a strongly connected component
//! never satisfy that condition; when the ready queue starves, the engine
//! commits to the waiting node with the lightest partial-path bound and
//! keeps going. Contributions arriving at an already-expanded node are
//! dropped, which under-counts paths trapped in cycles but never produces
//! totals outside the true range.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::trace;

use crate::{
    graph::{NodeId, RoutingGraph},
    options::BucketMode,
};

use super::{
    buckets::NodeBuckets,
    distances::PassDirection,
    scratch::JobScratch,
};

/// Sort key for nodes parked in the waiting set.
///
/// Ordering is lexicographic: lightest partial path first, then shortest
/// source distance, then node id for determinism.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub(crate) struct WaitingNode {
    pub(crate) path_weight: u32,
    pub(crate) source_distance: u32,
    pub(crate) node: NodeId,
}

/// Topological scratch for one node in one job.
#[derive(Debug, Default)]
pub(crate) struct TopoInfo {
    pub(crate) done_from_source: bool,
    pub(crate) done_from_sink: bool,
    pub(crate) times_visited_from_source: u32,
    pub(crate) times_visited_from_sink: u32,
    num_legal_in: Option<u32>,
    num_legal_out: Option<u32>,
    pub(crate) level: u32,
    /// Lightest bucket index populated so far; primary waiting-set key.
    pub(crate) min_bucket_weight: u32,
    pub(crate) waiting_key: Option<WaitingNode>,
    /// Set once the probability pass has re-seeded this node's buckets.
    pub(crate) prob_initialized: bool,
    /// Demand this node's effective value is discounted by during the
    /// probability pass, cached from the shared tables between passes.
    pub(crate) cached_demand: f64,
    pub(crate) radius_discount: f64,
    pub(crate) buckets: NodeBuckets,
    /// Per-parent demand contributions, indexed by this node's bucket
    /// weight. Recorded during enumeration, consumed by the probability
    /// pass in path-dependence mode.
    pub(crate) demand_discounts: HashMap<NodeId, Vec<f64>>,
}

impl TopoInfo {
    /// Full reset at job end. Buckets are zeroed up to `cap` only.
    pub(crate) fn clear_job(&mut self, cap: u32) {
        self.reset_traversal();
        self.num_legal_in = None;
        self.num_legal_out = None;
        self.cached_demand = 0.0;
        self.radius_discount = 0.0;
        self.buckets.clear_up_to(cap);
        self.demand_discounts.clear();
    }

    /// Reset between the enumeration and probability passes of one job.
    /// Legal-neighbour caches survive: legality does not change mid-job.
    pub(crate) fn reset_traversal(&mut self) {
        self.done_from_source = false;
        self.done_from_sink = false;
        self.times_visited_from_source = 0;
        self.times_visited_from_sink = 0;
        self.level = 0;
        self.min_bucket_weight = u32::MAX;
        self.waiting_key = None;
        self.prob_initialized = false;
    }

    pub(crate) fn done(&self, direction: PassDirection) -> bool {
        match direction {
            PassDirection::FromSource => self.done_from_source,
            PassDirection::FromSink => self.done_from_sink,
        }
    }

    pub(crate) fn set_done(&mut self, direction: PassDirection) {
        match direction {
            PassDirection::FromSource => self.done_from_source = true,
            PassDirection::FromSink => self.done_from_sink = true,
        }
    }

    pub(crate) fn times_visited(&self, direction: PassDirection) -> u32 {
        match direction {
            PassDirection::FromSource => self.times_visited_from_source,
            PassDirection::FromSink => self.times_visited_from_sink,
        }
    }

    pub(crate) fn increment_times_visited(&mut self, direction: PassDirection) {
        match direction {
            PassDirection::FromSource => self.times_visited_from_source += 1,
            PassDirection::FromSink => self.times_visited_from_sink += 1,
        }
    }

    pub(crate) fn record_bucket_weight(&mut self, weight: u32) {
        if weight < self.min_bucket_weight {
            self.min_bucket_weight = weight;
        }
    }
}

/// One `(source, sink)` traversal's immutable context.
#[derive(Clone, Copy, Debug)]
pub(crate) struct JobContext<'a> {
    pub(crate) graph: &'a RoutingGraph,
    pub(crate) source: NodeId,
    pub(crate) sink: NodeId,
    pub(crate) max_path_weight: u32,
    pub(crate) bucket_mode: BucketMode,
}

impl JobContext<'_> {
    pub(crate) fn node_weight(&self, node: NodeId) -> u32 {
        self.graph.node(node).map_or(0, |n| n.weight())
    }

    /// Bucket-index increment for a step leaving `from`.
    pub(crate) fn step_shift(&self, from: NodeId) -> u32 {
        match self.bucket_mode {
            BucketMode::ByPathWeight => self.node_weight(from),
            BucketMode::ByPathHops => 1,
        }
    }

    pub(crate) fn is_legal(&self, node: NodeId, scratch: &JobScratch) -> bool {
        scratch.distances[node].is_legal(self.node_weight(node), self.max_path_weight)
    }
}

/// Pass-specific merge behaviour plugged into the traversal.
pub(crate) trait MergeRule {
    /// Seeds the start node's buckets before the walk begins.
    fn seed(&mut self, ctx: &JobContext<'_>, scratch: &mut JobScratch, start: NodeId);

    /// Folds `from`'s buckets into `to`'s across one edge. `shift` is the
    /// bucket-index increment for the step.
    fn merge(
        &mut self,
        ctx: &JobContext<'_>,
        scratch: &mut JobScratch,
        from: NodeId,
        to: NodeId,
        shift: u32,
    );
}

/// Runs one traversal in the given direction, driving `rule` at each edge.
pub(crate) fn traverse<R: MergeRule>(
    ctx: &JobContext<'_>,
    direction: PassDirection,
    scratch: &mut JobScratch,
    rule: &mut R,
) {
    let (start, terminal) = match direction {
        PassDirection::FromSource => (ctx.source, ctx.sink),
        PassDirection::FromSink => (ctx.sink, ctx.source),
    };
    if !ctx.is_legal(start, scratch) {
        return;
    }

    rule.seed(ctx, scratch, start);
    scratch.touch(start);
    scratch.topo[start].set_done(direction);
    scratch.topo[start].record_bucket_weight(0);

    let mut ready: VecDeque<NodeId> = VecDeque::new();
    let mut waiting: BTreeSet<WaitingNode> = BTreeSet::new();
    ready.push_back(start);

    loop {
        let from = if let Some(node) = ready.pop_front() {
            node
        } else if let Some(entry) = waiting.pop_first() {
            // Ready starved: commit to the lightest waiting node to make
            // progress through the cycle.
            let info = &mut scratch.topo[entry.node];
            info.waiting_key = None;
            info.set_done(direction);
            trace!(node = entry.node, weight = entry.path_weight, "cycle break");
            entry.node
        } else {
            break;
        };

        if from == terminal {
            continue;
        }

        let shift = ctx.step_shift(from);
        let from_level = scratch.topo[from].level;
        for edge in direction.edges(ctx.graph, from) {
            let to = edge.node;
            if to == from || !ctx.is_legal(to, scratch) {
                continue;
            }
            if scratch.topo[to].done(direction) {
                // Late arrival across a broken cycle; its contribution is
                // dropped.
                trace!(from, to, "merge into settled node skipped");
                continue;
            }

            rule.merge(ctx, scratch, from, to, shift);
            scratch.touch(to);

            let expected = expected_arrivals(ctx, direction, to, scratch);
            let info = &mut scratch.topo[to];
            info.increment_times_visited(direction);
            if info.times_visited(direction) >= expected {
                if let Some(key) = info.waiting_key.take() {
                    waiting.remove(&key);
                }
                info.set_done(direction);
                info.level = info.level.max(from_level + 1);
                ready.push_back(to);
            } else {
                let key = WaitingNode {
                    path_weight: info.min_bucket_weight,
                    source_distance: scratch.distances[to].source_distance,
                    node: to,
                };
                let stale = info.waiting_key.replace(key);
                if stale != Some(key) {
                    if let Some(old) = stale {
                        waiting.remove(&old);
                    }
                    waiting.insert(key);
                }
            }
        }
    }
}

/// Number of legal neighbours that must merge into `node` before it is
/// expanded: in-edges for the forward pass, out-edges for the backward
/// pass. Computed lazily and cached for the rest of the job.
fn expected_arrivals(
    ctx: &JobContext<'_>,
    direction: PassDirection,
    node: NodeId,
    scratch: &mut JobScratch,
) -> u32 {
    let cached = match direction {
        PassDirection::FromSource => scratch.topo[node].num_legal_in,
        PassDirection::FromSink => scratch.topo[node].num_legal_out,
    };
    if let Some(value) = cached {
        return value;
    }

    let opposite = match direction {
        PassDirection::FromSource => PassDirection::FromSink,
        PassDirection::FromSink => PassDirection::FromSource,
    };
    let mut count = 0u32;
    for edge in opposite.edges(ctx.graph, node) {
        if edge.node != node && ctx.is_legal(edge.node, scratch) {
            count += 1;
        }
    }
    let info = &mut scratch.topo[node];
    match direction {
        PassDirection::FromSource => info.num_legal_in = Some(count),
        PassDirection::FromSink => info.num_legal_out = Some(count),
    }
    count
}
