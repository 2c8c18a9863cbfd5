//! Path enumeration over the legal subgraph.
//!
//! The forward pass counts, per node and per bucket index, the distinct
//! legal partial paths from the source; the backward pass mirrors it from
//! the sink. A step leaving node `u` advances the bucket index by `u`'s
//! weight, so a node's source-keyed index excludes its own weight and the
//! per-node path count follows directly from pairing prefixes with
//! fitting suffixes. After both passes the job deposits the demand its
//! connection induces on every legal node.

use crate::graph::RrNode;
use crate::options::SelfCongestionMode;

use super::{
    demand::DemandMap,
    distances::PassDirection,
    error::Result,
    history::PathHistories,
    scratch::JobScratch,
    topo::{JobContext, MergeRule, traverse},
};

/// Enumeration merge: bucket-wise addition of path counts.
pub(crate) struct PathCountRule {
    direction: PassDirection,
    /// Record per-parent contributions for path-dependence discounting.
    record_contributions: bool,
}

impl PathCountRule {
    pub(crate) fn new(direction: PassDirection, record_contributions: bool) -> Self {
        Self {
            direction,
            record_contributions,
        }
    }
}

impl MergeRule for PathCountRule {
    fn seed(&mut self, ctx: &JobContext<'_>, scratch: &mut JobScratch, start: usize) {
        let info = &mut scratch.topo[start];
        info.buckets.ensure_capacity(ctx.max_path_weight);
        match self.direction {
            PassDirection::FromSource => info.buckets.source_mut()[0] = 1.0,
            PassDirection::FromSink => info.buckets.sink_mut()[0] = 1.0,
        }
    }

    fn merge(
        &mut self,
        ctx: &JobContext<'_>,
        scratch: &mut JobScratch,
        from: usize,
        to: usize,
        shift: u32,
    ) {
        let cap = ctx.max_path_weight;
        if shift > cap {
            return;
        }
        let (from_buckets, to_info) = scratch.merge_pair(from, to);
        to_info.buckets.ensure_capacity(cap);
        for w in 0..=cap - shift {
            let count = match self.direction {
                PassDirection::FromSource => from_buckets.source_at(w),
                PassDirection::FromSink => from_buckets.sink_at(w),
            };
            if count == 0.0 {
                continue;
            }
            let index = w + shift;
            match self.direction {
                PassDirection::FromSource => to_info.buckets.source_mut()[index as usize] += count,
                PassDirection::FromSink => to_info.buckets.sink_mut()[index as usize] += count,
            }
            to_info.record_bucket_weight(index);
            if self.record_contributions && self.direction == PassDirection::FromSource {
                let slots = to_info
                    .demand_discounts
                    .entry(from)
                    .or_insert_with(|| vec![0.0; cap as usize + 1]);
                slots[index as usize] += count;
            }
        }
    }
}

/// Runs the forward and backward enumeration passes and returns the number
/// of legal source-to-sink paths.
pub(crate) fn run_enumeration(
    ctx: &JobContext<'_>,
    scratch: &mut JobScratch,
    congestion_mode: SelfCongestionMode,
) -> f64 {
    let record = congestion_mode == SelfCongestionMode::PathDependence;
    let mut forward = PathCountRule::new(PassDirection::FromSource, record);
    traverse(ctx, PassDirection::FromSource, scratch, &mut forward);
    let mut backward = PathCountRule::new(PassDirection::FromSink, false);
    traverse(ctx, PassDirection::FromSink, scratch, &mut backward);

    scratch
        .buckets(ctx.sink)
        .num_paths(ctx.node_weight(ctx.sink), ctx.max_path_weight)
}

/// What a job deposits into the shared demand tables.
pub(crate) struct DepositContext<'a> {
    pub(crate) demands: &'a DemandMap,
    pub(crate) histories: Option<&'a PathHistories>,
    pub(crate) congestion_mode: SelfCongestionMode,
    /// Probability-weighted scale for this connection: source pin usage
    /// times length occurrence times the demand multiplier.
    pub(crate) scale: f64,
    /// Whether the job's contributions are added to the shared tables.
    /// Single-connection analysis runs under a caller-supplied profile and
    /// only converts its discounts.
    pub(crate) accumulate: bool,
}

/// Deposits this job's demand contributions onto every legal node it
/// enumerated paths through, and converts the recorded per-parent path
/// contributions into demand units for the probability pass.
///
/// Returns the total path count.
pub(crate) fn deposit_demands(
    ctx: &JobContext<'_>,
    scratch: &mut JobScratch,
    deposit: &DepositContext<'_>,
) -> Result<f64> {
    let cap = ctx.max_path_weight;
    let total = scratch
        .buckets(ctx.sink)
        .num_paths(ctx.node_weight(ctx.sink), cap);
    if total <= 0.0 {
        return Ok(0.0);
    }

    let endpoints = (ctx.graph.node(ctx.source), ctx.graph.node(ctx.sink));
    let touched: Vec<usize> = scratch.touched().to_vec();
    for v in touched {
        if v == ctx.source || !ctx.is_legal(v, scratch) {
            continue;
        }
        let node_weight = ctx.node_weight(v);
        let paths_through = scratch.buckets(v).num_paths(node_weight, cap);
        if paths_through <= 0.0 {
            continue;
        }
        let share = (paths_through / total).min(1.0);
        let amount = share * deposit.scale;
        if deposit.accumulate {
            deposit.demands.deposit(v, amount)?;
        }

        match deposit.congestion_mode {
            SelfCongestionMode::PathDependence => {
                convert_contributions(scratch, v, node_weight, cap, total, deposit.scale);
            }
            SelfCongestionMode::Radius => {
                if let (Some(histories), (Some(source), Some(sink))) =
                    (deposit.histories, endpoints)
                {
                    if deposit.accumulate {
                        record_history(ctx, v, histories, source, sink, amount);
                    }
                }
            }
            SelfCongestionMode::None => {}
        }
    }
    Ok(total)
}

/// Rewrites a node's raw per-parent path counts into the demand each
/// parent contributed, per bucket index: prefix count times fitting
/// suffixes, scaled like the deposit itself.
fn convert_contributions(
    scratch: &mut JobScratch,
    v: usize,
    node_weight: u32,
    cap: u32,
    total: f64,
    scale: f64,
) {
    let completions: Vec<f64> = (0..=cap)
        .map(|w| scratch.buckets(v).completions(node_weight, w, cap))
        .collect();
    let info = &mut scratch.topo[v];
    for slots in info.demand_discounts.values_mut() {
        for (w, slot) in slots.iter_mut().enumerate() {
            if *slot > 0.0 {
                *slot = (*slot * completions[w] / total).min(1.0) * scale;
            }
        }
    }
}

fn record_history(
    ctx: &JobContext<'_>,
    v: usize,
    histories: &PathHistories,
    source: &RrNode,
    sink: &RrNode,
    amount: f64,
) {
    let Some(node_rec) = ctx.graph.node(v) else {
        return;
    };
    histories.record(v, node_rec, source, amount);
    histories.record(v, node_rec, sink, amount);
}
