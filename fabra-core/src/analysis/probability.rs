//! Probability-of-non-reachability propagation.
//!
//! Reuses the topological engine with buckets reinterpreted: entry `w` of a
//! node's source-keyed array holds the probability that no usable path of
//! that weight reaches the node. Parents combine independently; each
//! parent's contribution is damped by the node's effective demand, which is
//! its accumulated demand minus any self-congestion discount. The final
//! reachability of the connection falls out of the sink's buckets.

use tracing::warn;

use crate::{PROB_TOL, options::SelfCongestionMode};

use super::{
    distances::PassDirection,
    scratch::JobScratch,
    topo::{JobContext, MergeRule, traverse},
};

/// Probability merge: independent combination of parent contributions.
pub(crate) struct ProbabilityRule {
    congestion_mode: SelfCongestionMode,
}

impl ProbabilityRule {
    pub(crate) fn new(congestion_mode: SelfCongestionMode) -> Self {
        Self { congestion_mode }
    }
}

impl MergeRule for ProbabilityRule {
    fn seed(&mut self, ctx: &JobContext<'_>, scratch: &mut JobScratch, start: usize) {
        let info = &mut scratch.topo[start];
        info.buckets.fill_source_up_to(ctx.max_path_weight, 1.0);
        info.buckets.source_mut()[0] = 0.0;
        info.prob_initialized = true;
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
        if !to_info.prob_initialized {
            to_info.buckets.fill_source_up_to(cap, 1.0);
            to_info.prob_initialized = true;
        }
        let demand_base = to_info.cached_demand;
        for w in shift..=cap {
            let upstream = from_buckets.source_at(w - shift);
            if upstream >= 1.0 {
                // No usable path of this weight arrives through `from`.
                continue;
            }
            let discount = match self.congestion_mode {
                SelfCongestionMode::None => 0.0,
                SelfCongestionMode::Radius => to_info.radius_discount,
                SelfCongestionMode::PathDependence => to_info
                    .demand_discounts
                    .get(&from)
                    .and_then(|slots| slots.get(w as usize))
                    .copied()
                    .unwrap_or(0.0),
            };
            let demand_effective = (demand_base - discount).clamp(0.0, 1.0);
            let p_from = 1.0 - (1.0 - upstream) * (1.0 - demand_effective);
            to_info.buckets.source_mut()[w as usize] *= p_from;
            to_info.record_bucket_weight(w);
        }
    }
}

/// Runs the probability pass and returns the probability that the
/// connection is routable.
///
/// The traversal state left behind by enumeration is reset first; the
/// legal-neighbour caches survive, since legality does not change within a
/// job.
pub(crate) fn run_probability(
    ctx: &JobContext<'_>,
    scratch: &mut JobScratch,
    congestion_mode: SelfCongestionMode,
) -> f64 {
    for index in 0..scratch.touched().len() {
        let node = scratch.touched()[index];
        scratch.topo[node].reset_traversal();
    }

    let mut rule = ProbabilityRule::new(congestion_mode);
    traverse(ctx, PassDirection::FromSource, scratch, &mut rule);

    let sink_info = &scratch.topo[ctx.sink];
    if !sink_info.prob_initialized {
        return 0.0;
    }
    let p_unreachable = sink_info.buckets.probability_not_reachable(ctx.max_path_weight);
    clamp_probability(1.0 - p_unreachable, "connection reachability")
}

/// Clamps a computed probability to `[0, 1]`, logging values that stray
/// beyond the comparison tolerance.
pub(crate) fn clamp_probability(value: f64, context: &'static str) -> f64 {
    if !(-PROB_TOL..=1.0 + PROB_TOL).contains(&value) {
        warn!(value, context, "probability outside [0, 1], clamping");
    }
    value.clamp(0.0, 1.0)
}
