//! Job scheduling and reliability aggregation.
//!
//! The run fans (test tile, source pin, sink tile, sink pin) jobs across a
//! rayon pool sized by the configured thread count. Each worker leases a
//! scratch arena, runs the distance oracle, both enumeration passes, and
//! the probability pass for its job, then folds the connection's
//! reachability into a probability-weighted running total. An optional
//! outer bisection searches for the demand multiplier that lands the run
//! on a target reliability.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    PROB_TOL,
    graph::{NodeId, NodeType, PinType, RoutingGraph},
    options::{BucketMode, SelfCongestionMode, UserOptions},
};

use super::{
    demand::DemandMap,
    distances::{PassDirection, flood_distances, flood_hops},
    enumerate::{DepositContext, deposit_demands, run_enumeration},
    error::{AnalysisError, Result},
    history::PathHistories,
    probability::run_probability,
    scratch::{JobScratch, ScratchPool},
    settings::AnalysisSettings,
    topo::JobContext,
};

/// Manhattan radius inside which radius-mode self-congestion history is
/// kept.
pub const PATH_COUNT_HISTORY_RADIUS: u32 = 3;

/// Result of one full routability run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalysisOutcome {
    /// Probability-weighted reachability over all analysed connections.
    pub reliability: f64,
    /// The demand multiplier found by the target search, when one ran.
    pub demand_multiplier: Option<f64>,
}

/// Result of analysing a single source/sink connection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConnectionAnalysis {
    /// Number of legal paths between the endpoints.
    pub num_paths: f64,
    /// Probability that the connection is routable.
    pub reachability: f64,
}

/// One unit of work for the pool.
#[derive(Clone, Copy, Debug)]
struct Job {
    source: NodeId,
    sink: NodeId,
    length: usize,
    /// Relative weight in the reliability average.
    weight: f64,
    /// Demand-deposit scale before the multiplier: source-pin usage times
    /// length occurrence.
    deposit_scale: f64,
}

/// Analyses one connection in isolation with explicit per-node demands.
///
/// This is the single-job pipeline the pool runs, exposed for embedding
/// programs that drive hand-picked connections (and for virtual-source
/// enumeration). `node_demands` supplies the demand of each node by id;
/// missing entries read as zero.
///
/// # Errors
/// Returns [`AnalysisError::UnknownNode`] when an endpoint is outside the
/// graph.
pub fn analyze_connection(
    graph: &RoutingGraph,
    source: NodeId,
    sink: NodeId,
    max_path_weight: u32,
    node_demands: &[f64],
    congestion_mode: SelfCongestionMode,
) -> Result<ConnectionAnalysis> {
    for endpoint in [source, sink] {
        if endpoint >= graph.num_nodes() {
            return Err(AnalysisError::UnknownNode {
                node: endpoint,
                num_nodes: graph.num_nodes(),
            });
        }
    }
    let mut demands = DemandMap::from_values(node_demands.to_vec());
    demands.ensure_nodes(graph.num_nodes());
    let histories = PathHistories::new(PATH_COUNT_HISTORY_RADIUS);
    let mut scratch = JobScratch::new(graph.num_nodes());
    let job = Job {
        source,
        sink,
        length: max_path_weight as usize,
        weight: 1.0,
        deposit_scale: 1.0,
    };
    let ctx = JobContext {
        graph,
        source,
        sink,
        max_path_weight,
        bucket_mode: BucketMode::ByPathWeight,
    };
    let (num_paths, reachability) = execute_job(
        &ctx,
        &job,
        &mut scratch,
        &demands,
        &histories,
        congestion_mode,
        JobDeposits::DiscountOnly,
    )?;
    Ok(ConnectionAnalysis {
        num_paths,
        reachability,
    })
}

/// Runs the full analysis: every job once, plus the optional
/// demand-multiplier search when the options request a target reliability.
///
/// # Errors
/// Propagates job construction and execution failures; a failure in any
/// worker aborts the whole run.
pub fn run_analysis(
    graph: &RoutingGraph,
    settings: &AnalysisSettings,
    options: &UserOptions,
) -> Result<AnalysisOutcome> {
    let jobs = build_jobs(graph, settings)?;
    info!(jobs = jobs.len(), threads = options.num_threads.get(), "starting analysis");

    let runner = Runner::new(graph, settings, options)?;
    let Some(target) = options.target_reliability else {
        let reliability = runner.reliability(&jobs, options.demand_multiplier)?;
        return Ok(AnalysisOutcome {
            reliability,
            demand_multiplier: None,
        });
    };

    let (reliability, multiplier) = search_multiplier(&runner, &jobs, options, target)?;
    Ok(AnalysisOutcome {
        reliability,
        demand_multiplier: Some(multiplier),
    })
}

/// Bisects the demand multiplier until the run's reliability meets
/// `target` within tolerance. Reliability decreases monotonically with the
/// multiplier, so the bracket `[0, hi]` is expanded until it straddles the
/// target and then halved.
fn search_multiplier(
    runner: &Runner<'_>,
    jobs: &[Job],
    options: &UserOptions,
    target: f64,
) -> Result<(f64, f64)> {
    let relaxed = runner.reliability(jobs, 0.0)?;
    if relaxed + PROB_TOL < target {
        return Err(AnalysisError::TargetNotBracketed {
            target,
            multiplier: 0.0,
            reliability: relaxed,
        });
    }

    let mut hi = options.demand_multiplier.max(1.0);
    let mut rel_hi = runner.reliability(jobs, hi)?;
    let mut expansions = 0;
    while rel_hi > target + PROB_TOL {
        if expansions >= 32 {
            return Err(AnalysisError::TargetNotBracketed {
                target,
                multiplier: hi,
                reliability: rel_hi,
            });
        }
        hi *= 2.0;
        rel_hi = runner.reliability(jobs, hi)?;
        expansions += 1;
    }

    let mut lo = 0.0;
    let mut best = (rel_hi, hi);
    for _ in 0..64 {
        if (best.0 - target).abs() <= PROB_TOL {
            break;
        }
        let mid = (lo + hi) / 2.0;
        let reliability = runner.reliability(jobs, mid)?;
        best = (reliability, mid);
        if reliability > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    debug!(multiplier = best.1, reliability = best.0, "multiplier search finished");
    Ok(best)
}

/// Shared state for one or more evaluations of the job list.
struct Runner<'a> {
    graph: &'a RoutingGraph,
    settings: &'a AnalysisSettings,
    options: &'a UserOptions,
    demands: DemandMap,
    histories: PathHistories,
    scratch: ScratchPool,
    pool: rayon::ThreadPool,
}

impl<'a> Runner<'a> {
    fn new(
        graph: &'a RoutingGraph,
        settings: &'a AnalysisSettings,
        options: &'a UserOptions,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.num_threads.get())
            .build()
            .map_err(|source| AnalysisError::WorkerPool {
                message: source.to_string(),
            })?;
        Ok(Self {
            graph,
            settings,
            options,
            demands: DemandMap::new(graph.num_nodes(), options.use_routing_node_demand),
            histories: PathHistories::new(PATH_COUNT_HISTORY_RADIUS),
            scratch: ScratchPool::default(),
            pool,
        })
    }

    /// Evaluates the reliability of the whole job list under the given
    /// demand multiplier.
    fn reliability(&self, jobs: &[Job], multiplier: f64) -> Result<f64> {
        self.demands.reset()?;
        self.histories.clear();

        let (weighted, total_weight) = self.pool.install(|| {
            jobs.par_iter()
                .try_fold(
                    || (0.0f64, 0.0f64),
                    |acc, job| -> Result<(f64, f64)> {
                        let reachability = self.run_job(job, multiplier)?;
                        Ok((acc.0 + reachability * job.weight, acc.1 + job.weight))
                    },
                )
                .try_reduce(|| (0.0, 0.0), |a, b| Ok((a.0 + b.0, a.1 + b.1)))
        })?;

        if total_weight <= 0.0 {
            return Ok(0.0);
        }
        Ok(weighted / total_weight)
    }

    fn run_job(&self, job: &Job, multiplier: f64) -> Result<f64> {
        let ctx = JobContext {
            graph: self.graph,
            source: job.source,
            sink: job.sink,
            max_path_weight: self.settings.max_path_weight(job.length),
            bucket_mode: BucketMode::ByPathWeight,
        };
        let mut scratch = self.scratch.lease(self.graph.num_nodes());
        let mut scaled = *job;
        scaled.deposit_scale *= multiplier;
        let deposits = if self.options.use_routing_node_demand.is_some() {
            JobDeposits::Skip
        } else {
            JobDeposits::Accumulate
        };
        let result = execute_job(
            &ctx,
            &scaled,
            &mut scratch,
            &self.demands,
            &self.histories,
            self.options.self_congestion_mode,
            deposits,
        );
        self.scratch.release(scratch);
        result.map(|(_, reachability)| reachability)
    }
}

/// How a job interacts with the shared demand tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum JobDeposits {
    /// Deposit demand and history, and convert discounts.
    Accumulate,
    /// Convert discounts only; the demand profile is caller-supplied.
    DiscountOnly,
    /// Touch nothing; demands are fixed by configuration.
    Skip,
}

/// The per-job pipeline: distances, enumeration, demand deposit,
/// probability. Clears the scratch before returning.
fn execute_job(
    ctx: &JobContext<'_>,
    job: &Job,
    scratch: &mut JobScratch,
    demands: &DemandMap,
    histories: &PathHistories,
    congestion_mode: SelfCongestionMode,
    deposits: JobDeposits,
) -> Result<(f64, f64)> {
    let cap = ctx.max_path_weight;
    let outcome = (|| -> Result<(f64, f64)> {
        flood_distances(ctx.graph, ctx.source, PassDirection::FromSource, cap, scratch);
        flood_distances(ctx.graph, ctx.sink, PassDirection::FromSink, cap, scratch);
        flood_hops(ctx.graph, ctx.source, PassDirection::FromSource, cap, scratch);
        flood_hops(ctx.graph, ctx.sink, PassDirection::FromSink, cap, scratch);

        if !ctx.is_legal(ctx.source, scratch) || !ctx.is_legal(ctx.sink, scratch) {
            return Ok((0.0, 0.0));
        }

        let num_paths = run_enumeration(ctx, scratch, congestion_mode);
        if num_paths <= 0.0 {
            return Ok((0.0, 0.0));
        }

        if deposits != JobDeposits::Skip {
            let deposit = DepositContext {
                demands,
                histories: (congestion_mode == SelfCongestionMode::Radius)
                    .then_some(histories),
                congestion_mode,
                scale: job.deposit_scale,
                accumulate: deposits == JobDeposits::Accumulate,
            };
            deposit_demands(ctx, scratch, &deposit)?;
        }

        cache_node_demands(ctx, scratch, demands, histories, congestion_mode)?;
        let reachability = run_probability(ctx, scratch, congestion_mode);
        Ok((num_paths, reachability))
    })();
    scratch.clear(cap);
    outcome
}

/// Snapshots each touched node's effective demand (and radius discount)
/// into the scratch so the probability merges run lock-free.
fn cache_node_demands(
    ctx: &JobContext<'_>,
    scratch: &mut JobScratch,
    demands: &DemandMap,
    histories: &PathHistories,
    congestion_mode: SelfCongestionMode,
) -> Result<()> {
    let endpoints = (ctx.graph.node(ctx.source), ctx.graph.node(ctx.sink));
    for index in 0..scratch.touched().len() {
        let v = scratch.touched()[index];
        if !ctx.is_legal(v, scratch) {
            continue;
        }
        let demand = demands.demand(ctx.graph, v)?;
        let radius_discount = match (congestion_mode, endpoints) {
            (SelfCongestionMode::Radius, (Some(source), Some(sink))) => ctx
                .graph
                .node(v)
                .map_or(0.0, |rec| {
                    histories.lookup(v, rec, source) + histories.lookup(v, rec, sink)
                }),
            _ => 0.0,
        };
        let info = &mut scratch.topo[v];
        info.cached_demand = demand;
        info.radius_discount = radius_discount;
    }
    Ok(())
}

/// Expands the settings into the concrete job list.
fn build_jobs(graph: &RoutingGraph, settings: &AnalysisSettings) -> Result<Vec<Job>> {
    let drivers = class_representatives(settings, PinType::Driver);
    let receivers = class_representatives(settings, PinType::Receiver);
    let lengths = settings.length_probabilities();

    let mut jobs = Vec::new();
    for &(x, y) in settings.test_tile_coords() {
        for &(drv_pin, drv_prob) in &drivers {
            let source = graph
                .node_index(NodeType::Opin, x, y, drv_pin, None)
                .ok_or(AnalysisError::MissingPinNode {
                    kind: "OPIN",
                    x,
                    y,
                    ptc: drv_pin,
                })?;
            for &(sx, sy) in settings.receiver_tile_coords() {
                let length = (i32::from(x) - i32::from(sx)).unsigned_abs() as usize
                    + (i32::from(y) - i32::from(sy)).unsigned_abs() as usize;
                if length == 0 || length > settings.max_connection_length() {
                    continue;
                }
                let length_prob = lengths.get(length - 1).copied().unwrap_or(0.0);
                if length_prob <= 0.0 {
                    continue;
                }
                for &(rcv_pin, rcv_prob) in &receivers {
                    let sink = graph
                        .node_index(NodeType::Ipin, sx, sy, rcv_pin, None)
                        .ok_or(AnalysisError::MissingPinNode {
                            kind: "IPIN",
                            x: sx,
                            y: sy,
                            ptc: rcv_pin,
                        })?;
                    jobs.push(Job {
                        source,
                        sink,
                        length,
                        weight: drv_prob * length_prob * rcv_prob,
                        deposit_scale: drv_prob * length_prob,
                    });
                }
            }
        }
    }
    Ok(jobs)
}

/// One representative pin per class of the requested role, weighted by the
/// class's total usage probability.
fn class_representatives(settings: &AnalysisSettings, role: PinType) -> Vec<(u16, f64)> {
    let probabilities = settings.pin_probabilities();
    settings
        .classes()
        .iter()
        .filter(|class| class.pin_type == role)
        .filter_map(|class| {
            let mut total = 0.0;
            let mut representative = None;
            for &pin in &class.pins {
                let probability = probabilities.get(usize::from(pin)).copied().unwrap_or(0.0);
                if probability > 0.0 {
                    total += probability;
                    representative.get_or_insert(pin);
                }
            }
            representative.map(|pin| (pin, total))
        })
        .collect()
}
