//! Command implementations and argument parsing for the fabra CLI.

use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use fabra_core::{
    AnalysisError, AnalysisSettings, GraphMode, NodeType, OptionsError, ParseError, RoutingGraph,
    SelfCongestionMode, UserOptions, analyze_connection, parse_rr_graph_file, run_analysis,
};

const DEFAULT_MAX_CONNECTION_LENGTH: usize = 3;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "fabra",
    about = "Estimate the routability of an FPGA routing-resource graph."
)]
pub struct Cli {
    /// Emit diagnostics as JSON instead of human-readable lines.
    #[arg(long = "log-json", global = true)]
    pub log_json: bool,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Load a routing graph and estimate its reliability.
    Analyze(AnalyzeCommand),
}

/// Structure of the routing graph file.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GraphModeArg {
    /// Full VPR dump with grid, block types, and channels.
    Vpr,
    /// Bare node/switch/edge graph with one source and one sink.
    Simple,
}

impl From<GraphModeArg> for GraphMode {
    fn from(arg: GraphModeArg) -> Self {
        match arg {
            GraphModeArg::Vpr => Self::Vpr,
            GraphModeArg::Simple => Self::Simple,
        }
    }
}

/// Self-congestion discounting scheme.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CongestionArg {
    /// No discounting.
    None,
    /// Discount from nearby path-count history.
    Radius,
    /// Discount exact per-parent contributions.
    PathDependence,
}

impl From<CongestionArg> for SelfCongestionMode {
    fn from(arg: CongestionArg) -> Self {
        match arg {
            CongestionArg::None => Self::None,
            CongestionArg::Radius => Self::Radius,
            CongestionArg::PathDependence => Self::PathDependence,
        }
    }
}

/// Options accepted by the `analyze` command.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeCommand {
    /// Path to the routing graph XML dump.
    pub path: PathBuf,

    /// Structure of the graph file.
    #[arg(long = "graph-mode", value_enum, default_value_t = GraphModeArg::Vpr)]
    pub graph_mode: GraphModeArg,

    /// Longest Manhattan connection length to analyse.
    #[arg(long = "max-connection-length", default_value_t = DEFAULT_MAX_CONNECTION_LENGTH)]
    pub max_connection_length: usize,

    /// Restrict test tiles to the device core.
    #[arg(long = "analyze-core")]
    pub analyze_core: bool,

    /// Fix wire demand to this value instead of accumulating deposits.
    #[arg(long = "routing-node-demand")]
    pub routing_node_demand: Option<f64>,

    /// Worker threads for enumeration and probability analysis.
    #[arg(long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Search for the demand multiplier reaching this reliability.
    #[arg(long = "target-reliability")]
    pub target_reliability: Option<f64>,

    /// Self-congestion discounting scheme.
    #[arg(long = "self-congestion", value_enum, default_value_t = CongestionArg::None)]
    pub self_congestion: CongestionArg,

    /// Usage probability of each receiver pin.
    #[arg(long = "ipin-probability", default_value_t = 1.0)]
    pub ipin_probability: f64,

    /// Usage probability of each driver pin.
    #[arg(long = "opin-probability", default_value_t = 1.0)]
    pub opin_probability: f64,

    /// Scale factor applied to every demand deposit.
    #[arg(long = "demand-multiplier", default_value_t = 1.0)]
    pub demand_multiplier: f64,

    /// Comma-separated occurrence probability per connection length.
    #[arg(long = "length-probabilities", value_delimiter = ',')]
    pub length_probabilities: Option<Vec<f64>>,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Thread count was zero.
    #[error("--threads must be at least 1")]
    InvalidThreads,
    /// Option validation failed.
    #[error(transparent)]
    Options(#[from] OptionsError),
    /// Graph loading failed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Analysis failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    /// A simple-mode graph did not carry a source/sink pair.
    #[error("simple graph has no {missing} node")]
    MissingEndpoint {
        /// Which endpoint kind was absent.
        missing: &'static str,
    },
}

impl CliError {
    /// Stable machine-readable code of the underlying failure, when the
    /// wrapped error carries one.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidThreads | Self::MissingEndpoint { .. } => None,
            Self::Options(err) => Some(err.code().as_str()),
            Self::Parse(err) => Some(err.code().as_str()),
            Self::Analysis(err) => Some(err.code().as_str()),
        }
    }
}

/// Summarises the outcome of executing a CLI command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionSummary {
    /// Estimated reliability of the fabric.
    pub reliability: f64,
    /// Demand multiplier found by the target search, when one ran.
    pub demand_multiplier: Option<f64>,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when option validation, graph loading, or the
/// analysis itself fails.
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Analyze(command) => run_analyze(command),
    }
}

fn run_analyze(command: AnalyzeCommand) -> Result<ExecutionSummary, CliError> {
    let threads = NonZeroUsize::new(command.threads).ok_or(CliError::InvalidThreads)?;

    let mut builder = UserOptions::builder(&command.path)
        .with_graph_mode(command.graph_mode.into())
        .with_max_connection_length(command.max_connection_length)
        .with_analyze_core(command.analyze_core)
        .with_num_threads(threads)
        .with_self_congestion_mode(command.self_congestion.into())
        .with_ipin_probability(command.ipin_probability)
        .with_opin_probability(command.opin_probability)
        .with_demand_multiplier(command.demand_multiplier);
    if let Some(demand) = command.routing_node_demand {
        builder = builder.with_routing_node_demand(demand);
    }
    if let Some(target) = command.target_reliability {
        builder = builder.with_target_reliability(target);
    }
    if let Some(lengths) = command.length_probabilities.clone() {
        builder = builder.with_length_probabilities(lengths);
    }
    let options = builder.build()?;

    let parsed = parse_rr_graph_file(&options.rr_graph_file, options.graph_mode)?;
    match parsed.architecture {
        Some(mut arch) => {
            let settings = AnalysisSettings::from_options(&options, &mut arch)?;
            let outcome = run_analysis(&parsed.graph, &settings, &options)?;
            Ok(ExecutionSummary {
                reliability: outcome.reliability,
                demand_multiplier: outcome.demand_multiplier,
            })
        }
        None => analyze_simple_graph(&parsed.graph, &options),
    }
}

/// Simple graphs carry a single source/sink pair; analyse that one
/// connection under the configured wire demand.
fn analyze_simple_graph(
    graph: &RoutingGraph,
    options: &UserOptions,
) -> Result<ExecutionSummary, CliError> {
    let source = find_node(graph, NodeType::Source).ok_or(CliError::MissingEndpoint {
        missing: "SOURCE",
    })?;
    let sink = find_node(graph, NodeType::Sink).ok_or(CliError::MissingEndpoint {
        missing: "SINK",
    })?;

    let demands: Vec<f64> = match options.use_routing_node_demand {
        Some(demand) => graph
            .nodes()
            .iter()
            .map(|node| {
                if node.node_type().is_wire() {
                    demand * options.demand_multiplier
                } else {
                    0.0
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let cap = options.max_connection_length as u32 + fabra_core::PATH_WEIGHT_SLACK;
    let result = analyze_connection(
        graph,
        source,
        sink,
        cap,
        &demands,
        options.self_congestion_mode,
    )?;
    Ok(ExecutionSummary {
        reliability: result.reachability,
        demand_multiplier: None,
    })
}

fn find_node(graph: &RoutingGraph, node_type: NodeType) -> Option<usize> {
    graph
        .nodes()
        .iter()
        .position(|node| node.node_type() == node_type && !node.is_virtual_source())
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "reliability: {:.6}", summary.reliability)?;
    if let Some(multiplier) = summary.demand_multiplier {
        writeln!(writer, "demand multiplier: {multiplier:.6}")?;
    }
    Ok(())
}
