//! Fabra core library.
//!
//! Estimates the routability of an FPGA routing-resource graph: given the
//! device grid, pin catalog, and the directed graph of routing nodes, it
//! computes how likely representative source-to-sink connections are to be
//! realizable under a demand profile. The pipeline floods per-connection
//! distances, enumerates legal paths with a cycle-tolerant topological
//! traversal, propagates probability-of-non-reachability through the same
//! machinery, and aggregates a reliability estimate across a pool of
//! parallel workers.

mod analysis;
mod graph;
mod options;
mod parse;

pub use crate::{
    analysis::{
        AnalysisError, AnalysisErrorCode, AnalysisOutcome, AnalysisSettings, ConnectionAnalysis,
        PATH_COUNT_HISTORY_RADIUS, PATH_WEIGHT_SLACK, VirtualSource, analyze_connection,
        attach_virtual_source, run_analysis,
    },
    graph::{
        Architecture, BlockCategory, BlockType, ChannelWidths, Direction, EdgeRef, GraphError,
        GraphErrorCode, GridTile, NodeId, NodeLookup, NodeType, PinClass, PinType, RoutingGraph,
        RrNode, Side, Switch, SwitchId, build_reverse_edges,
    },
    options::{
        BucketMode, GraphMode, OptionsError, OptionsErrorCode, SelfCongestionMode, UserOptions,
        UserOptionsBuilder,
    },
    parse::{ParseError, ParseErrorCode, ParsedGraph, parse_rr_graph_file},
};

/// Tolerance used when comparing probabilities. Probabilities differing by
/// less than this are treated as equal, and computed values straying
/// beyond `[0 - PROB_TOL, 1 + PROB_TOL]` are clamped and logged.
pub const PROB_TOL: f64 = 1e-6;

/// Compares two probabilities within [`PROB_TOL`].
#[must_use]
pub fn probs_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= PROB_TOL
}

#[cfg(test)]
pub(crate) mod test_utils;
