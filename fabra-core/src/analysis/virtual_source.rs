//! Virtual sources for backward-through-pin enumeration.
//!
//! Paths cannot normally be enumerated out of an input pin, since pins are
//! not sources. To account for a pin's fanout the analysis can synthesise
//! a source that feeds the wires upstream of the pin: a bounded backward
//! walk collects the pin's wire predecessors together with an arrival
//! probability each, and a zero-weight SOURCE node is appended whose
//! out-edges point at that set. Forward passes may then start at the
//! synthetic node as if it were real.

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    graph::{EdgeRef, NodeId, NodeType, RoutingGraph},
    options::UserOptions,
};

use super::error::{AnalysisError, Result};

/// A synthesised source and the predecessor set it feeds.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualSource {
    /// Id of the appended SOURCE node.
    pub node: NodeId,
    /// Fed wire nodes with the probability a signal arriving at the pin
    /// traversed them.
    pub feeds: Vec<(NodeId, f64)>,
}

/// Walks backward from `ipin` to at most `max_depth` hops, collecting wire
/// predecessors, and appends a virtual source feeding them. The id of the
/// new node is recorded on the pin.
///
/// Arrival probabilities compound the availability of each wire stepped
/// through, using the fixed routing-node demand when the options carry
/// one.
///
/// # Errors
/// Returns [`AnalysisError::UnknownNode`] for an out-of-range id and
/// [`AnalysisError::NotAnInputPin`] when `ipin` is not an IPIN.
pub fn attach_virtual_source(
    graph: &mut RoutingGraph,
    options: &UserOptions,
    ipin: NodeId,
    max_depth: u32,
) -> Result<VirtualSource> {
    let pin = graph.node(ipin).ok_or(AnalysisError::UnknownNode {
        node: ipin,
        num_nodes: graph.num_nodes(),
    })?;
    if pin.node_type() != NodeType::Ipin {
        return Err(AnalysisError::NotAnInputPin { node: ipin });
    }

    let wire_demand = options.use_routing_node_demand.unwrap_or(0.0);
    let mut visited = vec![false; graph.num_nodes()];
    let mut feeds: Vec<(NodeId, f64, EdgeRef)> = Vec::new();
    let mut frontier = VecDeque::new();
    visited[ipin] = true;
    frontier.push_back((ipin, 0u32, 1.0f64));

    while let Some((node, depth, probability)) = frontier.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(record) = graph.node(node) else { continue };
        for edge in record.in_edges() {
            let pred = edge.node;
            if visited.get(pred).copied().unwrap_or(true) {
                continue;
            }
            visited[pred] = true;
            let Some(pred_record) = graph.node(pred) else { continue };
            let arrival = if pred_record.node_type().is_wire() {
                probability * (1.0 - wire_demand)
            } else {
                probability
            };
            if pred_record.node_type().is_wire() {
                feeds.push((
                    pred,
                    arrival,
                    EdgeRef {
                        node: pred,
                        switch: edge.switch,
                    },
                ));
            }
            frontier.push_back((pred, depth + 1, arrival));
        }
    }

    let edges: Vec<EdgeRef> = feeds.iter().map(|&(_, _, edge)| edge).collect();
    let node = graph.append_virtual_source(ipin, edges);
    debug!(ipin, node, feeds = feeds.len(), "virtual source attached");
    Ok(VirtualSource {
        node,
        feeds: feeds
            .into_iter()
            .map(|(pred, probability, _)| (pred, probability))
            .collect(),
    })
}
