//! Per-job source/sink distances and the legality predicate.
//!
//! For one `(source, sink)` pair the oracle floods the graph from both ends:
//! forward over out-edges, backward over in-edges. Weighted distances
//! accumulate the weight of the node being left on each step (so a node's
//! distance excludes its own weight), hop counts accumulate one per step.
//! Every node is settled at most once per flood.

use std::collections::VecDeque;

use crate::graph::{EdgeRef, NodeId, RoutingGraph};

use super::scratch::JobScratch;

/// Which end of the connection a traversal starts from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PassDirection {
    /// Expand over out-edges, starting at the source.
    FromSource,
    /// Expand over in-edges, starting at the sink.
    FromSink,
}

impl PassDirection {
    pub(crate) fn edges<'a>(self, graph: &'a RoutingGraph, node: NodeId) -> &'a [EdgeRef] {
        let Some(record) = graph.node(node) else {
            return &[];
        };
        match self {
            Self::FromSource => record.out_edges(),
            Self::FromSink => record.in_edges(),
        }
    }
}

/// Distance scratch for one node in one job.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NodeDistances {
    pub(crate) source_distance: u32,
    pub(crate) sink_distance: u32,
    pub(crate) source_hops: u32,
    pub(crate) sink_hops: u32,
    pub(crate) visited_from_source: bool,
    pub(crate) visited_from_sink: bool,
    pub(crate) visited_from_source_hops: bool,
    pub(crate) visited_from_sink_hops: bool,
}

impl NodeDistances {
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// A node is legal for the job when both floods reached it and the
    /// tightest path through it fits the weight cap.
    pub(crate) fn is_legal(&self, node_weight: u32, max_path_weight: u32) -> bool {
        self.visited_from_source
            && self.visited_from_sink
            && self.source_distance + node_weight + self.sink_distance <= max_path_weight
    }
}

/// Floods weighted distances from `start`, bounded by `max_path_weight`.
pub(crate) fn flood_distances(
    graph: &RoutingGraph,
    start: NodeId,
    direction: PassDirection,
    max_path_weight: u32,
    scratch: &mut JobScratch,
) {
    let mut queue = VecDeque::new();
    {
        let entry = &mut scratch.distances[start];
        match direction {
            PassDirection::FromSource => {
                if entry.visited_from_source {
                    return;
                }
                entry.visited_from_source = true;
                entry.source_distance = 0;
            }
            PassDirection::FromSink => {
                if entry.visited_from_sink {
                    return;
                }
                entry.visited_from_sink = true;
                entry.sink_distance = 0;
            }
        }
    }
    scratch.touch(start);
    queue.push_back(start);

    while let Some(from) = queue.pop_front() {
        let from_weight = graph.node(from).map_or(0, |n| n.weight());
        let from_distance = match direction {
            PassDirection::FromSource => scratch.distances[from].source_distance,
            PassDirection::FromSink => scratch.distances[from].sink_distance,
        };
        let next_distance = from_distance + from_weight;
        if next_distance > max_path_weight {
            continue;
        }
        for edge in direction.edges(graph, from) {
            let to = edge.node;
            let entry = &mut scratch.distances[to];
            let visited = match direction {
                PassDirection::FromSource => &mut entry.visited_from_source,
                PassDirection::FromSink => &mut entry.visited_from_sink,
            };
            if *visited {
                continue;
            }
            *visited = true;
            match direction {
                PassDirection::FromSource => entry.source_distance = next_distance,
                PassDirection::FromSink => entry.sink_distance = next_distance,
            }
            scratch.touch(to);
            queue.push_back(to);
        }
    }
}

/// Floods hop counts from `start`, bounded by `max_hops`.
pub(crate) fn flood_hops(
    graph: &RoutingGraph,
    start: NodeId,
    direction: PassDirection,
    max_hops: u32,
    scratch: &mut JobScratch,
) {
    let mut queue = VecDeque::new();
    {
        let entry = &mut scratch.distances[start];
        match direction {
            PassDirection::FromSource => {
                if entry.visited_from_source_hops {
                    return;
                }
                entry.visited_from_source_hops = true;
                entry.source_hops = 0;
            }
            PassDirection::FromSink => {
                if entry.visited_from_sink_hops {
                    return;
                }
                entry.visited_from_sink_hops = true;
                entry.sink_hops = 0;
            }
        }
    }
    scratch.touch(start);
    queue.push_back(start);

    while let Some(from) = queue.pop_front() {
        let from_hops = match direction {
            PassDirection::FromSource => scratch.distances[from].source_hops,
            PassDirection::FromSink => scratch.distances[from].sink_hops,
        };
        if from_hops + 1 > max_hops {
            continue;
        }
        for edge in direction.edges(graph, from) {
            let to = edge.node;
            let entry = &mut scratch.distances[to];
            let visited = match direction {
                PassDirection::FromSource => &mut entry.visited_from_source_hops,
                PassDirection::FromSink => &mut entry.visited_from_sink_hops,
            };
            if *visited {
                continue;
            }
            *visited = true;
            match direction {
                PassDirection::FromSource => entry.source_hops = from_hops + 1,
                PassDirection::FromSink => entry.sink_hops = from_hops + 1,
            }
            scratch.touch(to);
            queue.push_back(to);
        }
    }
}
