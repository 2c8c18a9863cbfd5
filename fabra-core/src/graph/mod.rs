//! The routing-resource graph store and its spatial lookup.
//!
//! The store owns the node and switch tables and, for full graphs, the
//! `(type, x, y, side, ptc)` lookup index. Everything is immutable once
//! loaded; the only post-load mutation is appending virtual sources before
//! analysis begins.

mod arch;
mod error;
mod lookup;
mod node;
mod reverse;

pub use self::{
    arch::{Architecture, BlockCategory, BlockType, ChannelWidths, GridTile, PinClass, PinType},
    error::{GraphError, GraphErrorCode},
    lookup::NodeLookup,
    node::{Direction, EdgeRef, NodeId, NodeType, RrNode, Side, Switch, SwitchId},
    reverse::build_reverse_edges,
};

use self::error::Result;

/// Owns the routing-resource nodes, switch types, and spatial lookup.
#[derive(Clone, Debug, Default)]
pub struct RoutingGraph {
    nodes: Vec<RrNode>,
    switches: Vec<Switch>,
    lookup: Option<NodeLookup>,
}

impl RoutingGraph {
    /// Assembles the store from parsed nodes and switches, checking that
    /// every edge references a known node and switch, then builds reverse
    /// edges and derives node weights.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownNode`] or [`GraphError::UnknownSwitch`]
    /// when an edge points outside the tables.
    pub fn new(nodes: Vec<RrNode>, switches: Vec<Switch>) -> Result<Self> {
        let num_nodes = nodes.len();
        let num_switches = switches.len();
        for node in &nodes {
            for edge in node.out_edges() {
                if edge.node >= num_nodes {
                    return Err(GraphError::UnknownNode {
                        node: edge.node,
                        num_nodes,
                    });
                }
                if edge.switch >= num_switches {
                    return Err(GraphError::UnknownSwitch {
                        switch: edge.switch,
                        num_switches,
                    });
                }
            }
        }
        let mut graph = Self {
            nodes,
            switches,
            lookup: None,
        };
        build_reverse_edges(&mut graph.nodes, None);
        graph.init_node_weights();
        Ok(graph)
    }

    /// Builds and verifies the spatial lookup against the architecture.
    ///
    /// # Errors
    /// Propagates lookup construction and verification failures; all are
    /// fatal at load.
    pub fn build_lookup(&mut self, arch: &Architecture) -> Result<()> {
        let (width, height) = arch.grid_size();
        let grid: Vec<Vec<GridTile>> = (0..width)
            .map(|x| {
                (0..height)
                    .map(|y| arch.tile(x, y).copied().unwrap_or_default())
                    .collect()
            })
            .collect();
        let lookup = NodeLookup::build(
            &self.nodes,
            (width, height),
            &grid,
            arch.channel_widths().max,
        )?;
        lookup.verify(&self.nodes)?;
        self.lookup = Some(lookup);
        Ok(())
    }

    /// Number of nodes, including any appended virtual sources.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The node with the given id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&RrNode> {
        self.nodes.get(id)
    }

    /// All nodes, in id order.
    #[must_use]
    pub fn nodes(&self) -> &[RrNode] {
        &self.nodes
    }

    /// Number of switch types.
    #[must_use]
    pub fn num_switches(&self) -> usize {
        self.switches.len()
    }

    /// The switch type with the given id.
    #[must_use]
    pub fn switch(&self, id: SwitchId) -> Option<&Switch> {
        self.switches.get(id)
    }

    /// Resolves a node at a fully qualified coordinate. `side` is ignored
    /// for non-pin types (they store on a single canonical side).
    #[must_use]
    pub fn node_index(
        &self,
        node_type: NodeType,
        x: u16,
        y: u16,
        ptc: u16,
        side: Option<Side>,
    ) -> Option<NodeId> {
        let lookup = self.lookup.as_ref()?;
        match side {
            Some(side) if node_type.is_pin() => lookup.get(node_type, x, y, side, ptc),
            _ if node_type.is_pin() => lookup.all_sides(node_type, x, y, ptc).first().copied(),
            _ => lookup.get(node_type, x, y, Side::Top, ptc),
        }
    }

    /// Resolves a node at a coordinate on every side it appears.
    #[must_use]
    pub fn node_indices(&self, node_type: NodeType, x: u16, y: u16, ptc: u16) -> Vec<NodeId> {
        self.lookup
            .as_ref()
            .map_or_else(Vec::new, |lookup| lookup.all_sides(node_type, x, y, ptc))
    }

    /// The widest ptc observed on any wire, plus one. Zero when the graph
    /// has no wires.
    #[must_use]
    pub fn max_chan_width(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.node_type().is_wire())
            .map(|node| usize::from(node.ptc()) + 1)
            .max()
            .unwrap_or(0)
    }

    /// Appends a synthetic source feeding the given edges and wires it to
    /// `ipin` as that pin's virtual source. Returns the new node's id.
    ///
    /// The synthetic node copies the pin's coordinates and ptc, has weight
    /// zero, and takes no incoming edges.
    pub(crate) fn append_virtual_source(&mut self, ipin: NodeId, feeds: Vec<EdgeRef>) -> NodeId {
        let id = self.nodes.len();
        let (coords, ptc) = self
            .node(ipin)
            .map_or(((0, 0, 0, 0), 0), |pin| {
                (
                    (pin.xlow(), pin.ylow(), pin.xhigh(), pin.yhigh()),
                    pin.ptc(),
                )
            });
        let mut source = RrNode::new(NodeType::Source, ptc);
        source.set_coordinates(coords.0, coords.1, coords.2, coords.3);
        source.mark_virtual_source();
        for edge in &feeds {
            source.push_out_edge(*edge);
        }
        self.nodes.push(source);
        // Keep the in-edge lists consistent with the new forward edges.
        for edge in feeds {
            if let Some(target) = self.nodes.get_mut(edge.node) {
                target.push_in_edge(EdgeRef {
                    node: id,
                    switch: edge.switch,
                });
            }
        }
        if let Some(pin) = self.nodes.get_mut(ipin) {
            pin.set_virtual_source_node(id);
        }
        id
    }

    /// Overrides a node's derived weight. Test graphs use this to model
    /// fabrics with arbitrary entry costs.
    #[cfg(test)]
    pub(crate) fn set_node_weight(&mut self, id: NodeId, weight: u32) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_weight(weight);
        }
    }

    /// A node fed by any buffered switch costs one unit to enter; a node
    /// fed only by pass transistors is free. Sources have no in-switches
    /// and cost nothing.
    fn init_node_weights(&mut self) {
        let weights: Vec<u32> = self
            .nodes
            .iter()
            .map(|node| {
                let buffered = node.in_edges().iter().any(|edge| {
                    self.switches
                        .get(edge.switch)
                        .is_some_and(|switch| switch.buffered)
                });
                u32::from(buffered)
            })
            .collect();
        for (node, weight) in self.nodes.iter_mut().zip(weights) {
            node.set_weight(weight);
        }
    }
}
