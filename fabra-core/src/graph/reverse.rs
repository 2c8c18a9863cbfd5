//! Reverse-edge construction.
//!
//! Forward edge lists come straight from the graph file; backward traversals
//! need the mirror image. Built once after load, in two passes: gather the
//! incoming edges of every node, then install them. A type filter restricts
//! installation to nodes of that type (used when only pins need reverse
//! edges).

use super::node::{EdgeRef, NodeType, RrNode};

/// Populates `in_edges` for every node (or only nodes of `filter`'s type)
/// from the forward edge lists.
pub fn build_reverse_edges(nodes: &mut [RrNode], filter: Option<NodeType>) {
    let mut incoming: Vec<Vec<EdgeRef>> = vec![Vec::new(); nodes.len()];
    for (from, node) in nodes.iter().enumerate() {
        for edge in node.out_edges() {
            incoming[edge.node].push(EdgeRef {
                node: from,
                switch: edge.switch,
            });
        }
    }

    for (id, node) in nodes.iter_mut().enumerate() {
        node.clear_in_edges();
        if filter.is_none_or(|t| t == node.node_type()) {
            node.set_in_edges(std::mem::take(&mut incoming[id]));
        }
    }
}
