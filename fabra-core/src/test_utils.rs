//! Shared graph builders for the test suites.

use crate::graph::{
    Architecture, BlockType, ChannelWidths, EdgeRef, GridTile, NodeType, PinClass, PinType,
    RoutingGraph, RrNode, Side, Switch,
};

/// Builds a graph from explicit node types, weights, and edges. All nodes
/// sit at tile `(0, 0)` with `ptc` equal to their id; every edge uses the
/// single unbuffered switch, and the requested weights override the
/// derived ones.
pub(crate) fn graph_with_weights(
    types: &[NodeType],
    weights: &[u32],
    edges: &[(usize, usize)],
) -> RoutingGraph {
    let mut nodes: Vec<RrNode> = types
        .iter()
        .enumerate()
        .map(|(id, &node_type)| {
            let mut node = RrNode::new(node_type, id as u16);
            node.set_coordinates(0, 0, 0, 0);
            if node_type.is_pin() {
                node.set_side(Side::Top);
            }
            node
        })
        .collect();
    for &(from, to) in edges {
        nodes[from].push_out_edge(EdgeRef {
            node: to,
            switch: 0,
        });
    }
    let mut graph =
        RoutingGraph::new(nodes, vec![Switch::default()]).expect("test graph must assemble");
    for (id, &weight) in weights.iter().enumerate() {
        graph.set_node_weight(id, weight);
    }
    graph
}

/// `0 -> 1 -> 2 -> 3`, source weight zero, everything else weight one.
pub(crate) fn line_graph() -> RoutingGraph {
    graph_with_weights(
        &[
            NodeType::Source,
            NodeType::Chanx,
            NodeType::Chanx,
            NodeType::Sink,
        ],
        &[0, 1, 1, 1],
        &[(0, 1), (1, 2), (2, 3)],
    )
}

/// `0 -> {1, 2} -> 3` with configurable branch weights.
pub(crate) fn diamond_graph(weight_1: u32, weight_2: u32) -> RoutingGraph {
    graph_with_weights(
        &[
            NodeType::Source,
            NodeType::Chanx,
            NodeType::Chany,
            NodeType::Sink,
        ],
        &[0, weight_1, weight_2, 1],
        &[(0, 1), (0, 2), (1, 3), (2, 3)],
    )
}

/// `0 -> 1 -> 2 -> 1` cycle with the exit `1 -> 3`.
pub(crate) fn cycle_graph() -> RoutingGraph {
    graph_with_weights(
        &[
            NodeType::Source,
            NodeType::Chanx,
            NodeType::Chanx,
            NodeType::Sink,
        ],
        &[0, 1, 1, 1],
        &[(0, 1), (1, 2), (2, 1), (1, 3)],
    )
}

/// A 4x4 device: IO ring around a 2x2 logic core. Each core tile carries
/// a source/sink pair, one output pin (ptc 0), one input pin (ptc 1), and
/// one wire; wires connect to the wires of adjacent core tiles and feed
/// the local input pin. Wire-entry switches are buffered, pin hops are
/// free.
pub(crate) fn small_fabric() -> (RoutingGraph, Architecture) {
    const CORE: [(u16, u16); 4] = [(1, 1), (1, 2), (2, 1), (2, 2)];

    let switches = vec![
        // 0: unbuffered pin hop
        Switch::default(),
        // 1: buffered wire entry
        Switch {
            buffered: true,
            ..Switch::default()
        },
    ];

    let mut nodes = Vec::new();
    let mut wire_of_tile = Vec::new();
    let mut push_node = |node: RrNode| -> usize {
        nodes.push(node);
        nodes.len() - 1
    };

    // Per tile: SOURCE -> OPIN -> wire, wire -> IPIN -> SINK.
    let mut tile_nodes = Vec::new();
    for &(x, y) in &CORE {
        let mut source = RrNode::new(NodeType::Source, 0);
        source.set_coordinates(x, y, x, y);
        let source = push_node(source);

        let mut sink = RrNode::new(NodeType::Sink, 1);
        sink.set_coordinates(x, y, x, y);
        let sink = push_node(sink);

        let mut opin = RrNode::new(NodeType::Opin, 0);
        opin.set_coordinates(x, y, x, y);
        opin.set_side(Side::Right);
        let opin = push_node(opin);

        let mut ipin = RrNode::new(NodeType::Ipin, 1);
        ipin.set_coordinates(x, y, x, y);
        ipin.set_side(Side::Left);
        let ipin = push_node(ipin);

        let mut wire = RrNode::new(NodeType::Chanx, 0);
        wire.set_coordinates(x, y, x, y);
        let wire = push_node(wire);

        tile_nodes.push((source, sink, opin, ipin, wire));
        wire_of_tile.push(((x, y), wire));
    }

    for &(source, sink, opin, ipin, wire) in &tile_nodes {
        nodes[source].push_out_edge(EdgeRef {
            node: opin,
            switch: 0,
        });
        nodes[opin].push_out_edge(EdgeRef {
            node: wire,
            switch: 1,
        });
        nodes[wire].push_out_edge(EdgeRef {
            node: ipin,
            switch: 0,
        });
        nodes[ipin].push_out_edge(EdgeRef {
            node: sink,
            switch: 0,
        });
    }

    // Wires of adjacent core tiles connect both ways.
    for (index, &((x1, y1), wire_a)) in wire_of_tile.iter().enumerate() {
        for &((x2, y2), wire_b) in wire_of_tile.iter().skip(index + 1) {
            let dist = (i32::from(x1) - i32::from(x2)).abs() + (i32::from(y1) - i32::from(y2)).abs();
            if dist == 1 {
                nodes[wire_a].push_out_edge(EdgeRef {
                    node: wire_b,
                    switch: 1,
                });
                nodes[wire_b].push_out_edge(EdgeRef {
                    node: wire_a,
                    switch: 1,
                });
            }
        }
    }

    let mut graph = RoutingGraph::new(nodes, switches).expect("fabric graph must assemble");

    let mut logic = BlockType::new("clb".to_owned(), 0, 1, 1);
    logic.reserve_pins(2);
    logic
        .push_class(
            PinClass {
                pin_type: PinType::Driver,
                pins: vec![0],
            },
            &[],
        )
        .expect("driver class fits");
    logic
        .push_class(
            PinClass {
                pin_type: PinType::Receiver,
                pins: vec![1],
            },
            &[],
        )
        .expect("receiver class fits");

    let mut io = BlockType::new("io".to_owned(), 1, 1, 1);
    io.reserve_pins(1);
    io.push_class(
        PinClass {
            pin_type: PinType::Driver,
            pins: vec![0],
        },
        &[],
    )
    .expect("io class fits");

    let mut grid = vec![vec![GridTile::default(); 4]; 4];
    for (x, column) in grid.iter_mut().enumerate() {
        for (y, tile) in column.iter_mut().enumerate() {
            let core = (1..=2).contains(&x) && (1..=2).contains(&y);
            tile.type_index = usize::from(!core);
        }
    }

    let arch = Architecture::new(vec![logic, io], grid, ChannelWidths::default())
        .expect("fabric architecture must assemble");
    graph.build_lookup(&arch).expect("fabric lookup must verify");
    (graph, arch)
}
