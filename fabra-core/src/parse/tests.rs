//! Unit tests for routing graph file loading.

use std::{fs, path::PathBuf};

use rstest::rstest;
use tempfile::TempDir;

use crate::{
    graph::{Direction, NodeType, RrNode, Side},
    options::GraphMode,
    parse::{ParseErrorCode, parse_rr_graph_file},
};

const VPR_GRAPH: &str = r#"<?xml version="1.0"?>
<rr_graph tool_name="vpr" tool_version="test">
  <channels>
    <channel chan_width_max="2" x_min="1" y_min="1" x_max="2" y_max="2"/>
    <x_list index="0" info="1"/>
    <x_list index="1" info="2"/>
    <y_list index="0" info="1"/>
    <y_list index="1" info="2"/>
  </channels>
  <switches>
    <switch id="0" type="mux" name="mux0">
      <timing R="0.5" Cin="1e-15" Cout="2e-15" Tdel="6e-11"/>
      <sizing mux_trans_size="2.0" buf_size="27.0"/>
    </switch>
    <switch id="1" type="short" name="short0">
      <sizing mux_trans_size="0" buf_size="0"/>
    </switch>
  </switches>
  <block_types>
    <block_type id="0" name="io" width="1" height="1">
      <pin_class type="OUTPUT">
        <pin ptc="0">io.out[0]</pin>
      </pin_class>
    </block_type>
    <block_type id="1" name="clb" width="1" height="1">
      <pin_class type="OUTPUT">
        <pin ptc="0">clb.o[0]</pin>
      </pin_class>
      <pin_class type="INPUT">
        <pin ptc="1">clb.i[0]</pin>
      </pin_class>
    </block_type>
  </block_types>
  <grid>
    <grid_loc x="0" y="0" block_type_id="0" width_offset="0" height_offset="0"/>
    <grid_loc x="0" y="1" block_type_id="0" width_offset="0" height_offset="0"/>
    <grid_loc x="0" y="2" block_type_id="0" width_offset="0" height_offset="0"/>
    <grid_loc x="1" y="0" block_type_id="0" width_offset="0" height_offset="0"/>
    <grid_loc x="1" y="1" block_type_id="1" width_offset="0" height_offset="0"/>
    <grid_loc x="1" y="2" block_type_id="0" width_offset="0" height_offset="0"/>
    <grid_loc x="2" y="0" block_type_id="0" width_offset="0" height_offset="0"/>
    <grid_loc x="2" y="1" block_type_id="0" width_offset="0" height_offset="0"/>
    <grid_loc x="2" y="2" block_type_id="0" width_offset="0" height_offset="0"/>
  </grid>
  <rr_nodes>
    <node id="0" type="SOURCE" capacity="1">
      <loc xlow="1" ylow="1" xhigh="1" yhigh="1" ptc="0"/>
    </node>
    <node id="1" type="OPIN">
      <loc xlow="1" ylow="1" xhigh="1" yhigh="1" side="RIGHT" ptc="0"/>
    </node>
    <node id="2" type="CHANX" direction="INC_DIR">
      <loc xlow="1" ylow="1" xhigh="1" yhigh="1" ptc="0"/>
      <timing R="1" C="2e-14"/>
    </node>
    <node id="3" type="IPIN">
      <loc xlow="1" ylow="1" xhigh="1" yhigh="1" side="LEFT" ptc="1"/>
    </node>
    <node id="4" type="SINK">
      <loc xlow="1" ylow="1" xhigh="1" yhigh="1" ptc="1"/>
    </node>
  </rr_nodes>
  <rr_edges>
    <edge src_node="0" sink_node="1" switch_id="1"/>
    <edge src_node="1" sink_node="2" switch_id="0"/>
    <edge src_node="2" sink_node="3" switch_id="1"/>
    <edge src_node="3" sink_node="4" switch_id="1"/>
  </rr_edges>
</rr_graph>
"#;

const SIMPLE_GRAPH: &str = r#"<?xml version="1.0"?>
<rr_graph>
  <switches>
    <switch id="0" type="buffer" name="buf">
      <sizing mux_trans_size="1" buf_size="4"/>
    </switch>
  </switches>
  <rr_nodes>
    <node id="0" type="SOURCE">
      <loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/>
    </node>
    <node id="1" type="SINK">
      <loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/>
    </node>
  </rr_nodes>
  <rr_edges>
    <edge src_node="0" sink_node="1" switch_id="0"/>
  </rr_edges>
</rr_graph>
"#;

fn write_graph(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("graph.xml");
    fs::write(&path, contents).expect("fixture must be writable");
    path
}

#[test]
fn parses_a_vpr_graph() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_graph(&dir, VPR_GRAPH);

    let parsed = parse_rr_graph_file(&path, GraphMode::Vpr).expect("graph must parse");
    let graph = parsed.graph;
    let arch = parsed.architecture.expect("vpr mode carries an architecture");

    assert_eq!(graph.num_nodes(), 5);
    assert_eq!(graph.num_switches(), 2);
    assert!(graph.switch(0).is_some_and(|s| s.buffered));
    assert!(graph.switch(1).is_some_and(|s| !s.buffered));

    // Only the wire is fed by a buffered switch.
    let weights: Vec<u32> = graph.nodes().iter().map(RrNode::weight).collect();
    assert_eq!(weights, vec![0, 0, 1, 0, 0]);

    let wire = graph.node(2).expect("wire exists");
    assert_eq!(wire.node_type(), NodeType::Chanx);
    assert_eq!(wire.direction(), Direction::Inc);
    assert!((wire.resistance() - 1.0).abs() < f32::EPSILON);

    assert_eq!(
        graph.node_index(NodeType::Opin, 1, 1, 0, Some(Side::Right)),
        Some(1)
    );
    assert_eq!(graph.node_index(NodeType::Sink, 1, 1, 1, None), Some(4));

    assert_eq!(arch.grid_size(), (3, 3));
    assert_eq!(arch.fill_type().map(|b| b.name()), Some("clb"));
    assert_eq!(arch.perimeter_type().map(|b| b.name()), Some("io"));
    assert_eq!(arch.channel_widths().max, 2);
    assert_eq!(arch.channel_widths().x_list, vec![1, 2]);
}

#[test]
fn parses_a_simple_graph_without_architecture() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_graph(&dir, SIMPLE_GRAPH);

    let parsed = parse_rr_graph_file(&path, GraphMode::Simple).expect("graph must parse");
    assert!(parsed.architecture.is_none());
    assert_eq!(parsed.graph.num_nodes(), 2);
    // The sink is fed through a buffered switch.
    assert_eq!(parsed.graph.node(1).map(RrNode::weight), Some(1));
}

#[test]
fn rejects_files_without_xml_extension() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("graph.txt");
    fs::write(&path, SIMPLE_GRAPH).expect("fixture must be writable");
    let err = parse_rr_graph_file(&path, GraphMode::Simple).expect_err("extension must reject");
    assert_eq!(err.code(), ParseErrorCode::NotXml);
}

#[rstest]
#[case(
    r#"<rr_graph><rr_nodes><node type="SOURCE"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node></rr_nodes></rr_graph>"#,
    ParseErrorCode::MissingAttribute
)]
#[case(
    r#"<rr_graph><rr_nodes><node id="0" type="WIRE"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node></rr_nodes></rr_graph>"#,
    ParseErrorCode::InvalidAttribute
)]
#[case(
    r#"<rr_graph><rr_nodes>
        <node id="0" type="SOURCE"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
        <node id="0" type="SINK"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
      </rr_nodes></rr_graph>"#,
    ParseErrorCode::DuplicateNode
)]
#[case(
    r#"<rr_graph><rr_nodes>
        <node id="0" type="SOURCE"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
        <node id="2" type="SINK"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
      </rr_nodes></rr_graph>"#,
    ParseErrorCode::MissingNode
)]
#[case(
    r#"<rr_graph>
      <rr_nodes>
        <node id="0" type="SOURCE"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
      </rr_nodes>
      <rr_edges><edge src_node="0" sink_node="7" switch_id="0"/></rr_edges>
    </rr_graph>"#,
    ParseErrorCode::UnknownNodeId
)]
#[case(
    r#"<rr_graph><rr_nodes><node id="0" type="IPIN"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node></rr_nodes></rr_graph>"#,
    ParseErrorCode::MissingAttribute
)]
fn rejects_malformed_documents(#[case] contents: &str, #[case] expected: ParseErrorCode) {
    let dir = TempDir::new().expect("tempdir");
    let path = write_graph(&dir, contents);
    let err = parse_rr_graph_file(&path, GraphMode::Simple).expect_err("document must reject");
    assert_eq!(err.code(), expected);
}

#[test]
fn vpr_mode_requires_the_device_sections() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_graph(&dir, SIMPLE_GRAPH);
    let err = parse_rr_graph_file(&path, GraphMode::Vpr).expect_err("device sections required");
    assert_eq!(err.code(), ParseErrorCode::MissingElement);
}
