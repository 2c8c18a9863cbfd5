//! Unit and end-to-end tests for the fabra CLI.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use rstest::rstest;
use tempfile::TempDir;

use super::{AnalyzeCommand, Cli, CliError, Command, ExecutionSummary, render_summary, run_cli};

const CORE_TILES: [(u16, u16); 4] = [(1, 1), (1, 2), (2, 1), (2, 2)];

/// Renders a 4x4 device with a 2x2 logic core as a VPR-style graph dump:
/// per core tile a source/sink pair, an output pin, an input pin, and one
/// wire; wires of adjacent core tiles interconnect.
fn fabric_xml() -> String {
    let mut nodes = String::new();
    let mut edges = String::new();
    for (tile, &(x, y)) in CORE_TILES.iter().enumerate() {
        let base = tile * 5;
        let _ = write!(
            nodes,
            r#"
    <node id="{source}" type="SOURCE"><loc xlow="{x}" ylow="{y}" xhigh="{x}" yhigh="{y}" ptc="0"/></node>
    <node id="{sink}" type="SINK"><loc xlow="{x}" ylow="{y}" xhigh="{x}" yhigh="{y}" ptc="1"/></node>
    <node id="{opin}" type="OPIN"><loc xlow="{x}" ylow="{y}" xhigh="{x}" yhigh="{y}" side="RIGHT" ptc="0"/></node>
    <node id="{ipin}" type="IPIN"><loc xlow="{x}" ylow="{y}" xhigh="{x}" yhigh="{y}" side="LEFT" ptc="1"/></node>
    <node id="{wire}" type="CHANX" direction="BI_DIR"><loc xlow="{x}" ylow="{y}" xhigh="{x}" yhigh="{y}" ptc="0"/></node>"#,
            source = base,
            sink = base + 1,
            opin = base + 2,
            ipin = base + 3,
            wire = base + 4,
        );
        let _ = write!(
            edges,
            r#"
    <edge src_node="{source}" sink_node="{opin}" switch_id="0"/>
    <edge src_node="{opin}" sink_node="{wire}" switch_id="1"/>
    <edge src_node="{wire}" sink_node="{ipin}" switch_id="0"/>
    <edge src_node="{ipin}" sink_node="{sink}" switch_id="0"/>"#,
            source = base,
            opin = base + 2,
            ipin = base + 3,
            sink = base + 1,
            wire = base + 4,
        );
    }
    for (a, &(x1, y1)) in CORE_TILES.iter().enumerate() {
        for (b, &(x2, y2)) in CORE_TILES.iter().enumerate().skip(a + 1) {
            let dist = (i32::from(x1) - i32::from(x2)).abs() + (i32::from(y1) - i32::from(y2)).abs();
            if dist == 1 {
                let wire_a = a * 5 + 4;
                let wire_b = b * 5 + 4;
                let _ = write!(
                    edges,
                    r#"
    <edge src_node="{wire_a}" sink_node="{wire_b}" switch_id="1"/>
    <edge src_node="{wire_b}" sink_node="{wire_a}" switch_id="1"/>"#,
                );
            }
        }
    }

    let mut grid = String::new();
    for x in 0..4u16 {
        for y in 0..4u16 {
            let core = (1..=2).contains(&x) && (1..=2).contains(&y);
            let _ = write!(
                grid,
                r#"
    <grid_loc x="{x}" y="{y}" block_type_id="{id}" width_offset="0" height_offset="0"/>"#,
                id = u16::from(!core),
            );
        }
    }

    format!(
        r#"<?xml version="1.0"?>
<rr_graph tool_name="vpr">
  <channels>
    <channel chan_width_max="1" x_min="1" y_min="1" x_max="1" y_max="1"/>
    <x_list index="0" info="1"/>
    <y_list index="0" info="1"/>
  </channels>
  <switches>
    <switch id="0" type="short" name="short0">
      <sizing mux_trans_size="0" buf_size="0"/>
    </switch>
    <switch id="1" type="mux" name="mux0">
      <timing R="0.5" Cin="1e-15" Cout="2e-15" Tdel="6e-11"/>
      <sizing mux_trans_size="2.0" buf_size="27.0"/>
    </switch>
  </switches>
  <block_types>
    <block_type id="0" name="io" width="1" height="1">
      <pin_class type="OUTPUT"><pin ptc="0">io.out[0]</pin></pin_class>
    </block_type>
    <block_type id="1" name="clb" width="1" height="1">
      <pin_class type="OUTPUT"><pin ptc="0">clb.o[0]</pin></pin_class>
      <pin_class type="INPUT"><pin ptc="1">clb.i[0]</pin></pin_class>
    </block_type>
  </block_types>
  <grid>{grid}
  </grid>
  <rr_nodes>{nodes}
  </rr_nodes>
  <rr_edges>{edges}
  </rr_edges>
</rr_graph>
"#
    )
}

const SIMPLE_XML: &str = r#"<?xml version="1.0"?>
<rr_graph>
  <switches>
    <switch id="0" type="buffer" name="buf">
      <sizing mux_trans_size="1" buf_size="4"/>
    </switch>
  </switches>
  <rr_nodes>
    <node id="0" type="SOURCE"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
    <node id="1" type="CHANX" direction="INC_DIR"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
    <node id="2" type="SINK"><loc xlow="0" ylow="0" xhigh="0" yhigh="0" ptc="0"/></node>
  </rr_nodes>
  <rr_edges>
    <edge src_node="0" sink_node="1" switch_id="0"/>
    <edge src_node="1" sink_node="2" switch_id="0"/>
  </rr_edges>
</rr_graph>
"#;

fn write_fixture(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("graph.xml");
    fs::write(&path, contents).expect("fixture must be writable");
    path
}

fn analyze_args(path: &std::path::Path, extra: &[&str]) -> Cli {
    let mut args = vec!["fabra", "analyze", path.to_str().expect("utf-8 path")];
    args.extend_from_slice(extra);
    Cli::try_parse_from(args).expect("arguments must parse")
}

#[test]
fn parses_analyze_arguments() {
    let cli = Cli::try_parse_from([
        "fabra",
        "analyze",
        "graph.xml",
        "--log-json",
        "--graph-mode",
        "vpr",
        "--max-connection-length",
        "4",
        "--threads",
        "8",
        "--routing-node-demand",
        "0.3",
        "--length-probabilities",
        "0.25,0.25,0.25,0.25",
    ])
    .expect("arguments must parse");
    assert!(cli.log_json);
    let Command::Analyze(command) = cli.command;
    assert_eq!(command.max_connection_length, 4);
    assert_eq!(command.threads, 8);
    assert_eq!(command.routing_node_demand, Some(0.3));
    assert_eq!(
        command.length_probabilities,
        Some(vec![0.25, 0.25, 0.25, 0.25])
    );
}

#[test]
fn analyzes_an_uncongested_fabric() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(&dir, &fabric_xml());
    let cli = analyze_args(
        &path,
        &[
            "--max-connection-length",
            "2",
            "--routing-node-demand",
            "0",
        ],
    );
    let summary = run_cli(cli).expect("analysis must run");
    assert!((summary.reliability - 1.0).abs() <= 1e-6);
    assert_eq!(summary.demand_multiplier, None);
}

#[test]
fn analyzes_a_simple_graph_end_to_end() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(&dir, SIMPLE_XML);
    let cli = analyze_args(&path, &["--graph-mode", "simple"]);
    let summary = run_cli(cli).expect("analysis must run");
    assert!((summary.reliability - 1.0).abs() <= 1e-6);
}

#[test]
fn simple_graph_honours_fixed_wire_demand() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(&dir, SIMPLE_XML);
    let cli = analyze_args(
        &path,
        &["--graph-mode", "simple", "--routing-node-demand", "0.5"],
    );
    let summary = run_cli(cli).expect("analysis must run");
    assert!((summary.reliability - 0.5).abs() <= 1e-6);
}

#[test]
fn rejects_zero_threads() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(&dir, SIMPLE_XML);
    let cli = analyze_args(&path, &["--graph-mode", "simple", "--threads", "0"]);
    let err = run_cli(cli).expect_err("zero threads must fail");
    assert!(matches!(err, CliError::InvalidThreads));
}

#[test]
fn missing_files_surface_a_parse_code() {
    let cli = analyze_args(std::path::Path::new("does-not-exist.xml"), &[]);
    let err = run_cli(cli).expect_err("missing file must fail");
    assert_eq!(err.code(), Some("PARSE_IO"));
}

#[rstest]
#[case(None, "reliability: 0.750000\n")]
#[case(Some(1.5), "reliability: 0.750000\ndemand multiplier: 1.500000\n")]
fn renders_the_summary(#[case] multiplier: Option<f64>, #[case] expected: &str) {
    let summary = ExecutionSummary {
        reliability: 0.75,
        demand_multiplier: multiplier,
    };
    let mut buffer = Vec::new();
    render_summary(&summary, &mut buffer).expect("rendering must succeed");
    assert_eq!(String::from_utf8(buffer).expect("utf-8"), expected);
}

#[test]
fn command_struct_is_reusable_programmatically() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_fixture(&dir, &fabric_xml());
    let command = AnalyzeCommand {
        path,
        graph_mode: super::GraphModeArg::Vpr,
        max_connection_length: 2,
        analyze_core: false,
        routing_node_demand: Some(0.0),
        threads: 2,
        target_reliability: None,
        self_congestion: super::CongestionArg::None,
        ipin_probability: 1.0,
        opin_probability: 1.0,
        demand_multiplier: 1.0,
        length_probabilities: None,
    };
    let summary = run_cli(Cli {
        log_json: false,
        command: Command::Analyze(command),
    })
    .expect("analysis must run");
    assert!((summary.reliability - 1.0).abs() <= 1e-6);
}
