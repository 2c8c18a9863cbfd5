//! Scenario and property tests for the analysis pipeline.

use std::num::NonZeroUsize;

use rayon::prelude::*;
use rstest::rstest;

use crate::{
    PROB_TOL,
    analysis::{AnalysisErrorCode, AnalysisSettings, analyze_connection, attach_virtual_source,
        run_analysis},
    graph::NodeType,
    options::{SelfCongestionMode, UserOptions},
    probs_equal,
    test_utils::{cycle_graph, diamond_graph, graph_with_weights, line_graph, small_fabric},
};

#[test]
fn line_graph_has_one_path_and_full_reachability() {
    let graph = line_graph();
    let result = analyze_connection(&graph, 0, 3, 3, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(probs_equal(result.num_paths, 1.0));
    assert!(probs_equal(result.reachability, 1.0));
}

#[test]
fn diamond_has_two_paths() {
    let graph = diamond_graph(1, 1);
    let result = analyze_connection(&graph, 0, 3, 2, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(probs_equal(result.num_paths, 2.0));
    assert!(probs_equal(result.reachability, 1.0));
}

#[test]
fn heavy_branch_of_weighted_diamond_is_illegal() {
    let graph = diamond_graph(1, 2);
    let result = analyze_connection(&graph, 0, 3, 2, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(probs_equal(result.num_paths, 1.0));
}

#[test]
fn congested_diamond_combines_branches_independently() {
    let graph = diamond_graph(1, 1);
    let demands = [0.0, 0.5, 0.5, 0.0];
    let result = analyze_connection(&graph, 0, 3, 2, &demands, SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(
        probs_equal(result.reachability, 0.75),
        "expected 0.75, got {}",
        result.reachability
    );
}

#[test]
fn cycle_terminates_with_one_path() {
    let graph = cycle_graph();
    let result = analyze_connection(&graph, 0, 3, 2, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(probs_equal(result.num_paths, 1.0));
}

#[test]
fn legal_cycle_is_broken_and_both_exits_counted() {
    // 1 <-> 2 is a cycle whose members stay legal under the cap; the
    // waiting set must commit to one of them and still count both routes
    // to the sink.
    let graph = graph_with_weights(
        &[
            NodeType::Source,
            NodeType::Chanx,
            NodeType::Chanx,
            NodeType::Sink,
        ],
        &[0, 1, 1, 1],
        &[(0, 1), (1, 2), (2, 1), (1, 3), (2, 3)],
    );
    let result = analyze_connection(&graph, 0, 3, 3, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(probs_equal(result.num_paths, 2.0));
}

#[test]
fn swapping_endpoints_preserves_path_counts() {
    let forward = diamond_graph(1, 1);
    let result_forward = analyze_connection(&forward, 0, 3, 2, &[], SelfCongestionMode::None)
        .expect("analysis must run");

    // The same fabric with every edge reversed and the endpoints swapped.
    let backward = graph_with_weights(
        &[
            NodeType::Sink,
            NodeType::Chanx,
            NodeType::Chany,
            NodeType::Source,
        ],
        &[1, 1, 1, 0],
        &[(3, 1), (3, 2), (1, 0), (2, 0)],
    );
    let result_backward = analyze_connection(&backward, 3, 0, 2, &[], SelfCongestionMode::None)
        .expect("analysis must run");

    assert!(probs_equal(result_forward.num_paths, result_backward.num_paths));
    assert!(probs_equal(
        result_forward.reachability,
        result_backward.reachability
    ));
}

#[test]
fn repeated_jobs_are_bit_identical() {
    let graph = diamond_graph(1, 1);
    let demands = [0.0, 0.25, 0.125, 0.0];
    let first = analyze_connection(&graph, 0, 3, 2, &demands, SelfCongestionMode::None)
        .expect("analysis must run");
    let second = analyze_connection(&graph, 0, 3, 2, &demands, SelfCongestionMode::None)
        .expect("analysis must run");
    assert_eq!(first.num_paths.to_bits(), second.num_paths.to_bits());
    assert_eq!(first.reachability.to_bits(), second.reachability.to_bits());
}

#[test]
fn path_dependence_discounts_own_contribution() {
    // The preset demands equal exactly what this connection deposits on
    // the diamond branches, so discounting restores full reachability.
    let graph = diamond_graph(1, 1);
    let demands = [0.0, 0.5, 0.5, 0.0];
    let result = analyze_connection(
        &graph,
        0,
        3,
        2,
        &demands,
        SelfCongestionMode::PathDependence,
    )
    .expect("analysis must run");
    assert!(
        probs_equal(result.reachability, 1.0),
        "expected the discount to cancel the demand, got {}",
        result.reachability
    );
}

#[test]
fn unreachable_endpoints_yield_zero() {
    let graph = graph_with_weights(
        &[NodeType::Source, NodeType::Sink],
        &[0, 1],
        &[],
    );
    let result = analyze_connection(&graph, 0, 1, 4, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(probs_equal(result.num_paths, 0.0));
    assert!(probs_equal(result.reachability, 0.0));
}

#[test]
fn endpoints_outside_the_graph_are_rejected() {
    let graph = line_graph();
    let err = analyze_connection(&graph, 0, 17, 3, &[], SelfCongestionMode::None)
        .expect_err("node 17 does not exist");
    assert_eq!(err.code(), AnalysisErrorCode::UnknownNode);
}

fn fabric_options() -> UserOptions {
    UserOptions::builder("fabric.xml")
        .with_max_connection_length(2)
        .build()
        .expect("options are valid")
}

#[test]
fn settings_renormalize_length_probabilities() {
    let (_, mut arch) = small_fabric();
    let options = UserOptions::builder("fabric.xml")
        .with_max_connection_length(3)
        .with_length_probabilities(vec![0.3, 0.2, 0.5])
        .build()
        .expect("options are valid");
    let settings =
        AnalysisSettings::from_options(&options, &mut arch).expect("settings must derive");

    // Core tiles are at most two apart, so length three is dropped and the
    // remainder rescales to one.
    let lengths = settings.length_probabilities();
    assert!(probs_equal(lengths[0], 0.6));
    assert!(probs_equal(lengths[1], 0.4));
    assert!(probs_equal(lengths[2], 0.0));
    let sum: f64 = lengths.iter().sum();
    assert!((sum - 1.0).abs() <= PROB_TOL);
}

#[test]
fn settings_expose_the_core_tiles() {
    let (_, mut arch) = small_fabric();
    let options = fabric_options();
    let settings =
        AnalysisSettings::from_options(&options, &mut arch).expect("settings must derive");
    let mut tiles = settings.test_tile_coords().to_vec();
    tiles.sort_unstable();
    assert_eq!(tiles, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
}

#[test]
fn analyze_core_margins_can_exclude_everything() {
    let (_, mut arch) = small_fabric();
    let options = UserOptions::builder("fabric.xml")
        .with_max_connection_length(3)
        .with_analyze_core(true)
        .build()
        .expect("options are valid");
    let err = AnalysisSettings::from_options(&options, &mut arch)
        .expect_err("a three-tile margin leaves no core on a 4x4 grid");
    assert_eq!(err.code(), AnalysisErrorCode::NoTestTiles);
}

#[rstest]
#[case(1)]
#[case(8)]
fn uncongested_fabric_is_fully_reliable(#[case] threads: usize) {
    let (graph, mut arch) = small_fabric();
    let options = UserOptions::builder("fabric.xml")
        .with_max_connection_length(2)
        .with_routing_node_demand(0.0)
        .with_num_threads(NonZeroUsize::new(threads).expect("non-zero"))
        .build()
        .expect("options are valid");
    let settings =
        AnalysisSettings::from_options(&options, &mut arch).expect("settings must derive");
    let outcome = run_analysis(&graph, &settings, &options).expect("analysis must run");
    assert!(
        probs_equal(outcome.reliability, 1.0),
        "expected full reliability, got {}",
        outcome.reliability
    );
    assert_eq!(outcome.demand_multiplier, None);
}

#[test]
fn fixed_wire_demand_lowers_reliability_deterministically() {
    let (graph, mut arch) = small_fabric();
    let build = |threads: usize| {
        UserOptions::builder("fabric.xml")
            .with_max_connection_length(2)
            .with_routing_node_demand(0.25)
            .with_num_threads(NonZeroUsize::new(threads).expect("non-zero"))
            .build()
            .expect("options are valid")
    };
    let options = build(1);
    let settings =
        AnalysisSettings::from_options(&options, &mut arch).expect("settings must derive");
    let serial = run_analysis(&graph, &settings, &options).expect("analysis must run");
    let parallel =
        run_analysis(&graph, &settings, &build(8)).expect("analysis must run");

    assert!(serial.reliability > 0.0 && serial.reliability < 1.0);
    assert!(
        probs_equal(serial.reliability, parallel.reliability),
        "fixed-demand runs must not depend on scheduling ({} vs {})",
        serial.reliability,
        parallel.reliability
    );
}

#[test]
fn parallel_identical_jobs_match_the_single_job_result() {
    let graph = diamond_graph(1, 1);
    let single = analyze_connection(&graph, 0, 3, 2, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    let total: f64 = (0..100)
        .into_par_iter()
        .map(|_| {
            analyze_connection(&graph, 0, 3, 2, &[], SelfCongestionMode::None)
                .map(|r| r.reachability)
                .unwrap_or(f64::NAN)
        })
        .sum();
    assert!(
        probs_equal(total, single.reachability * 100.0),
        "aggregate {total} diverges from 100x the single job"
    );
}

#[test]
fn multiplier_search_hits_the_target() {
    let (graph, mut arch) = small_fabric();
    let options = UserOptions::builder("fabric.xml")
        .with_max_connection_length(2)
        .with_target_reliability(0.9)
        .build()
        .expect("options are valid");
    let settings =
        AnalysisSettings::from_options(&options, &mut arch).expect("settings must derive");
    let outcome = run_analysis(&graph, &settings, &options).expect("analysis must run");
    let multiplier = outcome.demand_multiplier.expect("search must report a multiplier");
    assert!(multiplier > 0.0);
    assert!(
        (outcome.reliability - 0.9).abs() <= 1e-3,
        "reliability {} missed the target",
        outcome.reliability
    );
}

#[test]
fn virtual_source_feeds_upstream_wires() {
    // wire -> wire -> pin -> sink; the shim walks backward from the pin.
    let mut graph = graph_with_weights(
        &[
            NodeType::Chanx,
            NodeType::Chanx,
            NodeType::Ipin,
            NodeType::Sink,
        ],
        &[1, 1, 0, 1],
        &[(0, 1), (1, 2), (2, 3)],
    );
    let options = fabric_options();
    let shim = attach_virtual_source(&mut graph, &options, 2, 2).expect("shim must attach");

    let mut fed: Vec<usize> = shim.feeds.iter().map(|&(node, _)| node).collect();
    fed.sort_unstable();
    assert_eq!(fed, vec![0, 1]);
    assert!(shim.feeds.iter().all(|&(_, p)| probs_equal(p, 1.0)));
    assert!(
        graph
            .node(shim.node)
            .is_some_and(crate::graph::RrNode::is_virtual_source)
    );

    // Enumerating from the synthetic source sees both feed-in routes.
    let result = analyze_connection(&graph, shim.node, 3, 3, &[], SelfCongestionMode::None)
        .expect("analysis must run");
    assert!(probs_equal(result.num_paths, 2.0));
}

#[test]
fn hop_buckets_count_paths_by_depth() {
    use super::{
        distances::{PassDirection, flood_distances},
        enumerate::PathCountRule,
        scratch::JobScratch,
        topo::{JobContext, traverse},
    };
    use crate::options::BucketMode;

    let graph = diamond_graph(1, 1);
    let mut scratch = JobScratch::new(graph.num_nodes());
    let ctx = JobContext {
        graph: &graph,
        source: 0,
        sink: 3,
        max_path_weight: 2,
        bucket_mode: BucketMode::ByPathHops,
    };
    flood_distances(&graph, 0, PassDirection::FromSource, 2, &mut scratch);
    flood_distances(&graph, 3, PassDirection::FromSink, 2, &mut scratch);
    let mut rule = PathCountRule::new(PassDirection::FromSource, false);
    traverse(&ctx, PassDirection::FromSource, &mut scratch, &mut rule);

    // Both routes reach the sink in exactly two hops.
    assert!(probs_equal(scratch.buckets(3).source_at(2), 2.0));
}

#[test]
fn virtual_source_rejects_non_pins() {
    let mut graph = line_graph();
    let options = fabric_options();
    let err = attach_virtual_source(&mut graph, &options, 1, 2)
        .expect_err("wires cannot host virtual sources");
    assert_eq!(err.code(), AnalysisErrorCode::NotAnInputPin);
}
