use super::*;

use crate::internal::*;
use crate::SequenceGraph;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::thread;

//-----------------------------------------------------------------------------

fn try_build(description: &SequenceGraph) -> Result<GrootGraph> {
    GrootGraph::new(description, &BuildParams::default())
}

fn check_construction_error(description: &SequenceGraph, test_case: &str) {
    let result = try_build(description);
    assert!(
        matches!(result, Err(GraphError::GraphConstruction(_))),
        "Expected a construction error for {}, got {:?}", test_case, result
    );
}

// Two variants of a short sequence.
fn two_variants() -> SequenceGraph {
    let mut description = SequenceGraph::new();
    description.add_segment(1, b"GATT");
    description.add_segment(2, b"A");
    description.add_segment(3, b"C");
    description.add_segment(4, b"CAT");
    description.add_link(1, 2, 0);
    description.add_link(1, 3, 0);
    description.add_link(2, 4, 0);
    description.add_link(3, 4, 0);
    description.add_path(b"first", &[1, 2, 4]);
    description.add_path(b"second", &[1, 3, 4]);
    description
}

fn random_sequence(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

//-----------------------------------------------------------------------------

#[test]
fn bla_b10_round_trip() {
    let graph = build_test_graph();
    assert_eq!(graph.node_count(), 9, "Wrong number of nodes");
    assert_eq!(graph.edge_count(), 11, "Wrong number of edges");
    assert_eq!(graph.path_count(), 3, "Wrong number of paths");

    let sequence = graph.graph2seq(BLA_B10_PATH);
    assert!(sequence.is_ok(), "Failed to resolve the reference path: {}", sequence.unwrap_err());
    let sequence = sequence.unwrap();
    assert_eq!(sequence.len(), 747, "Wrong reference length");
    assert!(sequence == BLA_B10, "The reference path does not match blaB-10");

    for path_id in [BLA_B10_SNP_PATH, BLA_B10_DEL_PATH] {
        let sequence = graph.graph2seq(path_id).unwrap();
        assert!(sequence == bla_b10_variant(path_id), "Wrong sequence for path {}", path_id);
    }
}

#[test]
fn path_registry() {
    let graph = build_test_graph();
    let names = [BLA_B10_NAME, BLA_B10_SNP_NAME, BLA_B10_DEL_NAME];
    for (path_id, name) in names.iter().enumerate() {
        assert_eq!(graph.path_name(path_id), Some(*name), "Wrong name for path {}", path_id);
        assert_eq!(graph.find_path(name), Some(path_id), "Wrong identifier for path {}", String::from_utf8_lossy(name));
    }
    assert_eq!(graph.path_name(names.len()), None, "Found a name for a missing path");
    assert_eq!(graph.find_path(b"missing"), None, "Found a missing path by name");
    assert_eq!(graph.primary_path_name(), Some(BLA_B10_NAME), "Wrong primary path");
}

#[test]
fn ranks_respect_edges() {
    let graph = build_test_graph();
    for (rank, node) in graph.sorted_nodes().iter().enumerate() {
        assert_eq!(node.rank(), rank, "Wrong rank stored in node {}", node.id());
        // The input lists nodes out of order, but identifiers follow the topological order.
        assert_eq!(node.id(), rank + 1, "Wrong node at rank {}", rank);
        for edge in node.edges() {
            let successor = graph.node(edge.to);
            assert!(successor.is_some(), "Missing successor {} for node {}", edge.to, node.id());
            assert!(successor.unwrap().rank() > rank, "Edge {} -> {} goes backward", node.id(), edge.to);
        }
    }
}

#[test]
fn smallest_identifier_first() {
    let mut description = SequenceGraph::new();
    description.add_segment(7, b"A");
    description.add_segment(3, b"C");
    description.add_segment(5, b"G");
    description.add_link(7, 5, 0);
    description.add_path(b"a", &[7, 5]);
    description.add_path(b"b", &[3]);
    let graph = try_build(&description).unwrap();
    let order: Vec<usize> = graph.sorted_nodes().iter().map(|node| node.id()).collect();
    assert_eq!(order, vec![3, 7, 5], "Wrong topological order");
}

#[test]
fn node_paths() {
    let graph = build_test_graph();
    let node = graph.node(1).unwrap();
    assert_eq!(node.paths(), &[0, 1, 2], "Wrong paths for the shared node");
    let node = graph.node(3).unwrap();
    assert_eq!(node.paths(), &[BLA_B10_SNP_PATH], "Wrong paths for the SNP node");
    assert!(node.contains_path(BLA_B10_SNP_PATH), "The SNP node does not contain the SNP path");
    assert!(!node.contains_path(BLA_B10_PATH), "The SNP node contains the reference path");

    let walk = graph.path_walk(BLA_B10_DEL_PATH).unwrap();
    let ids: Vec<usize> = walk.iter().map(|rank| graph.sorted_nodes()[*rank].id()).collect();
    assert_eq!(ids, vec![1, 2, 4, 6, 7, 9], "Wrong walk for the deletion path");
}

#[test]
fn path_lengths() {
    let graph = build_test_graph();
    for path_id in graph.paths().keys() {
        let length = graph.path_length(*path_id).unwrap();
        let sequence = graph.graph2seq(*path_id).unwrap();
        assert_eq!(length, sequence.len(), "Wrong length for path {}", path_id);
    }
    assert_eq!(graph.path_length(BLA_B10_DEL_PATH).unwrap(), 744, "Wrong length for the deletion path");
}

#[test]
fn unknown_path() {
    let graph = build_test_graph();
    let path_id = graph.path_count();
    assert!(matches!(graph.graph2seq(path_id), Err(GraphError::UnknownPath { path_id: x }) if x == path_id), "Resolved a missing path");
    assert!(matches!(graph.path_walk(path_id), Err(GraphError::UnknownPath { .. })), "Found a walk for a missing path");
    assert!(matches!(graph.path_length(path_id), Err(GraphError::UnknownPath { .. })), "Found a length for a missing path");
}

//-----------------------------------------------------------------------------

#[test]
fn overlapping_nodes() {
    let mut description = SequenceGraph::new();
    description.add_segment(1, b"GATTA");
    description.add_segment(2, b"TACA");
    description.add_segment(3, b"TAGG");
    description.add_link(1, 2, 2);
    description.add_link(1, 3, 2);
    description.add_path(b"a", &[1, 2]);
    description.add_path(b"b", &[1, 3]);
    let graph = try_build(&description).unwrap();

    assert_eq!(graph.graph2seq(0).unwrap(), b"GATTACA", "Wrong sequence with an overlap");
    assert_eq!(graph.graph2seq(1).unwrap(), b"GATTAGG", "Wrong sequence with an overlap");
    assert_eq!(graph.node(1).unwrap().edge_to(2), Some(Edge { to: 2, overlap: 2 }), "Wrong edge");
    assert_eq!(graph.node(2).unwrap().edge_to(1), None, "Found a reverse edge");

    let segments = graph.path_segments(0).unwrap();
    let truth = vec![
        PathSegment { rank: 0, path_offset: 0, node_offset: 0 },
        PathSegment { rank: 1, path_offset: 5, node_offset: 2 },
    ];
    assert_eq!(segments, truth, "Wrong path segments");
    assert_eq!(graph.path_length(0).unwrap(), 7, "Wrong path length");
}

#[test]
fn implied_edges() {
    let mut description = two_variants();
    description.add_segment(5, b"G");
    // No link from 4 to 5.
    description.add_path(b"third", &[1, 2, 4, 5]);
    let graph = try_build(&description).unwrap();
    assert_eq!(graph.edge_count(), 5, "The edge implied by a path was not added");
    assert_eq!(graph.graph2seq(2).unwrap(), b"GATTACATG", "Wrong sequence for the path with an implied edge");
}

#[test]
fn random_linear_graphs() {
    let mut rng = StdRng::seed_from_u64(0x6772_6f6f_74);
    for _ in 0..20 {
        let len = rng.gen_range(1..500);
        let sequence = random_sequence(&mut rng, len);

        let mut description = SequenceGraph::new();
        let mut start = 0;
        let mut walk: Vec<usize> = Vec::new();
        while start < sequence.len() {
            let end = (start + rng.gen_range(1..50)).min(sequence.len());
            let id = walk.len() + 1;
            description.add_segment(id, &sequence[start..end]);
            if let Some(prev) = walk.last() {
                description.add_link(*prev, id, 0);
            }
            walk.push(id);
            start = end;
        }
        description.add_path(b"random", &walk);

        let graph = try_build(&description).unwrap();
        assert_eq!(graph.node_count(), walk.len(), "Wrong number of nodes");
        assert_eq!(graph.graph2seq(0).unwrap(), sequence, "Wrong sequence for a random linear graph");
    }
}

//-----------------------------------------------------------------------------

#[test]
fn invalid_descriptions() {
    check_construction_error(&SequenceGraph::new(), "an empty description");

    let mut description = SequenceGraph::new();
    description.add_segment(1, b"ACGT");
    check_construction_error(&description, "a graph without paths");

    let mut description = two_variants();
    description.add_link(4, 1, 0);
    check_construction_error(&description, "a cycle");

    let mut description = two_variants();
    description.add_link(4, 4, 0);
    check_construction_error(&description, "a self-loop");

    let mut description = two_variants();
    description.add_link(4, 5, 0);
    check_construction_error(&description, "a link to a missing node");

    let mut description = two_variants();
    description.add_path(b"third", &[1, 5]);
    check_construction_error(&description, "a path over a missing node");

    let mut description = two_variants();
    description.add_segment(2, b"G");
    check_construction_error(&description, "a duplicate node");

    let mut description = two_variants();
    description.add_segment(5, b"");
    check_construction_error(&description, "an empty sequence");

    let mut description = two_variants();
    description.add_path(b"first", &[1, 3, 4]);
    check_construction_error(&description, "a duplicate path name");

    let mut description = two_variants();
    description.add_path(b"third", &[]);
    check_construction_error(&description, "an empty path");

    let mut description = two_variants();
    description.add_link(1, 2, 1);
    check_construction_error(&description, "conflicting overlaps");

    let mut description = two_variants();
    description.add_link(2, 3, 2);
    check_construction_error(&description, "an overlap longer than the node");
}

#[test]
fn invalid_length_multiplier() {
    let description = two_variants();
    for length_multiplier in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let result = GrootGraph::new(&description, &BuildParams { length_multiplier });
        assert!(
            matches!(result, Err(GraphError::GraphConstruction(_))),
            "Accepted length multiplier {}", length_multiplier
        );
    }
    let graph = GrootGraph::new(&description, &BuildParams { length_multiplier: 1.5 }).unwrap();
    assert_eq!(graph.length_multiplier(), 1.5, "Wrong length multiplier");
}

//-----------------------------------------------------------------------------

#[test]
fn read_counts() {
    let graph = build_test_graph();
    assert!(!graph.has_reads(), "A new graph has reads");
    let node = graph.node(4).unwrap();
    assert_eq!(node.increment_read_count(), 1, "Wrong count after the first increment");
    assert_eq!(node.increment_read_count(), 2, "Wrong count after the second increment");
    assert!(graph.has_reads(), "The graph has no reads after increments");
    assert_eq!(graph.total_reads(), 2, "Wrong total reads");

    let copy = graph.clone();
    assert_eq!(copy, graph, "A copy is not equal to the original");
    node.increment_read_count();
    assert_ne!(copy, graph, "Graphs with different counts are equal");

    graph.clear_read_counts();
    assert_eq!(graph.total_reads(), 0, "Counts were not cleared");
    assert_eq!(copy.total_reads(), 2, "Clearing the original changed the copy");
}

#[test]
fn read_counts_from_description() {
    let mut description = two_variants();
    description.add_segment_with_reads(5, b"G", 12);
    description.add_path(b"third", &[5]);
    let graph = try_build(&description).unwrap();
    assert_eq!(graph.node(5).unwrap().read_count(), 12, "Read count was not restored");
}

#[test]
fn concurrent_increments() {
    let graph = build_test_graph();
    let threads = 4;
    let mut rng = StdRng::seed_from_u64(0x636f_756e_74);
    let plans: Vec<Vec<usize>> = (0..threads).map(|_| {
        (0..1000).map(|_| rng.gen_range(1..=graph.node_count())).collect()
    }).collect();

    thread::scope(|scope| {
        for plan in plans.iter() {
            let graph = &graph;
            scope.spawn(move || {
                for node_id in plan.iter() {
                    graph.node(*node_id).unwrap().increment_read_count();
                }
            });
        }
    });

    for node in graph.sorted_nodes() {
        let expected: usize = plans.iter().map(|plan| plan.iter().filter(|id| **id == node.id()).count()).sum();
        assert_eq!(node.read_count(), expected, "Wrong read count for node {}", node.id());
    }
    assert_eq!(graph.total_reads(), threads * 1000, "Wrong total reads");
}

//-----------------------------------------------------------------------------
