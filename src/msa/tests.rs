use super::*;

use crate::internal::*;
use crate::{BuildParams, GrootGraph, GraphDescription};

use flate2::write::GzEncoder;
use flate2::Compression;
use simple_sds::serialize;

use std::fs::{self, File};
use std::io::Write;

//-----------------------------------------------------------------------------

const NAMES: [&str; 5] = ["blaOXA-1~~~ref", "blaOXA-1~~~snp", "blaOXA-1~~~del", "blaOXA-1~~~trunc", "blaOXA-1~~~copy"];

fn check_parse_error(fasta: &[u8], line: usize, test_case: &str) {
    let result = read_msa(&mut &fasta[..]);
    match &result {
        Err(GraphError::Parse { line: error_line, .. }) => {
            assert_eq!(*error_line, line, "Wrong line number for {}", test_case);
        },
        _ => panic!("Expected a parse error for {}, got {:?}", test_case, result),
    }
}

//-----------------------------------------------------------------------------

#[test]
fn load_test_alignment() {
    let alignment = load_test_msa();
    assert_eq!(alignment.len(), NAMES.len(), "Wrong number of rows");
    assert_eq!(alignment.columns(), 180, "Wrong number of columns");
    for (row, name) in NAMES.iter().enumerate() {
        assert_eq!(alignment.name(row), Some(name.as_bytes()), "Wrong name for row {}", row);
        assert_eq!(alignment.row(row).map(|row| row.len()), Some(180), "Wrong length for row {}", row);
    }
    assert_eq!(alignment.name(NAMES.len()), None, "Found a name for a missing row");

    // Gaps are removed from the ungapped sequences.
    let lengths: Vec<usize> = (0..alignment.len()).map(|row| alignment.ungapped(row).unwrap().len()).collect();
    assert_eq!(lengths, vec![180, 180, 174, 158, 180], "Wrong ungapped lengths");
    assert_eq!(alignment.ungapped(0), alignment.ungapped(4), "The copy differs from the reference");
}

#[test]
fn rows_as_paths() {
    let alignment = load_test_msa();
    let description = alignment.to_graph().unwrap();
    assert_eq!(description.paths().count(), alignment.len(), "Wrong number of paths");
    let graph = GrootGraph::new(&description, &BuildParams::default()).unwrap();

    for row in 0..alignment.len() {
        assert_eq!(graph.path_name(row), alignment.name(row), "Wrong name for path {}", row);
        let sequence = graph.graph2seq(row);
        assert!(sequence.is_ok(), "Failed to resolve path {}: {}", row, sequence.unwrap_err());
        assert_eq!(Some(sequence.unwrap()), alignment.ungapped(row), "Wrong sequence for row {}", row);
    }
    assert_eq!(graph.path_walk(0).unwrap(), graph.path_walk(4).unwrap(), "Identical rows have different walks");
}

#[test]
fn compaction() {
    let graph = build_msa_graph();
    assert!(graph.node_count() < 40, "Unary chains were not merged: {} nodes", graph.node_count());
    for node in graph.sorted_nodes() {
        // A merged chain would have a single successor visited by exactly the same paths.
        if let [edge] = node.edges() {
            let successor = graph.node(edge.to).unwrap();
            let predecessors = graph.sorted_nodes().iter().filter(|x| x.edge_to(edge.to).is_some()).count();
            assert!(
                predecessors > 1 || successor.paths() != node.paths(),
                "Nodes {} and {} should have been merged", node.id(), successor.id()
            );
        }
    }
}

#[test]
fn small_alignment() {
    let fasta = b">a\nGATTACA\n>b\nGAT-ACA\n>c\nGACTACA\n";
    let alignment = read_msa(&mut &fasta[..]).unwrap();
    let description = alignment.to_graph().unwrap();
    let sequences: Vec<&[u8]> = description.segments().map(|segment| segment.sequence.as_slice()).collect();
    assert_eq!(sequences, vec![&b"GA"[..], &b"T"[..], &b"C"[..], &b"T"[..], &b"ACA"[..]], "Wrong node sequences");
    let walks: Vec<&[usize]> = description.paths().map(|path| path.walk.as_slice()).collect();
    assert_eq!(walks, vec![&[1, 2, 4, 5][..], &[1, 2, 5][..], &[1, 3, 4, 5][..]], "Wrong walks");
}

//-----------------------------------------------------------------------------

#[test]
fn gzipped_alignment() {
    let original = fs::read(utils::get_test_data("test.msa")).unwrap();
    let filename = serialize::temp_file_name("msa-gz");
    {
        let file = File::create(&filename).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&original).unwrap();
        encoder.finish().unwrap();
    }
    assert!(utils::is_gzipped(&filename), "The temporary file is not compressed");

    let alignment = load_msa(&filename);
    assert!(alignment.is_ok(), "Failed to load a compressed alignment: {}", alignment.unwrap_err());
    assert_eq!(alignment.unwrap(), load_test_msa(), "Compressed and plain alignments differ");
    let _ = fs::remove_file(&filename);
}

#[test]
fn invalid_alignments() {
    check_parse_error(b"GATTACA\n>a\nGATTACA\n", 1, "data before the first header");
    check_parse_error(b">a\nGATTACA\n>b\nGATTAC\n", 3, "rows of different lengths");
    check_parse_error(b">a\nGATTACA\n>b\nGAT\nTACAA\n>c\nGATTACA\n", 3, "a long multi-line row");
    check_parse_error(b">a\n>b\nGATTACA\n", 1, "an empty row");

    let alignment = read_msa(&mut &b""[..]).unwrap();
    assert!(alignment.is_empty(), "Empty input produced rows");
    assert!(matches!(alignment.to_graph(), Err(GraphError::GraphConstruction(_))), "Converted an empty alignment");

    let alignment = read_msa(&mut &b">a\nGATTACA\n>b\n-------\n"[..]).unwrap();
    assert!(matches!(alignment.to_graph(), Err(GraphError::GraphConstruction(_))), "Converted a row with only gaps");
}

//-----------------------------------------------------------------------------
