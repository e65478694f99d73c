// Shared helpers for unit tests.

use crate::{BuildParams, GraphStore, GrootGraph, SequenceGraph};
use crate::{formats, msa, utils};

use simple_sds::serialize;

use std::path::{Path, PathBuf};

//-----------------------------------------------------------------------------

// The gene variant graph in test.gfa.

pub(crate) const BLA_B10_NAME: &[u8] = b"*argannot~~~(Bla)B-10~~~AY348325:1-747";
pub(crate) const BLA_B10_SNP_NAME: &[u8] = b"*argannot~~~(Bla)B-10.snp~~~AY348325.1:1-747";
pub(crate) const BLA_B10_DEL_NAME: &[u8] = b"*argannot~~~(Bla)B-10.del~~~AY348325.2:1-744";

pub(crate) const BLA_B10: &[u8] = b"ATGAAAGGATTAAAAGGGCTATTGGTTCTGGCTTTAGGCTTTACAGGACTACAGGTTTTTGGGCAACAGAACCCTGATATTAAAATTGAAAAATTAAAAGATAATTTATACGTCTATACAACCTATAATACCTTCAAAGGAACTAAATATGCGGCTAATGCGGTATATATGGTAACCGATAAAGGAGTAGTGGTTATAGACTCTCCATGGGGAGAAGATAAATTTAAAAGTTTTACAGACGAGATTTATAAAAAGCACGGAAAGAAAGTTATCATGAACATTGCAACCCACTCTCATGATGATAGAGCCGGAGGTCTTGAATATTTTGGTAAACTAGGTGCAAAAACTTATTCTACTAAAATGACAGATTCTATTTTAGCAAAAGAGAATAAGCCAAGAGCAAAGTACACTTTTGATAATAATAAATCTTTTAAAGTAGGAAAGACTGAGTTTCAGGTTTATTATCCGGGAAAAGGTCATACAGCAGATAATGTGGTTGTGTGGTTTCCTAAAGACAAAGTATTAGTAGGAGGCTGCATTGTAAAAAGTGGTGATTCGAAAGACCTTGGGTTTATTGGGGAAGCTTATGTAAACGACTGGACACAGTCCATACACAACATTCAGCAGAAATTTCCCTATGTTCAGTATGTCGTTGCAGGTCATGACGACTGGAAAGATCAAACATCAATACAACATACACTGGATTTAATCAGTGAATATCAACAAAAACAAAAGGCTTCAAATTAA";

// Path identifiers in the order of the P lines.
pub(crate) const BLA_B10_PATH: usize = 0;
pub(crate) const BLA_B10_SNP_PATH: usize = 1;
pub(crate) const BLA_B10_DEL_PATH: usize = 2;

// The variants differ from the reference at these offsets.
pub(crate) const SNP_OFFSET: usize = 100;
pub(crate) const SNP_BASE: u8 = b'G';
pub(crate) const DEL_SNP_OFFSET: usize = 400;
pub(crate) const DEL_SNP_BASE: u8 = b'T';
pub(crate) const DEL_RANGE: std::ops::Range<usize> = 600..603;

pub(crate) fn bla_b10_variant(path_id: usize) -> Vec<u8> {
    let mut result = BLA_B10.to_vec();
    match path_id {
        BLA_B10_SNP_PATH => result[SNP_OFFSET] = SNP_BASE,
        BLA_B10_DEL_PATH => {
            result[DEL_SNP_OFFSET] = DEL_SNP_BASE;
            result.drain(DEL_RANGE);
        },
        _ => {},
    }
    result
}

pub(crate) fn load_test_gfa() -> SequenceGraph {
    let filename = utils::get_test_data("test.gfa");
    let description = formats::load_gfa(&filename);
    assert!(description.is_ok(), "Failed to load {}: {}", filename.display(), description.unwrap_err());
    description.unwrap()
}

pub(crate) fn build_graph(description: &SequenceGraph) -> GrootGraph {
    let graph = GrootGraph::new(description, &BuildParams::default());
    assert!(graph.is_ok(), "Failed to build the graph: {}", graph.unwrap_err());
    graph.unwrap()
}

pub(crate) fn build_test_graph() -> GrootGraph {
    build_graph(&load_test_gfa())
}

//-----------------------------------------------------------------------------

// The alignment in test.msa.

pub(crate) fn load_test_msa() -> msa::Msa {
    let filename = utils::get_test_data("test.msa");
    let alignment = msa::load_msa(&filename);
    assert!(alignment.is_ok(), "Failed to load {}: {}", filename.display(), alignment.unwrap_err());
    alignment.unwrap()
}

pub(crate) fn build_msa_graph() -> GrootGraph {
    let alignment = load_test_msa();
    let description = alignment.to_graph();
    assert!(description.is_ok(), "Failed to convert the alignment: {}", description.unwrap_err());
    build_graph(&description.unwrap())
}

// A store with the GFA graph as graph 0 and the MSA graph as graph 1.
pub(crate) fn build_test_store() -> GraphStore {
    let mut store = GraphStore::new();
    store.insert(0, build_test_graph());
    store.insert(1, build_msa_graph());
    store
}

//-----------------------------------------------------------------------------

// Temporary files.

pub(crate) fn temp_store_file() -> PathBuf {
    let filename = serialize::temp_file_name("groot-store");
    assert!(!utils::file_exists(&filename), "Store file {} already exists", filename.display());
    filename
}

pub(crate) fn temp_directory() -> PathBuf {
    let directory = serialize::temp_file_name("groot-export");
    let result = std::fs::create_dir(&directory);
    assert!(result.is_ok(), "Failed to create directory {}: {}", directory.display(), result.unwrap_err());
    directory
}

pub(crate) fn remove_directory(directory: &Path) {
    let _ = std::fs::remove_dir_all(directory);
}

//-----------------------------------------------------------------------------
