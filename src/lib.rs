//! # groot-graph: variation graphs for resistome profiling.
//!
//! This crate implements the graph engine of a read classifier that identifies antibiotic resistance genes in metagenomic samples.
//! Each family of closely related gene variants is represented as a variation graph, where every variant is a named path.
//! Sequencing reads are first matched against locality-sensitive signatures of windows over the paths, and then aligned to the graphs.
//! Alignments increment per-node read counters, which are later used for coverage reports and for exporting the graphs that observed reads.
//!
//! ### Basic concepts
//!
//! A [`GrootGraph`] is built from any [`GraphDescription`], such as a [`SequenceGraph`] parsed from a GFA file ([`formats::read_gfa`])
//! or converted from a multiple sequence alignment ([`msa::Msa::to_graph`]).
//! Nodes are sorted topologically, and each node records the paths that visit it.
//! The sequence of a path can be reconstructed with [`GrootGraph::graph2seq`].
//!
//! [`GrootGraph::window_graph`] slides a window over every path and produces [`Window`] objects with MinHash signatures.
//! The windows are generated by a background thread and delivered through a bounded channel as a [`WindowStream`].
//!
//! A [`GraphStore`] is a collection of graphs that can be written to a single SQLite file and loaded later.
//! See [`GraphStore::refs`] for alignment targets, [`GraphStore::coverage`] for coverage reports, and [`GraphStore::export`] for GFA export.
//!
//! ### Read counters
//!
//! The read counter of a node can be incremented through a shared reference with [`Node::increment_read_count`].
//! The graph is otherwise immutable after construction, so it can be shared between alignment threads.

pub mod coverage;
pub mod description;
pub mod error;
pub mod export;
pub mod formats;
pub mod graph;
pub mod msa;
pub mod store;
pub mod utils;
pub mod window;

#[cfg(test)]
mod internal;


pub use coverage::{CoverageParams, CoverageRecord, PathCoverage};
pub use description::{GraphDescription, Link, PathRecord, Segment, SequenceGraph};
pub use error::{GraphError, Result};
pub use export::ExportSummary;
pub use graph::{BuildParams, Edge, GrootGraph, Node, PathSegment};
pub use msa::Msa;
pub use store::{GraphStore, Reference, StoreFileType};
pub use window::{CancellationToken, SignatureRegistry, Uniqueness, Window, WindowParams, WindowStream};
