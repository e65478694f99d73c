//! Generic sequence graph descriptions consumed by the graph builder.
//!
//! The builder only needs three capabilities from its input: iterating over segments, links, and paths.
//! These are captured by the [`GraphDescription`] trait, so that the builder does not depend on how the input was parsed.
//! [`SequenceGraph`] is the plain in-memory implementation produced by the GFA and MSA readers.

//-----------------------------------------------------------------------------

/// A node in a graph description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Integer identifier of the node.
    pub id: usize,
    /// Sequence of the node.
    pub sequence: Vec<u8>,
    /// Reads already observed on the node, usually 0.
    pub read_count: usize,
}

impl Segment {
    /// Creates a new segment without read observations.
    pub fn new(id: usize, sequence: &[u8]) -> Self {
        Segment { id, sequence: sequence.to_vec(), read_count: 0 }
    }
}

/// A directed edge between two forward-oriented nodes.
///
/// `overlap` is the number of bases at the start of the successor that are already contained in the predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Link {
    pub from: usize,
    pub to: usize,
    pub overlap: usize,
}

impl Link {
    /// Creates a new link without an overlap.
    pub fn new(from: usize, to: usize) -> Self {
        Link { from, to, overlap: 0 }
    }
}

/// A named walk over node identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathRecord {
    pub name: Vec<u8>,
    pub walk: Vec<usize>,
}

//-----------------------------------------------------------------------------

/// Capabilities the graph builder requires from its input.
pub trait GraphDescription {
    /// Iterates over the segments.
    fn segments(&self) -> impl Iterator<Item = &Segment>;

    /// Iterates over the links.
    fn links(&self) -> impl Iterator<Item = Link>;

    /// Iterates over the paths in the order they should be numbered.
    fn paths(&self) -> impl Iterator<Item = &PathRecord>;
}

//-----------------------------------------------------------------------------

/// A sequence graph held as plain lists of segments, links, and paths.
///
/// No validation happens here; inconsistencies are reported when a [`crate::GrootGraph`] is built.
///
/// # Examples
///
/// ```
/// use groot_graph::{SequenceGraph, GraphDescription};
///
/// let mut description = SequenceGraph::new();
/// description.add_segment(1, b"GATT");
/// description.add_segment(2, b"ACA");
/// description.add_link(1, 2, 0);
/// description.add_path(b"example", &[1, 2]);
/// assert_eq!(description.segments().count(), 2);
/// assert_eq!(description.links().count(), 1);
/// assert_eq!(description.paths().count(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceGraph {
    segments: Vec<Segment>,
    links: Vec<Link>,
    paths: Vec<PathRecord>,
}

impl SequenceGraph {
    /// Creates an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a segment without read observations.
    pub fn add_segment(&mut self, id: usize, sequence: &[u8]) {
        self.segments.push(Segment::new(id, sequence));
    }

    /// Adds a segment with the given number of read observations.
    pub fn add_segment_with_reads(&mut self, id: usize, sequence: &[u8], read_count: usize) {
        self.segments.push(Segment { id, sequence: sequence.to_vec(), read_count });
    }

    /// Adds a link from `from` to `to` with the given overlap.
    pub fn add_link(&mut self, from: usize, to: usize, overlap: usize) {
        self.links.push(Link { from, to, overlap });
    }

    /// Adds a named path.
    pub fn add_path(&mut self, name: &[u8], walk: &[usize]) {
        self.paths.push(PathRecord { name: name.to_vec(), walk: walk.to_vec() });
    }

    /// Returns `true` if there are no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl GraphDescription for SequenceGraph {
    fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    fn links(&self) -> impl Iterator<Item = Link> {
        self.links.iter().copied()
    }

    fn paths(&self) -> impl Iterator<Item = &PathRecord> {
        self.paths.iter()
    }
}

//-----------------------------------------------------------------------------
