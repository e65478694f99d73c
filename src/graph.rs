//! Variation graphs with topologically sorted nodes and named paths.
//!
//! A [`GrootGraph`] is built once from a [`GraphDescription`] and is read-only afterwards, except for the per-node read counters.
//! Nodes are stored in rank order, which is a topological order of the graph.
//! Each node knows the paths that visit it, and a path is realized by its member nodes in ascending rank order.

use crate::description::{GraphDescription, Link};
use crate::{GraphError, Result};

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// An outgoing edge of a [`Node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    /// Identifier of the successor node.
    pub to: usize,
    /// Bases at the start of the successor that are already contained in this node.
    pub overlap: usize,
}

/// A node in a [`GrootGraph`].
///
/// The read counter is the only part of a node that can change after construction.
/// It can be incremented through a shared reference from any number of threads.
#[derive(Debug)]
pub struct Node {
    id: usize,
    rank: usize,
    sequence: Vec<u8>,
    // Sorted by successor id.
    edges: Vec<Edge>,
    // Sorted path identifiers.
    paths: Vec<usize>,
    read_count: AtomicUsize,
}

impl Node {
    pub(crate) fn new(id: usize, rank: usize, sequence: Vec<u8>, edges: Vec<Edge>, paths: Vec<usize>, read_count: usize) -> Self {
        Node { id, rank, sequence, edges, paths, read_count: AtomicUsize::new(read_count) }
    }

    /// Returns the node identifier.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the position of the node in topological order.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Returns the sequence of the node.
    #[inline]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Returns the length of the sequence.
    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns `true` if the sequence is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Returns the outgoing edges sorted by successor identifier.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns an iterator over successor identifiers.
    pub fn successors(&self) -> impl Iterator<Item = usize> + '_ {
        self.edges.iter().map(|edge| edge.to)
    }

    /// Returns the edge to the given successor, or [`None`] if there is no such edge.
    pub fn edge_to(&self, successor: usize) -> Option<Edge> {
        self.edges.binary_search_by_key(&successor, |edge| edge.to).ok().map(|i| self.edges[i])
    }

    /// Returns the identifiers of the paths visiting the node in ascending order.
    pub fn paths(&self) -> &[usize] {
        &self.paths
    }

    /// Returns `true` if the given path visits the node.
    pub fn contains_path(&self, path_id: usize) -> bool {
        self.paths.binary_search(&path_id).is_ok()
    }

    /// Records one read observation and returns the new count.
    pub fn increment_read_count(&self) -> usize {
        self.read_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the number of read observations.
    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Resets the number of read observations to 0.
    pub fn clear_read_count(&self) {
        self.read_count.store(0, Ordering::Relaxed);
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Node::new(self.id, self.rank, self.sequence.clone(), self.edges.clone(), self.paths.clone(), self.read_count())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.rank == other.rank && self.sequence == other.sequence &&
            self.edges == other.edges && self.paths == other.paths &&
            self.read_count() == other.read_count()
    }
}

impl Eq for Node {}

//-----------------------------------------------------------------------------

/// Parameters for building a [`GrootGraph`].
#[derive(Clone, Debug, PartialEq)]
pub struct BuildParams {
    /// Multiplier applied to node coverage thresholds when reporting coverage.
    pub length_multiplier: f64,
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams { length_multiplier: 1.0 }
    }
}

/// A step of a path walk with its coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathSegment {
    /// Rank of the node.
    pub rank: usize,
    /// Offset of the first contributed base in the path sequence.
    pub path_offset: usize,
    /// Offset of the first contributed base in the node sequence.
    pub node_offset: usize,
}

//-----------------------------------------------------------------------------

/// A variation graph for a family of related sequences.
///
/// # Examples
///
/// ```
/// use groot_graph::{BuildParams, GrootGraph, SequenceGraph};
///
/// // Two variants that differ in the middle.
/// let mut description = SequenceGraph::new();
/// description.add_segment(1, b"GATT");
/// description.add_segment(2, b"A");
/// description.add_segment(3, b"C");
/// description.add_segment(4, b"CAT");
/// description.add_link(1, 2, 0);
/// description.add_link(1, 3, 0);
/// description.add_link(2, 4, 0);
/// description.add_link(3, 4, 0);
/// description.add_path(b"first", &[1, 2, 4]);
/// description.add_path(b"second", &[1, 3, 4]);
///
/// let graph = GrootGraph::new(&description, &BuildParams::default()).unwrap();
/// assert_eq!(graph.node_count(), 4);
/// assert_eq!(graph.path_count(), 2);
/// assert_eq!(graph.graph2seq(0).unwrap(), b"GATTACAT");
/// assert_eq!(graph.graph2seq(1).unwrap(), b"GATTCCAT");
///
/// // Read counters can be updated through a shared reference.
/// graph.sorted_nodes()[0].increment_read_count();
/// assert_eq!(graph.total_reads(), 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct GrootGraph {
    sorted_nodes: Vec<Node>,
    paths: BTreeMap<usize, Vec<u8>>,
    length_multiplier: f64,
    id_to_rank: HashMap<usize, usize>,
}

/// Construction.
impl GrootGraph {
    /// Builds a graph from the given description.
    ///
    /// Path identifiers are assigned in the order the description lists the paths, starting from 0.
    /// Nodes are sorted topologically, with ties broken by the smallest node identifier.
    /// If consecutive nodes on a path are not linked in the description, the implied edge is added.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::GraphConstruction`] if the description has no nodes or no paths, contains a cycle,
    /// refers to a missing node, or is otherwise inconsistent.
    pub fn new<G: GraphDescription>(description: &G, params: &BuildParams) -> Result<Self> {
        if !(params.length_multiplier.is_finite() && params.length_multiplier > 0.0) {
            return Err(GraphError::construction(format!("Invalid length multiplier: {}", params.length_multiplier)));
        }

        // Nodes.
        let mut sequences: BTreeMap<usize, (&[u8], usize)> = BTreeMap::new();
        for segment in description.segments() {
            if segment.sequence.is_empty() {
                return Err(GraphError::construction(format!("Node {} has an empty sequence", segment.id)));
            }
            if sequences.insert(segment.id, (segment.sequence.as_slice(), segment.read_count)).is_some() {
                return Err(GraphError::construction(format!("Duplicate node {}", segment.id)));
            }
        }
        if sequences.is_empty() {
            return Err(GraphError::construction("The graph has no nodes"));
        }

        // Edges.
        let mut edges: BTreeMap<usize, BTreeMap<usize, usize>> = BTreeMap::new();
        for link in description.links() {
            add_edge(&mut edges, &sequences, link)?;
        }

        // Paths.
        let mut walks: Vec<(&[u8], &[usize])> = Vec::new();
        let mut names: HashSet<&[u8]> = HashSet::new();
        for path in description.paths() {
            if path.walk.is_empty() {
                return Err(GraphError::construction(format!("Path {} is empty", String::from_utf8_lossy(&path.name))));
            }
            if !names.insert(path.name.as_slice()) {
                return Err(GraphError::construction(format!("Duplicate path name {}", String::from_utf8_lossy(&path.name))));
            }
            let mut visited: HashSet<usize> = HashSet::with_capacity(path.walk.len());
            for node_id in path.walk.iter() {
                if !sequences.contains_key(node_id) {
                    return Err(GraphError::construction(format!(
                        "Path {} refers to a missing node {}", String::from_utf8_lossy(&path.name), node_id
                    )));
                }
                if !visited.insert(*node_id) {
                    return Err(GraphError::construction(format!(
                        "Path {} visits node {} more than once", String::from_utf8_lossy(&path.name), node_id
                    )));
                }
            }
            for pair in path.walk.windows(2) {
                let has_edge = edges.get(&pair[0]).map_or(false, |targets| targets.contains_key(&pair[1]));
                if !has_edge {
                    debug!("Adding edge {} -> {} implied by path {}", pair[0], pair[1], String::from_utf8_lossy(&path.name));
                    add_edge(&mut edges, &sequences, Link::new(pair[0], pair[1]))?;
                }
            }
            walks.push((path.name.as_slice(), path.walk.as_slice()));
        }
        if walks.is_empty() {
            return Err(GraphError::construction("The graph has no paths"));
        }

        let order = topological_order(&sequences, &edges)?;

        // Path membership and the registry.
        let mut membership: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut paths: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
        for (path_id, (name, walk)) in walks.iter().enumerate() {
            for node_id in walk.iter() {
                membership.entry(*node_id).or_default().push(path_id);
            }
            paths.insert(path_id, name.to_vec());
        }

        let mut sorted_nodes: Vec<Node> = Vec::with_capacity(order.len());
        for (rank, node_id) in order.iter().enumerate() {
            let (sequence, read_count) = sequences[node_id];
            let node_edges: Vec<Edge> = edges.get(node_id).map(|targets| {
                targets.iter().map(|(to, overlap)| Edge { to: *to, overlap: *overlap }).collect()
            }).unwrap_or_default();
            let node_paths = membership.remove(node_id).unwrap_or_default();
            sorted_nodes.push(Node::new(*node_id, rank, sequence.to_vec(), node_edges, node_paths, read_count));
        }

        let graph = Self::from_parts(sorted_nodes, paths, params.length_multiplier)
            .map_err(GraphError::GraphConstruction)?;
        info!(
            "Built a graph with {} nodes, {} edges, and {} paths",
            graph.node_count(), graph.edge_count(), graph.path_count()
        );
        Ok(graph)
    }

    /// Assembles a graph from sorted nodes and a path registry, checking the invariants.
    pub(crate) fn from_parts(sorted_nodes: Vec<Node>, paths: BTreeMap<usize, Vec<u8>>, length_multiplier: f64) -> std::result::Result<Self, String> {
        let mut id_to_rank: HashMap<usize, usize> = HashMap::with_capacity(sorted_nodes.len());
        for (rank, node) in sorted_nodes.iter().enumerate() {
            if node.rank != rank {
                return Err(format!("Node {} has rank {} at position {}", node.id, node.rank, rank));
            }
            if id_to_rank.insert(node.id, rank).is_some() {
                return Err(format!("Duplicate node {}", node.id));
            }
        }
        for node in sorted_nodes.iter() {
            if !node.edges.windows(2).all(|pair| pair[0].to < pair[1].to) {
                return Err(format!("Edges of node {} are not sorted", node.id));
            }
            for edge in node.edges.iter() {
                let successor = match id_to_rank.get(&edge.to) {
                    Some(rank) if *rank > node.rank => &sorted_nodes[*rank],
                    Some(_) => return Err(format!("Edge {} -> {} violates the topological order", node.id, edge.to)),
                    None => return Err(format!("Edge {} -> {} refers to a missing node", node.id, edge.to)),
                };
                if edge.overlap > node.len() || edge.overlap > successor.len() {
                    return Err(format!("Overlap {} is too long for edge {} -> {}", edge.overlap, node.id, edge.to));
                }
            }
            if !node.paths.windows(2).all(|pair| pair[0] < pair[1]) {
                return Err(format!("Paths of node {} are not sorted", node.id));
            }
            if let Some(path_id) = node.paths.iter().find(|path_id| !paths.contains_key(path_id)) {
                return Err(format!("Node {} refers to a missing path {}", node.id, path_id));
            }
        }

        // Every path must be a connected walk.
        let graph = GrootGraph { sorted_nodes, paths, length_multiplier, id_to_rank };
        for path_id in graph.paths.keys() {
            graph.path_segments(*path_id).map_err(|err| err.to_string())?;
        }

        Ok(graph)
    }
}

// Adds an edge after checking that it is valid.
fn add_edge(edges: &mut BTreeMap<usize, BTreeMap<usize, usize>>, sequences: &BTreeMap<usize, (&[u8], usize)>, link: Link) -> Result<()> {
    let from_len = sequences.get(&link.from).map(|(sequence, _)| sequence.len()).ok_or_else(|| {
        GraphError::construction(format!("Edge {} -> {} refers to a missing node {}", link.from, link.to, link.from))
    })?;
    let to_len = sequences.get(&link.to).map(|(sequence, _)| sequence.len()).ok_or_else(|| {
        GraphError::construction(format!("Edge {} -> {} refers to a missing node {}", link.from, link.to, link.to))
    })?;
    if link.from == link.to {
        return Err(GraphError::construction(format!("Self-loop at node {}", link.from)));
    }
    if link.overlap > from_len || link.overlap > to_len {
        return Err(GraphError::construction(format!("Overlap {} is too long for edge {} -> {}", link.overlap, link.from, link.to)));
    }
    let targets = edges.entry(link.from).or_default();
    match targets.get(&link.to) {
        Some(overlap) if *overlap != link.overlap => Err(GraphError::construction(format!(
            "Conflicting overlaps {} and {} for edge {} -> {}", overlap, link.overlap, link.from, link.to
        ))),
        Some(_) => Ok(()),
        None => {
            targets.insert(link.to, link.overlap);
            Ok(())
        },
    }
}

// Kahn's algorithm, always choosing the smallest available node identifier.
fn topological_order(sequences: &BTreeMap<usize, (&[u8], usize)>, edges: &BTreeMap<usize, BTreeMap<usize, usize>>) -> Result<Vec<usize>> {
    let mut indegree: HashMap<usize, usize> = sequences.keys().map(|id| (*id, 0)).collect();
    for targets in edges.values() {
        for to in targets.keys() {
            if let Some(degree) = indegree.get_mut(to) {
                *degree += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree.iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(sequences.len());
    while let Some(Reverse(node_id)) = ready.pop() {
        order.push(node_id);
        if let Some(targets) = edges.get(&node_id) {
            for to in targets.keys() {
                if let Some(degree) = indegree.get_mut(to) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(*to));
                    }
                }
            }
        }
    }

    if order.len() != sequences.len() {
        return Err(GraphError::construction(format!(
            "The graph is not acyclic: {} nodes are on or behind a cycle", sequences.len() - order.len()
        )));
    }
    Ok(order)
}

//-----------------------------------------------------------------------------

/// Accessors.
impl GrootGraph {
    /// Returns the nodes in rank order.
    #[inline]
    pub fn sorted_nodes(&self) -> &[Node] {
        &self.sorted_nodes
    }

    /// Returns the path registry mapping path identifiers to names.
    #[inline]
    pub fn paths(&self) -> &BTreeMap<usize, Vec<u8>> {
        &self.paths
    }

    /// Returns the number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.sorted_nodes.len()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.sorted_nodes.iter().map(|node| node.edges.len()).sum()
    }

    /// Returns the number of paths.
    #[inline]
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Returns the length multiplier the graph was built with.
    #[inline]
    pub fn length_multiplier(&self) -> f64 {
        self.length_multiplier
    }

    /// Returns the node with the given identifier.
    pub fn node(&self, node_id: usize) -> Option<&Node> {
        self.id_to_rank.get(&node_id).map(|rank| &self.sorted_nodes[*rank])
    }

    /// Returns the name of the path, or [`None`] if there is no such path.
    pub fn path_name(&self, path_id: usize) -> Option<&[u8]> {
        self.paths.get(&path_id).map(|name| name.as_slice())
    }

    /// Returns the identifier of the path with the given name.
    pub fn find_path(&self, name: &[u8]) -> Option<usize> {
        self.paths.iter().find(|(_, path_name)| path_name.as_slice() == name).map(|(path_id, _)| *path_id)
    }

    /// Returns the name of the path with the smallest identifier.
    pub fn primary_path_name(&self) -> Option<&[u8]> {
        self.paths.values().next().map(|name| name.as_slice())
    }

    /// Returns the sum of read counters over all nodes.
    pub fn total_reads(&self) -> usize {
        self.sorted_nodes.iter().map(|node| node.read_count()).sum()
    }

    /// Returns `true` if at least one node has a non-zero read counter.
    pub fn has_reads(&self) -> bool {
        self.sorted_nodes.iter().any(|node| node.read_count() > 0)
    }

    /// Resets all read counters.
    pub fn clear_read_counts(&self) {
        for node in self.sorted_nodes.iter() {
            node.clear_read_count();
        }
    }
}

//-----------------------------------------------------------------------------

/// Path resolution.
impl GrootGraph {
    /// Returns the ranks of the nodes visited by the path in order.
    ///
    /// Returns [`GraphError::UnknownPath`] if the path is not in the registry.
    pub fn path_walk(&self, path_id: usize) -> Result<Vec<usize>> {
        if !self.paths.contains_key(&path_id) {
            return Err(GraphError::UnknownPath { path_id });
        }
        Ok(self.sorted_nodes.iter().filter(|node| node.contains_path(path_id)).map(|node| node.rank).collect())
    }

    /// Returns the walk of the path with the coordinates of each step.
    ///
    /// The first step contributes the entire node, while each later step skips the overlap of the incoming edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownPath`] if the path is not in the registry or does not visit any node.
    /// Returns [`GraphError::GraphConstruction`] if consecutive nodes on the path are not connected.
    pub fn path_segments(&self, path_id: usize) -> Result<Vec<PathSegment>> {
        let walk = self.path_walk(path_id)?;
        if walk.is_empty() {
            return Err(GraphError::UnknownPath { path_id });
        }

        let mut result: Vec<PathSegment> = Vec::with_capacity(walk.len());
        let mut path_offset = 0;
        let mut prev: Option<&Node> = None;
        for rank in walk {
            let node = &self.sorted_nodes[rank];
            let node_offset = match prev {
                Some(prev) => prev.edge_to(node.id).map(|edge| edge.overlap).ok_or_else(|| {
                    GraphError::construction(format!("Path {} has no edge from node {} to node {}", path_id, prev.id, node.id))
                })?,
                None => 0,
            };
            result.push(PathSegment { rank, path_offset, node_offset });
            path_offset += node.len() - node_offset;
            prev = Some(node);
        }

        Ok(result)
    }

    /// Returns the length of the sequence of the path without building it.
    pub fn path_length(&self, path_id: usize) -> Result<usize> {
        let segments = self.path_segments(path_id)?;
        Ok(segments.iter().map(|segment| self.sorted_nodes[segment.rank].len() - segment.node_offset).sum())
    }

    /// Reconstructs the sequence of the path.
    ///
    /// The result is identical to the sequence the path was built from.
    /// Returns [`GraphError::UnknownPath`] if the path is not in the registry.
    pub fn graph2seq(&self, path_id: usize) -> Result<Vec<u8>> {
        let segments = self.path_segments(path_id)?;
        let mut result: Vec<u8> = Vec::new();
        for segment in segments {
            let node = &self.sorted_nodes[segment.rank];
            result.extend_from_slice(&node.sequence[segment.node_offset..]);
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------
