//! Coverage reports from node read counters.
//!
//! After reads have been mapped to the graphs, a path is reported as present when a large enough fraction of its bases lies in nodes with enough reads.

use crate::store::{GraphStore, Reference};
use crate::{GraphError, GrootGraph, Result};

use log::debug;


//-----------------------------------------------------------------------------

/// Parameters for coverage reports.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageParams {
    /// Minimum fraction of covered bases in `[0, 1]`.
    pub cutoff: f64,
    /// Minimum number of reads for a node to count as covered, before applying the length multiplier.
    pub min_reads: usize,
}

impl CoverageParams {
    /// Default coverage cutoff.
    pub const CUTOFF: f64 = 0.9;

    /// Default minimum number of reads.
    pub const MIN_READS: usize = 1;
}

impl Default for CoverageParams {
    fn default() -> Self {
        CoverageParams { cutoff: Self::CUTOFF, min_reads: Self::MIN_READS }
    }
}

/// Coverage statistics for a single path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathCoverage {
    /// Bases of the path sequence in covered nodes.
    pub covered: usize,
    /// Length of the path sequence.
    pub length: usize,
    /// Sum of read counters over the nodes of the path.
    pub reads: usize,
}

impl PathCoverage {
    /// Returns the fraction of covered bases.
    pub fn breadth(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            self.covered as f64 / self.length as f64
        }
    }
}

/// A path that passed the coverage cutoff.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageRecord {
    /// The path.
    pub reference: Reference,
    /// Bases of the path sequence in covered nodes.
    pub covered: usize,
    /// Fraction of covered bases.
    pub breadth: f64,
    /// Sum of read counters over the nodes of the path.
    pub reads: usize,
}

//-----------------------------------------------------------------------------

impl GrootGraph {
    /// Returns the read count a node needs to be covered.
    ///
    /// This is `min_reads` scaled by the length multiplier and rounded up, but always at least 1.
    pub fn coverage_threshold(&self, min_reads: usize) -> usize {
        let scaled = (min_reads as f64 * self.length_multiplier()).ceil();
        (scaled as usize).max(1)
    }

    /// Computes the coverage statistics for the given path.
    ///
    /// Bases shared with the previous node through an overlap are attributed to the previous node.
    /// Returns [`GraphError::UnknownPath`] if the path is not in the registry.
    pub fn path_coverage(&self, path_id: usize, min_reads: usize) -> Result<PathCoverage> {
        let threshold = self.coverage_threshold(min_reads);
        let mut result = PathCoverage { covered: 0, length: 0, reads: 0 };
        for segment in self.path_segments(path_id)? {
            let node = &self.sorted_nodes()[segment.rank];
            let contributed = node.len() - segment.node_offset;
            let reads = node.read_count();
            result.length += contributed;
            result.reads += reads;
            if reads >= threshold {
                result.covered += contributed;
            }
        }
        Ok(result)
    }
}

impl GraphStore {
    /// Reports the paths in the store with coverage breadth at least `params.cutoff`.
    ///
    /// Records are ordered by graph and path identifiers.
    /// Paths without any reads are never reported, and an empty store produces an empty report.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidCoverageCutoff`] if the cutoff is not in `[0, 1]`.
    pub fn coverage(&self, params: &CoverageParams) -> Result<Vec<CoverageRecord>> {
        if !(0.0..=1.0).contains(&params.cutoff) {
            return Err(GraphError::InvalidCoverageCutoff(params.cutoff));
        }

        let mut result: Vec<CoverageRecord> = Vec::new();
        for (graph_id, graph) in self.iter() {
            for (path_id, name) in graph.paths().iter() {
                let coverage = graph.path_coverage(*path_id, params.min_reads)?;
                let breadth = coverage.breadth();
                if breadth < params.cutoff || coverage.reads == 0 {
                    continue;
                }
                let reference = Reference { graph_id, path_id: *path_id, name: name.clone(), length: coverage.length };
                result.push(CoverageRecord { reference, covered: coverage.covered, breadth, reads: coverage.reads });
            }
        }
        debug!("{} paths passed coverage cutoff {}", result.len(), params.cutoff);

        Ok(result)
    }
}

//-----------------------------------------------------------------------------
