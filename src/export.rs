//! Exporting graphs with read counts as GFA files.
//!
//! After reads have been mapped, each graph that observed at least one read can be written to its own GFA file.
//! The file is named after the primary path of the graph, and every segment carries its read count in an `RC:i` tag.

use crate::formats::{self, TypedField};
use crate::store::GraphStore;
use crate::{GraphError, GrootGraph, Result};
use crate::utils;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

//-----------------------------------------------------------------------------

/// Suffix of exported file names.
pub const EXPORT_SUFFIX: &str = "-graph.gfa";

/// Outcome of exporting a store.
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Number of files written.
    pub written: usize,
    /// Number of graphs skipped because they had no reads.
    pub skipped: usize,
    /// Graphs that could not be exported, with the errors.
    pub failures: Vec<(usize, GraphError)>,
}

impl ExportSummary {
    /// Returns `true` if every graph was either written or skipped.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

//-----------------------------------------------------------------------------

impl GrootGraph {
    /// Returns the file name used for exporting the graph.
    ///
    /// The name is the sanitized primary path name followed by [`EXPORT_SUFFIX`].
    pub fn export_file_name(&self) -> String {
        format!("{}{}", self.export_base_name(), EXPORT_SUFFIX)
    }

    fn export_base_name(&self) -> String {
        utils::sanitize_file_name(self.primary_path_name().unwrap_or_default())
    }

    /// Writes the graph in GFA format with read counts.
    ///
    /// Segments and links are written in rank order, followed by one path line for each path in identifier order.
    pub fn write_gfa<T: Write>(&self, output: &mut T) -> Result<()> {
        formats::write_gfa_header(output)?;
        for node in self.sorted_nodes() {
            let tags = [TypedField::int(TypedField::READ_COUNT, node.read_count() as isize)];
            formats::write_gfa_segment(node.id(), node.sequence(), &tags, output)?;
        }
        for node in self.sorted_nodes() {
            for edge in node.edges() {
                formats::write_gfa_link(node.id(), edge.to, edge.overlap, output)?;
            }
        }
        for (path_id, name) in self.paths().iter() {
            let walk: Vec<usize> = self.path_walk(*path_id)?.into_iter().map(|rank| self.sorted_nodes()[rank].id()).collect();
            formats::write_gfa_path(name, &walk, output)?;
        }
        Ok(())
    }

    /// Writes the graph to a GFA file in the given directory if any node has a non-zero read count.
    ///
    /// Returns the number of files written, which is either 0 or 1.
    /// A partially written file is not removed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ExportIo`] if the file cannot be created or written.
    pub fn dump_graph<P: AsRef<Path>>(&self, directory: P) -> Result<usize> {
        if !self.has_reads() {
            return Ok(0);
        }
        self.write_gfa_file(&directory.as_ref().join(self.export_file_name()))?;
        Ok(1)
    }

    fn write_gfa_file(&self, filename: &Path) -> Result<()> {
        let export_error = |source: io::Error| GraphError::ExportIo { path: filename.to_path_buf(), source };

        let file = File::create(filename).map_err(export_error)?;
        let mut output = BufWriter::new(file);
        self.write_gfa(&mut output).map_err(|err| match err {
            GraphError::Io(source) => export_error(source),
            err => err,
        })?;
        output.flush().map_err(export_error)?;

        debug!("Exported graph to {}", filename.display());
        Ok(())
    }
}

impl GraphStore {
    /// Exports every graph with reads to its own GFA file in the given directory.
    ///
    /// Failures with individual graphs are logged and collected in the summary, and the remaining graphs are still exported.
    /// If the file name of a graph is already taken in this export, the graph identifier is added to the name of the later graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ExportIo`] if the directory does not exist or is not a directory.
    pub fn export<P: AsRef<Path>>(&self, directory: P) -> Result<ExportSummary> {
        let directory = directory.as_ref();
        check_directory(directory)?;

        let mut summary = ExportSummary::default();
        let mut used: HashSet<String> = HashSet::new();
        for (graph_id, graph) in self.iter() {
            if !graph.has_reads() {
                summary.skipped += 1;
                continue;
            }
            let name = unique_file_name(&graph.export_base_name(), graph_id, &used);
            let filename = directory.join(&name);
            used.insert(name);
            match graph.write_gfa_file(&filename) {
                Ok(()) => summary.written += 1,
                Err(err) => {
                    warn!("Failed to export graph {}: {}", graph_id, err);
                    summary.failures.push((graph_id, err));
                },
            }
        }

        info!(
            "Exported {} graphs to {} ({} without reads, {} failures)",
            summary.written, directory.display(), summary.skipped, summary.failures.len()
        );
        Ok(summary)
    }
}

// Returns `<base>-graph.gfa`, or a name with the graph identifier if that is already used.
fn unique_file_name(base: &str, graph_id: usize, used: &HashSet<String>) -> String {
    let name = format!("{}{}", base, EXPORT_SUFFIX);
    if !used.contains(&name) {
        return name;
    }
    let mut name = format!("{}-{}{}", base, graph_id, EXPORT_SUFFIX);
    let mut copy = 1;
    while used.contains(&name) {
        copy += 1;
        name = format!("{}-{}.{}{}", base, graph_id, copy, EXPORT_SUFFIX);
    }
    name
}

fn check_directory(directory: &Path) -> Result<()> {
    let metadata = fs::metadata(directory).map_err(|source| GraphError::ExportIo { path: PathBuf::from(directory), source })?;
    if !metadata.is_dir() {
        let source = io::Error::new(io::ErrorKind::InvalidInput, "not a directory");
        return Err(GraphError::ExportIo { path: PathBuf::from(directory), source });
    }
    Ok(())
}

//-----------------------------------------------------------------------------
