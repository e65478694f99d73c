//! Error types shared by graph construction, windowing, the graph store, and export.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Errors produced by the graph engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The input description is empty, cyclic, or otherwise inconsistent.
    #[error("graph construction failed: {0}")]
    GraphConstruction(String),

    /// A path identifier that is not in the registry of the graph.
    #[error("unknown path: {path_id}")]
    UnknownPath { path_id: usize },

    /// Window parameters were rejected before any work started.
    #[error("invalid window configuration: {0}")]
    InvalidWindowConfig(String),

    /// Coverage cutoff outside `[0, 1]`.
    #[error("invalid coverage cutoff: {0}")]
    InvalidCoverageCutoff(f64),

    /// The store contains no graphs.
    #[error("the graph store is empty")]
    EmptyStore,

    /// The index file is missing, truncated, or has an unsupported version.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Writing an exported graph failed.
    #[error("failed to export {}: {source}", .path.display())]
    ExportIo {
        path: PathBuf,
        source: io::Error,
    },

    /// A syntax error in a GFA or MSA input.
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// Result type for the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub(crate) fn construction<S: Into<String>>(message: S) -> Self {
        GraphError::GraphConstruction(message.into())
    }

    pub(crate) fn parse<S: Into<String>>(line: usize, message: S) -> Self {
        GraphError::Parse { line, message: message.into() }
    }
}

//-----------------------------------------------------------------------------
