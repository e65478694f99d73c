//! A persistent collection of variation graphs.
//!
//! [`GraphStore`] maps small integer identifiers to [`GrootGraph`] objects and forms the index used for read classification.
//! The store is written to a single SQLite database file with [`GraphStore::dump`] and read back with [`GraphStore::load`].
//!
//! ### Database layout
//!
//! * `Tags`: key-value pairs including the format version and the number of graphs, nodes, and paths.
//! * `Graphs`: one row per graph with its length multiplier.
//! * `Nodes`: one row per node with its rank, identifier, sequence, and read count.
//! * `Edges`: one row per edge with the overlap.
//! * `Paths`: the path registry of each graph.
//! * `PathNodes`: the nodes visited by each path.

use crate::graph::{Edge, Node};
use crate::{GraphError, GrootGraph, Result};
use crate::utils;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use rusqlite::{Connection, OpenFlags, Statement};

use log::info;


//-----------------------------------------------------------------------------

/// Alignment target metadata for one path in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Graph identifier in the store.
    pub graph_id: usize,
    /// Path identifier in the graph.
    pub path_id: usize,
    /// Name of the path.
    pub name: Vec<u8>,
    /// Length of the path sequence in bp.
    pub length: usize,
}

/// An in-memory collection of graphs with a durable single-file form.
///
/// Operations that change the collection take `&mut self`, while read counters can be updated through shared references to the graphs.
///
/// # Examples
///
/// ```
/// use groot_graph::{BuildParams, GraphStore, GrootGraph, SequenceGraph};
/// use std::env;
///
/// let mut description = SequenceGraph::new();
/// description.add_segment(1, b"GATTACA");
/// description.add_path(b"gene", &[1]);
/// let graph = GrootGraph::new(&description, &BuildParams::default()).unwrap();
///
/// let mut store = GraphStore::new();
/// store.insert(0, graph);
/// let filename = env::temp_dir().join(format!("groot-graph-doctest-{}.db", std::process::id()));
/// store.dump(&filename).unwrap();
///
/// let loaded = GraphStore::open(&filename).unwrap();
/// assert_eq!(loaded, store);
/// let refs = loaded.refs().unwrap();
/// assert_eq!(refs.len(), 1);
/// assert_eq!(refs[0].length, 7);
/// std::fs::remove_file(&filename).unwrap();
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphStore {
    graphs: BTreeMap<usize, GrootGraph>,
}

/// Using the collection.
impl GraphStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a graph with the given identifier and returns the graph it replaced.
    pub fn insert(&mut self, graph_id: usize, graph: GrootGraph) -> Option<GrootGraph> {
        self.graphs.insert(graph_id, graph)
    }

    /// Removes the graph with the given identifier.
    pub fn remove(&mut self, graph_id: usize) -> Option<GrootGraph> {
        self.graphs.remove(&graph_id)
    }

    /// Returns the graph with the given identifier.
    pub fn get(&self, graph_id: usize) -> Option<&GrootGraph> {
        self.graphs.get(&graph_id)
    }

    /// Returns the number of graphs.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Iterates over `(graph identifier, graph)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &GrootGraph)> {
        self.graphs.iter().map(|(graph_id, graph)| (*graph_id, graph))
    }

    /// Returns one [`Reference`] for each path of each graph, ordered by graph and path identifiers.
    ///
    /// Path lengths are computed from node lengths without building the sequences.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EmptyStore`] if there are no graphs.
    /// Returns an error if a path in the registry does not form a walk in its graph.
    pub fn refs(&self) -> Result<Vec<Reference>> {
        if self.is_empty() {
            return Err(GraphError::EmptyStore);
        }
        let mut result: Vec<Reference> = Vec::new();
        for (graph_id, graph) in self.iter() {
            for (path_id, name) in graph.paths().iter() {
                let length = graph.path_length(*path_id)?;
                result.push(Reference { graph_id, path_id: *path_id, name: name.clone(), length });
            }
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------

/// Persistence.
impl GraphStore {
    // Key for the format version.
    const KEY_VERSION: &'static str = "version";

    /// Current format version.
    pub const VERSION: &'static str = "GrootGraph-store v1";

    // Key for graph count.
    const KEY_GRAPHS: &'static str = "graphs";

    // Key for node count.
    const KEY_NODES: &'static str = "nodes";

    // Key for edge count.
    const KEY_EDGES: &'static str = "edges";

    // Key for path count.
    const KEY_PATHS: &'static str = "paths";

    /// Opens a store file and returns the loaded store.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let mut result = GraphStore::new();
        result.load(filename)?;
        Ok(result)
    }

    /// Writes the store to the given file, replacing the file if it exists.
    ///
    /// The database is first written to a temporary file in the same directory and then renamed over the target.
    /// If anything fails, the temporary file is removed and the target is left as it was.
    pub fn dump<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let filename = filename.as_ref();
        let temp_file = temp_file_name(filename)?;
        if utils::file_exists(&temp_file) {
            fs::remove_file(&temp_file)?;
        }

        let result = self.write_database(&temp_file).and_then(|_| {
            fs::rename(&temp_file, filename).map_err(GraphError::from)
        });
        if result.is_err() && utils::file_exists(&temp_file) {
            let _ = fs::remove_file(&temp_file);
        }
        result?;

        info!(
            "Wrote {} graphs to {} ({})",
            self.len(), filename.display(), utils::file_size(filename).unwrap_or_default()
        );
        Ok(())
    }

    /// Replaces the contents of the store with the graphs stored in the given file.
    ///
    /// The store is not changed if loading fails.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CorruptIndex`] if the file is missing, is not a database, has an unsupported version,
    /// or contains inconsistent data.
    pub fn load<P: AsRef<Path>>(&mut self, filename: P) -> Result<()> {
        let filename = filename.as_ref();
        if !utils::file_exists(filename) {
            return Err(GraphError::CorruptIndex(format!("File {} does not exist", filename.display())));
        }
        let graphs = read_database(filename).map_err(|err| match err {
            GraphError::CorruptIndex(message) => GraphError::CorruptIndex(message),
            err => GraphError::CorruptIndex(format!("{}: {}", filename.display(), err)),
        })?;
        self.graphs = graphs;

        info!("Loaded {} graphs from {}", self.len(), filename.display());
        Ok(())
    }

    fn write_database(&self, filename: &Path) -> Result<()> {
        let mut connection = Connection::open(filename)?;
        Self::create_tables(&connection)?;
        self.insert_tags(&mut connection)?;
        self.insert_graphs(&mut connection)?;
        connection.close().map_err(|(_, err)| GraphError::from(err))?;
        Ok(())
    }

    fn create_tables(connection: &Connection) -> rusqlite::Result<()> {
        connection.execute_batch(
            "CREATE TABLE Tags (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) STRICT;
            CREATE TABLE Graphs (
                id INTEGER PRIMARY KEY,
                length_multiplier REAL NOT NULL
            ) STRICT;
            CREATE TABLE Nodes (
                graph INTEGER NOT NULL,
                rank INTEGER NOT NULL,
                id INTEGER NOT NULL,
                sequence BLOB NOT NULL,
                read_count INTEGER NOT NULL,
                PRIMARY KEY (graph, rank)
            ) STRICT;
            CREATE TABLE Edges (
                graph INTEGER NOT NULL,
                from_node INTEGER NOT NULL,
                to_node INTEGER NOT NULL,
                overlap INTEGER NOT NULL,
                PRIMARY KEY (graph, from_node, to_node)
            ) STRICT;
            CREATE TABLE Paths (
                graph INTEGER NOT NULL,
                id INTEGER NOT NULL,
                name BLOB NOT NULL,
                PRIMARY KEY (graph, id)
            ) STRICT;
            CREATE TABLE PathNodes (
                graph INTEGER NOT NULL,
                path INTEGER NOT NULL,
                node INTEGER NOT NULL,
                PRIMARY KEY (graph, path, node)
            ) STRICT;"
        )
    }

    fn insert_tags(&self, connection: &mut Connection) -> rusqlite::Result<()> {
        let nodes: usize = self.graphs.values().map(|graph| graph.node_count()).sum();
        let edges: usize = self.graphs.values().map(|graph| graph.edge_count()).sum();
        let paths: usize = self.graphs.values().map(|graph| graph.path_count()).sum();

        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Tags(key, value) VALUES (?1, ?2)"
            )?;
            insert.execute((Self::KEY_VERSION, Self::VERSION))?;
            insert.execute((Self::KEY_GRAPHS, self.len().to_string()))?;
            insert.execute((Self::KEY_NODES, nodes.to_string()))?;
            insert.execute((Self::KEY_EDGES, edges.to_string()))?;
            insert.execute((Self::KEY_PATHS, paths.to_string()))?;
        }
        transaction.commit()
    }

    fn insert_graphs(&self, connection: &mut Connection) -> rusqlite::Result<()> {
        let transaction = connection.transaction()?;
        {
            let mut insert_graph = transaction.prepare(
                "INSERT INTO Graphs(id, length_multiplier) VALUES (?1, ?2)"
            )?;
            let mut insert_node = transaction.prepare(
                "INSERT INTO Nodes(graph, rank, id, sequence, read_count) VALUES (?1, ?2, ?3, ?4, ?5)"
            )?;
            let mut insert_edge = transaction.prepare(
                "INSERT INTO Edges(graph, from_node, to_node, overlap) VALUES (?1, ?2, ?3, ?4)"
            )?;
            let mut insert_path = transaction.prepare(
                "INSERT INTO Paths(graph, id, name) VALUES (?1, ?2, ?3)"
            )?;
            let mut insert_membership = transaction.prepare(
                "INSERT INTO PathNodes(graph, path, node) VALUES (?1, ?2, ?3)"
            )?;

            for (graph_id, graph) in self.iter() {
                insert_graph.execute((graph_id, graph.length_multiplier()))?;
                for node in graph.sorted_nodes() {
                    insert_node.execute((graph_id, node.rank(), node.id(), node.sequence(), node.read_count()))?;
                    for edge in node.edges() {
                        insert_edge.execute((graph_id, node.id(), edge.to, edge.overlap))?;
                    }
                    for path_id in node.paths() {
                        insert_membership.execute((graph_id, *path_id, node.id()))?;
                    }
                }
                for (path_id, name) in graph.paths().iter() {
                    insert_path.execute((graph_id, *path_id, name.as_slice()))?;
                }
            }
        }
        transaction.commit()
    }
}

// Returns a temporary file name next to the target.
fn temp_file_name(filename: &Path) -> Result<PathBuf> {
    let name = filename.file_name().ok_or_else(|| {
        GraphError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid store file name: {}", filename.display()),
        ))
    })?;
    let mut temp_name = name.to_os_string();
    temp_name.push(format!(".tmp-{}", process::id()));
    Ok(filename.with_file_name(temp_name))
}

//-----------------------------------------------------------------------------

// Reading the database.

fn read_database(filename: &Path) -> Result<BTreeMap<usize, GrootGraph>> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Connection::open_with_flags(filename, flags)?;

    let mut get_tag = connection.prepare(
        "SELECT value FROM Tags WHERE key = ?1"
    )?;
    let version = get_string_value(&mut get_tag, GraphStore::KEY_VERSION)?;
    if version != GraphStore::VERSION {
        return Err(GraphError::CorruptIndex(format!(
            "Unsupported store version: {} (expected {})", version, GraphStore::VERSION
        )));
    }
    let graph_count = get_numeric_value(&mut get_tag, GraphStore::KEY_GRAPHS)?;
    let node_count = get_numeric_value(&mut get_tag, GraphStore::KEY_NODES)?;
    let edge_count = get_numeric_value(&mut get_tag, GraphStore::KEY_EDGES)?;
    let path_count = get_numeric_value(&mut get_tag, GraphStore::KEY_PATHS)?;
    drop(get_tag);

    let mut graph_rows: Vec<(usize, f64)> = Vec::new();
    {
        let mut get_graphs = connection.prepare(
            "SELECT id, length_multiplier FROM Graphs ORDER BY id"
        )?;
        let mut rows = get_graphs.query(())?;
        while let Some(row) = rows.next()? {
            graph_rows.push((row.get(0)?, row.get(1)?));
        }
    }

    let mut get_nodes = connection.prepare(
        "SELECT rank, id, sequence, read_count FROM Nodes WHERE graph = ?1 ORDER BY rank"
    )?;
    let mut get_edges = connection.prepare(
        "SELECT from_node, to_node, overlap FROM Edges WHERE graph = ?1 ORDER BY from_node, to_node"
    )?;
    let mut get_paths = connection.prepare(
        "SELECT id, name FROM Paths WHERE graph = ?1 ORDER BY id"
    )?;
    let mut get_membership = connection.prepare(
        "SELECT path, node FROM PathNodes WHERE graph = ?1 ORDER BY node, path"
    )?;

    let mut result: BTreeMap<usize, GrootGraph> = BTreeMap::new();
    let (mut nodes_found, mut edges_found, mut paths_found) = (0, 0, 0);
    for (graph_id, length_multiplier) in graph_rows {
        let corrupt = |message: String| GraphError::CorruptIndex(format!("Graph {}: {}", graph_id, message));

        // Edges and path membership by node identifier.
        let mut edges: HashMap<usize, Vec<Edge>> = HashMap::new();
        let mut rows = get_edges.query((graph_id,))?;
        while let Some(row) = rows.next()? {
            let from: usize = row.get(0)?;
            edges.entry(from).or_default().push(Edge { to: row.get(1)?, overlap: row.get(2)? });
            edges_found += 1;
        }
        let mut membership: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut rows = get_membership.query((graph_id,))?;
        while let Some(row) = rows.next()? {
            let path_id: usize = row.get(0)?;
            membership.entry(row.get(1)?).or_default().push(path_id);
        }

        let mut sorted_nodes: Vec<Node> = Vec::new();
        let mut rows = get_nodes.query((graph_id,))?;
        while let Some(row) = rows.next()? {
            let rank: usize = row.get(0)?;
            let id: usize = row.get(1)?;
            let sequence: Vec<u8> = row.get(2)?;
            let read_count: usize = row.get(3)?;
            let node_edges = edges.remove(&id).unwrap_or_default();
            let node_paths = membership.remove(&id).unwrap_or_default();
            sorted_nodes.push(Node::new(id, rank, sequence, node_edges, node_paths, read_count));
        }
        if let Some(from) = edges.keys().next() {
            return Err(corrupt(format!("Edges from a missing node {}", from)));
        }
        if let Some(node) = membership.keys().next() {
            return Err(corrupt(format!("Path membership for a missing node {}", node)));
        }

        let mut paths: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
        let mut rows = get_paths.query((graph_id,))?;
        while let Some(row) = rows.next()? {
            paths.insert(row.get(0)?, row.get(1)?);
        }

        nodes_found += sorted_nodes.len();
        paths_found += paths.len();
        let graph = GrootGraph::from_parts(sorted_nodes, paths, length_multiplier).map_err(corrupt)?;
        result.insert(graph_id, graph);
    }

    if result.len() != graph_count || nodes_found != node_count || edges_found != edge_count || paths_found != path_count {
        return Err(GraphError::CorruptIndex(format!(
            "Expected {} graphs, {} nodes, {} edges, and {} paths; found {}, {}, {}, and {}",
            graph_count, node_count, edge_count, path_count,
            result.len(), nodes_found, edges_found, paths_found
        )));
    }

    Ok(result)
}

// Executes the statement, which is expected to return a single string value.
// Then returns the value.
fn get_string_value(statement: &mut Statement, key: &str) -> Result<String> {
    let result: rusqlite::Result<String> = statement.query_row(
        (key,),
        |row| row.get(0)
    );
    result.map_err(|x| GraphError::CorruptIndex(format!("Key not found: {} ({})", key, x)))
}

// Executes the statement, which is expected to return a single string value.
// Then returns the value as an integer.
fn get_numeric_value(statement: &mut Statement, key: &str) -> Result<usize> {
    let value = get_string_value(statement, key)?;
    value.parse::<usize>().map_err(|x| GraphError::CorruptIndex(format!("Invalid value for key {}: {}", key, x)))
}

//-----------------------------------------------------------------------------

/// Type of a potential store file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreFileType {
    /// The file does not exist.
    Missing,
    /// The file is not a valid SQLite database.
    NotDatabase,
    /// The file is a SQLite database without a version tag.
    UnknownDatabase,
    /// The file is a SQLite database with the given version string.
    Version(String),
}

/// Determines the type of the given file without loading it.
pub fn identify_store<P: AsRef<Path>>(filename: P) -> StoreFileType {
    let Ok(metadata) = fs::metadata(&filename) else {
        return StoreFileType::Missing;
    };
    if !metadata.is_file() {
        return StoreFileType::NotDatabase;
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let Ok(connection) = Connection::open_with_flags(filename, flags) else {
        return StoreFileType::NotDatabase;
    };
    // SQLite only notices that a file is not a database when it is first read.
    let Ok(mut statement) = connection.prepare("SELECT value FROM Tags WHERE key = 'version'") else {
        let is_database = connection.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0)).is_ok();
        return if is_database { StoreFileType::UnknownDatabase } else { StoreFileType::NotDatabase };
    };
    match statement.query_row([], |row| row.get::<_, String>(0)) {
        Ok(version) => StoreFileType::Version(version),
        Err(_) => StoreFileType::UnknownDatabase,
    }
}

//-----------------------------------------------------------------------------
