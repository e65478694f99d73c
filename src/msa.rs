//! Multiple sequence alignments as an input route for variation graphs.
//!
//! A gene family is often distributed as an aligned FASTA file, where every row has the same length and `-` or `.` marks a gap.
//! [`Msa::to_graph`] converts the alignment into a [`SequenceGraph`] with one path per row.
//! The conversion first creates a node for each distinct base in each column, connects consecutive bases of each row,
//! and then merges unary chains of nodes that are visited by the same rows.

use crate::{GraphError, Result, SequenceGraph};
use crate::utils;

use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A multiple sequence alignment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Msa {
    names: Vec<Vec<u8>>,
    rows: Vec<Vec<u8>>,
}

impl Msa {
    /// Returns `true` if the byte is a gap character.
    #[inline]
    pub fn is_gap(byte: u8) -> bool {
        byte == b'-' || byte == b'.'
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the alignment has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of columns.
    pub fn columns(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    /// Returns the name of the given row.
    pub fn name(&self, row: usize) -> Option<&[u8]> {
        self.names.get(row).map(|name| name.as_slice())
    }

    /// Returns the aligned row with gaps.
    pub fn row(&self, row: usize) -> Option<&[u8]> {
        self.rows.get(row).map(|row| row.as_slice())
    }

    /// Returns the sequence of the given row without gaps.
    pub fn ungapped(&self, row: usize) -> Option<Vec<u8>> {
        self.rows.get(row).map(|row| row.iter().copied().filter(|byte| !Self::is_gap(*byte)).collect())
    }
}

//-----------------------------------------------------------------------------

/// Reads an aligned FASTA file, which may be gzip-compressed.
pub fn load_msa<P: AsRef<Path>>(filename: P) -> Result<Msa> {
    let mut reader = utils::open_file(filename)?;
    read_msa(&mut reader)
}

/// Parses an aligned FASTA file.
///
/// The name of a row is the header line without the leading `>`.
/// Sequence lines are concatenated, and whitespace is ignored.
///
/// # Errors
///
/// Returns [`GraphError::Parse`] if there is sequence data before the first header,
/// if a row is empty, or if the rows have different lengths.
pub fn read_msa<R: BufRead>(reader: &mut R) -> Result<Msa> {
    let mut result = Msa::default();
    let mut line_num = 0;
    let mut header_line = 0;
    let mut buf: Vec<u8> = Vec::new();
    loop {
        buf.clear();
        let len = reader.read_until(b'\n', &mut buf)?;
        if len == 0 {
            break;
        }
        line_num += 1;
        while buf.last().map_or(false, |byte| byte.is_ascii_whitespace()) {
            buf.pop();
        }
        if buf.is_empty() {
            continue;
        }

        if buf[0] == b'>' {
            check_last_row(&result, header_line)?;
            result.names.push(buf[1..].to_vec());
            result.rows.push(Vec::new());
            header_line = line_num;
        } else {
            let row = result.rows.last_mut().ok_or_else(|| {
                GraphError::parse(line_num, "Sequence data before the first header")
            })?;
            row.extend(buf.iter().copied().filter(|byte| !byte.is_ascii_whitespace()));
        }
    }
    check_last_row(&result, header_line)?;

    Ok(result)
}

// Checks that the last row is non-empty and as long as the first row.
fn check_last_row(msa: &Msa, header_line: usize) -> Result<()> {
    if let Some(row) = msa.rows.last() {
        if row.is_empty() {
            return Err(GraphError::parse(header_line, "Empty alignment row"));
        }
        if row.len() != msa.columns() {
            return Err(GraphError::parse(header_line, format!(
                "Alignment row has length {} (expected {})", row.len(), msa.columns()
            )));
        }
    }
    Ok(())
}

//-----------------------------------------------------------------------------

// A node before compaction, identified by its position in creation order.
struct ColumnNode {
    base: u8,
    rows: Vec<usize>,
    predecessors: BTreeSet<usize>,
    successors: BTreeSet<usize>,
}

impl Msa {
    /// Converts the alignment into a graph description.
    ///
    /// Node identifiers start from 1 and follow column order.
    /// Path `i` corresponds to row `i` and reproduces the ungapped sequence of the row.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::GraphConstruction`] if the alignment is empty or a row consists only of gaps.
    ///
    /// # Examples
    ///
    /// ```
    /// use groot_graph::{msa, BuildParams, GrootGraph};
    ///
    /// let fasta = b">a\nGATTACA\n>b\nGAT-ACA\n>c\nGACTACA\n";
    /// let alignment = msa::read_msa(&mut &fasta[..]).unwrap();
    /// let description = alignment.to_graph().unwrap();
    /// let graph = GrootGraph::new(&description, &BuildParams::default()).unwrap();
    /// assert_eq!(graph.graph2seq(1).unwrap(), b"GATACA");
    /// assert_eq!(graph.graph2seq(2).unwrap(), b"GACTACA");
    /// ```
    pub fn to_graph(&self) -> Result<SequenceGraph> {
        if self.is_empty() {
            return Err(GraphError::construction("The alignment is empty"));
        }

        // One node for each distinct base in each column.
        let mut nodes: Vec<ColumnNode> = Vec::new();
        let mut walks: Vec<Vec<usize>> = vec![Vec::new(); self.len()];
        for column in 0..self.columns() {
            let first_node = nodes.len();
            for (row, walk) in walks.iter_mut().enumerate() {
                let base = self.rows[row][column];
                if Self::is_gap(base) {
                    continue;
                }
                let node = match nodes[first_node..].iter().position(|node| node.base == base) {
                    Some(offset) => first_node + offset,
                    None => {
                        nodes.push(ColumnNode { base, rows: Vec::new(), predecessors: BTreeSet::new(), successors: BTreeSet::new() });
                        nodes.len() - 1
                    },
                };
                nodes[node].rows.push(row);
                if let Some(prev) = walk.last() {
                    nodes[*prev].successors.insert(node);
                    nodes[node].predecessors.insert(*prev);
                }
                walk.push(node);
            }
        }
        if let Some(row) = walks.iter().position(|walk| walk.is_empty()) {
            return Err(GraphError::construction(format!(
                "Row {} consists only of gaps", String::from_utf8_lossy(&self.names[row])
            )));
        }

        // Merge a node into its predecessor if they form a unary chain visited by the same rows.
        let mut group: Vec<usize> = Vec::with_capacity(nodes.len());
        let mut sequences: Vec<Vec<u8>> = Vec::new();
        for node in nodes.iter() {
            let merge_into = match node.predecessors.first() {
                Some(prev) if node.predecessors.len() == 1 && nodes[*prev].successors.len() == 1 && nodes[*prev].rows == node.rows => {
                    Some(group[*prev])
                },
                _ => None,
            };
            match merge_into {
                Some(target) => {
                    sequences[target].push(node.base);
                    group.push(target);
                },
                None => {
                    group.push(sequences.len());
                    sequences.push(vec![node.base]);
                },
            }
        }

        let mut result = SequenceGraph::new();
        for (i, sequence) in sequences.iter().enumerate() {
            result.add_segment(i + 1, sequence);
        }
        let mut links: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (row, walk) in walks.iter().enumerate() {
            let mut compacted: Vec<usize> = walk.iter().map(|node| group[*node] + 1).collect();
            compacted.dedup();
            for pair in compacted.windows(2) {
                links.insert((pair[0], pair[1]));
            }
            result.add_path(&self.names[row], &compacted);
        }
        for (from, to) in links {
            result.add_link(from, to, 0);
        }

        Ok(result)
    }
}

//-----------------------------------------------------------------------------
