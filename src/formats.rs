//! Support for reading and writing GFA files.
//!
//! The GFA format is a text-based format for representing sequence graphs.
//! See [the specification](https://github.com/GFA-spec/GFA-spec/blob/master/GFA1.md) for details.
//!
//! ### Reading
//!
//! [`read_gfa`] parses GFA version 1 into a [`SequenceGraph`].
//! Only the subset used for gene variant graphs is supported:
//!
//! * `S` lines with integer segment names; an optional `RC:i` tag is read as the read count of the node.
//! * `L` lines between forward-oriented segments, with an overlap of the form `<n>M` or `*`.
//! * `P` lines over forward-oriented segments. Path overlaps are taken from the links.
//!
//! Header lines and all other record types are ignored.
//!
//! ### Writing
//!
//! The following functions support line-by-line writing of GFA version 1.0:
//!
//! * [`write_gfa_header`]: Write a GFA file header.
//! * [`write_gfa_segment`]: Write a segment line for a node, with optional tags.
//! * [`write_gfa_link`]: Write a link line for an edge.
//! * [`write_gfa_path`]: Write a path line.

use crate::{GraphError, Result, SequenceGraph};
use crate::utils;

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;


//-----------------------------------------------------------------------------

/// An optional `TAG:TYPE:VALUE` field of a GFA line.
///
/// The value is kept as bytes.
/// Integer and character values are checked when the field is parsed, as the read count of a segment is an integer field.
///
/// # Examples
///
/// ```
/// use groot_graph::formats::TypedField;
///
/// let field = TypedField::parse(b"RC:i:160").unwrap();
/// assert_eq!(field.tag, TypedField::READ_COUNT);
/// assert_eq!(field.as_int(), Some(160));
/// assert_eq!(field, TypedField::int(TypedField::READ_COUNT, 160));
/// assert_eq!(field.to_string(), "RC:i:160");
///
/// // Other types are kept but not interpreted.
/// assert_eq!(TypedField::parse(b"NM:Z:argannot").unwrap().as_int(), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedField {
    pub tag: [u8; 2],
    pub field_type: u8,
    pub value: Vec<u8>,
}

impl TypedField {
    /// Tag for the read count of a segment.
    pub const READ_COUNT: [u8; 2] = [b'R', b'C'];

    // Field types defined for GFA 1.
    const TYPES: &'static [u8] = b"AifZJHB";

    /// Parses the field from a `TAG:TYPE:VALUE` string.
    ///
    /// Returns an error if the field is malformed, the type is unknown, or an integer or character value is invalid.
    pub fn parse(field: &[u8]) -> std::result::Result<Self, String> {
        if field.len() < 5 || field[2] != b':' || field[4] != b':' || !Self::TYPES.contains(&field[3]) {
            return Err(format!("Invalid typed field: {}", String::from_utf8_lossy(field)));
        }
        let result = TypedField { tag: [field[0], field[1]], field_type: field[3], value: field[5..].to_vec() };
        match result.field_type {
            b'A' if result.value.len() != 1 => Err(format!("Invalid char field: {}", String::from_utf8_lossy(field))),
            b'i' if result.parse_int().is_none() => Err(format!("Invalid int field: {}", String::from_utf8_lossy(field))),
            _ => Ok(result),
        }
    }

    /// Creates an integer field.
    pub fn int(tag: [u8; 2], value: isize) -> Self {
        TypedField { tag, field_type: b'i', value: value.to_string().into_bytes() }
    }

    /// Returns the value of an integer field, or [`None`] for other types.
    pub fn as_int(&self) -> Option<isize> {
        if self.field_type == b'i' { self.parse_int() } else { None }
    }

    fn parse_int(&self) -> Option<isize> {
        std::str::from_utf8(&self.value).ok()?.parse::<isize>().ok()
    }

    /// Appends the field to the given buffer, preceded by a tab character.
    pub fn append_to(&self, buffer: &mut Vec<u8>) {
        buffer.push(b'\t');
        buffer.extend_from_slice(&self.tag);
        buffer.push(b':');
        buffer.push(self.field_type);
        buffer.push(b':');
        buffer.extend_from_slice(&self.value);
    }
}

impl Display for TypedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buffer: Vec<u8> = Vec::new();
        self.append_to(&mut buffer);
        write!(f, "{}", String::from_utf8_lossy(&buffer[1..]))
    }
}

//-----------------------------------------------------------------------------

/// Reads a GFA file, which may be gzip-compressed.
pub fn load_gfa<P: AsRef<Path>>(filename: P) -> Result<SequenceGraph> {
    let mut reader = utils::open_file(filename)?;
    read_gfa(&mut reader)
}

/// Parses GFA lines from the reader into a graph description.
///
/// See the module documentation for the supported subset.
/// Returns [`GraphError::Parse`] with a 1-based line number if a line cannot be parsed.
///
/// # Examples
///
/// ```
/// use groot_graph::{formats, GraphDescription};
///
/// let gfa = b"H\tVN:Z:1.0\nS\t1\tGATT\nS\t2\tACA\tRC:i:3\nL\t1\t+\t2\t+\t0M\nP\tx\t1+,2+\t*\n";
/// let description = formats::read_gfa(&mut &gfa[..]).unwrap();
/// assert_eq!(description.segments().count(), 2);
/// assert_eq!(description.segments().map(|s| s.read_count).sum::<usize>(), 3);
/// assert_eq!(description.paths().next().unwrap().walk, vec![1, 2]);
/// ```
pub fn read_gfa<R: BufRead>(reader: &mut R) -> Result<SequenceGraph> {
    let mut result = SequenceGraph::new();
    let mut line_num = 0;
    let mut buf: Vec<u8> = Vec::new();
    loop {
        buf.clear();
        let len = reader.read_until(b'\n', &mut buf)?;
        if len == 0 {
            break;
        }
        line_num += 1;
        while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
            buf.pop();
        }
        if buf.is_empty() {
            continue;
        }

        let fields: Vec<&[u8]> = buf.split(|c| *c == b'\t').collect();
        match fields[0] {
            b"S" => parse_segment(&fields, line_num, &mut result)?,
            b"L" => parse_link(&fields, line_num, &mut result)?,
            b"P" => parse_path(&fields, line_num, &mut result)?,
            _ => {},
        }
    }

    Ok(result)
}

fn parse_usize(field: &[u8], line_num: usize, what: &str) -> Result<usize> {
    let value = std::str::from_utf8(field).ok().and_then(|s| s.parse::<usize>().ok());
    value.ok_or_else(|| GraphError::parse(line_num, format!("Invalid {}: {}", what, String::from_utf8_lossy(field))))
}

fn parse_forward(field: &[u8], line_num: usize) -> Result<()> {
    match field {
        b"+" => Ok(()),
        b"-" => Err(GraphError::parse(line_num, "Reverse orientation is not supported")),
        _ => Err(GraphError::parse(line_num, format!("Invalid orientation: {}", String::from_utf8_lossy(field)))),
    }
}

fn parse_segment(fields: &[&[u8]], line_num: usize, graph: &mut SequenceGraph) -> Result<()> {
    if fields.len() < 3 {
        return Err(GraphError::parse(line_num, "Segment line has too few fields"));
    }
    let id = parse_usize(fields[1], line_num, "segment name")?;
    let sequence = fields[2];
    if sequence == b"*" {
        return Err(GraphError::parse(line_num, "Segments without sequence are not supported"));
    }
    let mut read_count = 0;
    for field in fields[3..].iter() {
        let field = TypedField::parse(field).map_err(|message| GraphError::parse(line_num, message))?;
        if field.tag != TypedField::READ_COUNT {
            continue;
        }
        if let Some(value) = field.as_int() {
            read_count = usize::try_from(value).map_err(|_| {
                GraphError::parse(line_num, format!("Negative read count: {}", value))
            })?;
        }
    }
    graph.add_segment_with_reads(id, sequence, read_count);
    Ok(())
}

fn parse_link(fields: &[&[u8]], line_num: usize, graph: &mut SequenceGraph) -> Result<()> {
    if fields.len() < 6 {
        return Err(GraphError::parse(line_num, "Link line has too few fields"));
    }
    let from = parse_usize(fields[1], line_num, "segment name")?;
    parse_forward(fields[2], line_num)?;
    let to = parse_usize(fields[3], line_num, "segment name")?;
    parse_forward(fields[4], line_num)?;
    let overlap = parse_overlap(fields[5], line_num)?;
    graph.add_link(from, to, overlap);
    Ok(())
}

// Accepts `*` and a CIGAR string consisting of a single match operation.
fn parse_overlap(field: &[u8], line_num: usize) -> Result<usize> {
    if field == b"*" {
        return Ok(0);
    }
    match field.split_last() {
        Some((&b'M', length)) if !length.is_empty() => parse_usize(length, line_num, "overlap"),
        _ => Err(GraphError::parse(line_num, format!("Unsupported overlap: {}", String::from_utf8_lossy(field)))),
    }
}

fn parse_path(fields: &[&[u8]], line_num: usize, graph: &mut SequenceGraph) -> Result<()> {
    if fields.len() < 3 {
        return Err(GraphError::parse(line_num, "Path line has too few fields"));
    }
    let name = fields[1];
    let mut walk: Vec<usize> = Vec::new();
    for step in fields[2].split(|c| *c == b',') {
        match step.split_last() {
            Some((orientation, id)) if !id.is_empty() => {
                parse_forward(std::slice::from_ref(orientation), line_num)?;
                walk.push(parse_usize(id, line_num, "segment name")?);
            },
            _ => return Err(GraphError::parse(line_num, format!("Invalid path step: {}", String::from_utf8_lossy(step)))),
        }
    }
    graph.add_path(name, &walk);
    Ok(())
}

//-----------------------------------------------------------------------------

/// Writes the GFA header line.
pub fn write_gfa_header<T: Write>(output: &mut T) -> io::Result<()> {
    output.write_all(b"H\tVN:Z:1.0\n")?;
    Ok(())
}

/// Writes a GFA segment line corresponding to a node with an integer identifier.
pub fn write_gfa_segment<T: Write>(node_id: usize, sequence: &[u8], tags: &[TypedField], output: &mut T) -> io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();

    buffer.extend_from_slice(b"S\t");
    buffer.extend_from_slice(node_id.to_string().as_bytes());
    buffer.push(b'\t');
    buffer.extend_from_slice(sequence);
    for tag in tags {
        tag.append_to(&mut buffer);
    }
    buffer.push(b'\n');

    output.write_all(&buffer)?;
    Ok(())
}

/// Writes a GFA link line corresponding to an edge between two forward-oriented nodes.
pub fn write_gfa_link<T: Write>(from: usize, to: usize, overlap: usize, output: &mut T) -> io::Result<()> {
    let line = format!("L\t{}\t+\t{}\t+\t{}M\n", from, to, overlap);
    output.write_all(line.as_bytes())?;
    Ok(())
}

/// Writes a GFA path line over forward-oriented nodes.
///
/// The overlaps field is written as `*`.
pub fn write_gfa_path<T: Write>(name: &[u8], walk: &[usize], output: &mut T) -> io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();

    buffer.extend_from_slice(b"P\t");
    buffer.extend_from_slice(name);
    buffer.push(b'\t');
    for (i, node_id) in walk.iter().enumerate() {
        if i > 0 {
            buffer.push(b',');
        }
        buffer.extend_from_slice(node_id.to_string().as_bytes());
        buffer.push(b'+');
    }
    buffer.extend_from_slice(b"\t*\n");

    output.write_all(&buffer)?;
    Ok(())
}

//-----------------------------------------------------------------------------
