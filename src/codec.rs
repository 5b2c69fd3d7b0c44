//! Graph file formats.
//!
//! - **Text**: one line per node, `node neighbor neighbor ...`, whitespace separated.
//! - **Binary**: back-to-back records of `[node][degree][neighbor × degree]`, every
//!   field a little-endian [`NodeId`]. No header and no overall length; a clean
//!   EOF between records ends the stream, an EOF inside a record is
//!   [`Error::Truncated`].
//! - **Weighted edge list**: CSV `actor,resource,weight` with a header row.
//!
//! Node order and neighbor order are unspecified in every format.

use crate::config::{CODEC_LOG_INTERVAL, WRITE_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::graph::{Adjacency, WeightedBipartiteGraph};
use crate::models::{NodeId, NODE_ID_BYTES};
use crate::stats::ProgressLog;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, warn};

pub fn write_text<W: Write>(adjacency: &Adjacency, mut writer: W) -> Result<()> {
    let mut progress = ProgressLog::new(
        "Text graph write",
        adjacency.node_count() as u64,
        CODEC_LOG_INTERVAL,
    );
    let mut ids = itoa::Buffer::new();

    for (written, (node, neighbors)) in adjacency.iter().enumerate() {
        writer.write_all(ids.format(node).as_bytes())?;
        for neighbor in neighbors {
            writer.write_all(b" ")?;
            writer.write_all(ids.format(*neighbor).as_bytes())?;
        }
        writer.write_all(b"\n")?;
        progress.update(written as u64 + 1);
    }

    writer.flush()?;
    Ok(())
}

/// Reads the text format.
///
/// A line whose first token is not a valid id is skipped; so is any single
/// malformed neighbor token. Repeated node lines are merged.
pub fn read_text<R: BufRead>(mut reader: R) -> Result<Adjacency> {
    let mut adjacency = Adjacency::new();
    let mut progress = ProgressLog::new("Text graph read", 0, CODEC_LOG_INTERVAL);
    let mut line = String::new();
    let mut line_no = 0u64;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        progress.update(line_no);

        let mut tokens = line.split_ascii_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        let node: NodeId = match first.parse() {
            Ok(node) => node,
            Err(e) => {
                warn!(line = line_no, token = first, error = %e, "Skipping line with malformed node id");
                continue;
            }
        };

        for token in tokens {
            match token.parse::<NodeId>() {
                Ok(neighbor) => {
                    adjacency.insert(node, neighbor);
                }
                Err(e) => {
                    warn!(line = line_no, token, error = %e, "Skipping malformed neighbor id")
                }
            }
        }
    }

    Ok(adjacency)
}

pub fn write_binary<W: Write>(adjacency: &Adjacency, mut writer: W) -> Result<()> {
    let mut progress = ProgressLog::new(
        "Binary graph write",
        adjacency.node_count() as u64,
        CODEC_LOG_INTERVAL,
    );

    for (written, (node, neighbors)) in adjacency.iter().enumerate() {
        let degree = NodeId::try_from(neighbors.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("node {node} has {} neighbors, too many to encode", neighbors.len()),
            )
        })?;
        writer.write_all(&node.to_le_bytes())?;
        writer.write_all(&degree.to_le_bytes())?;
        for neighbor in neighbors {
            writer.write_all(&neighbor.to_le_bytes())?;
        }
        progress.update(written as u64 + 1);
    }

    writer.flush()?;
    Ok(())
}

/// Iterator over the records of a binary graph stream.
///
/// Yields `(node, neighbors)` in file order. After an error the iterator is
/// exhausted.
pub struct BinaryRecords<R> {
    reader: R,
    offset: u64,
    finished: bool,
}

impl<R: Read> BinaryRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            finished: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fills one id; returns how many bytes arrived before EOF.
    fn fill_id(&mut self, bytes: &mut [u8; NODE_ID_BYTES]) -> Result<usize> {
        let mut filled = 0;
        while filled < NODE_ID_BYTES {
            match self.reader.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }

    fn read_id(&mut self, field: &str) -> Result<NodeId> {
        let mut bytes = [0u8; NODE_ID_BYTES];
        let filled = self.fill_id(&mut bytes)?;
        if filled < NODE_ID_BYTES {
            return Err(Error::Truncated {
                offset: self.offset,
                reason: format!("stream ended inside {field}"),
            });
        }
        Ok(NodeId::from_le_bytes(bytes))
    }

    fn read_record(&mut self) -> Result<Option<(NodeId, Vec<NodeId>)>> {
        let mut bytes = [0u8; NODE_ID_BYTES];
        match self.fill_id(&mut bytes)? {
            0 => return Ok(None),
            NODE_ID_BYTES => {}
            _ => {
                return Err(Error::Truncated {
                    offset: self.offset,
                    reason: "stream ended inside node id".into(),
                })
            }
        }
        let node = NodeId::from_le_bytes(bytes);
        let degree = self.read_id("degree")?;

        // Capacity is capped so a corrupt degree cannot force a huge allocation.
        let mut neighbors = Vec::with_capacity((degree as usize).min(1 << 16));
        for _ in 0..degree {
            neighbors.push(self.read_id("neighbor list")?);
        }
        Ok(Some((node, neighbors)))
    }
}

impl<R: Read> Iterator for BinaryRecords<R> {
    type Item = Result<(NodeId, Vec<NodeId>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Reads the binary format. Any truncation fails the whole read.
pub fn read_binary<R: Read>(reader: R) -> Result<Adjacency> {
    let mut adjacency = Adjacency::new();
    let mut progress = ProgressLog::new("Binary graph read", 0, CODEC_LOG_INTERVAL);

    for (read, record) in BinaryRecords::new(reader).enumerate() {
        let (node, neighbors) = record?;
        for neighbor in neighbors {
            adjacency.insert(node, neighbor);
        }
        progress.update(read as u64 + 1);
    }

    Ok(adjacency)
}

#[derive(Debug, Serialize, Deserialize)]
struct WeightedEdgeRow {
    actor: NodeId,
    resource: NodeId,
    weight: u32,
}

pub fn write_weighted_edges<W: Write>(graph: &WeightedBipartiteGraph, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (actor, resource, weight) in graph.edges() {
        csv_writer.serialize(WeightedEdgeRow {
            actor,
            resource,
            weight,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads a weighted edge list. Repeated pairs add up.
pub fn read_weighted_edges<R: Read>(reader: R) -> Result<WeightedBipartiteGraph> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut graph = WeightedBipartiteGraph::new();
    for row in csv_reader.deserialize::<WeightedEdgeRow>() {
        let row = row?;
        graph.add_weight(row.actor, row.resource, row.weight);
    }
    Ok(graph)
}

fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::with_capacity(WRITE_BUFFER_SIZE, File::create(path)?))
}

fn open_reader(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::with_capacity(WRITE_BUFFER_SIZE, File::open(path)?))
}

pub fn save_text(path: impl AsRef<Path>, adjacency: &Adjacency) -> Result<()> {
    let path = path.as_ref();
    write_text(adjacency, create_writer(path)?)?;
    info!(nodes = adjacency.node_count(), path = ?path, "Text graph saved");
    Ok(())
}

pub fn load_text(path: impl AsRef<Path>) -> Result<Adjacency> {
    let path = path.as_ref();
    let adjacency = read_text(open_reader(path)?)?;
    info!(nodes = adjacency.node_count(), path = ?path, "Text graph loaded");
    Ok(adjacency)
}

pub fn save_binary(path: impl AsRef<Path>, adjacency: &Adjacency) -> Result<()> {
    let path = path.as_ref();
    write_binary(adjacency, create_writer(path)?)?;
    info!(nodes = adjacency.node_count(), path = ?path, "Binary graph saved");
    Ok(())
}

pub fn load_binary(path: impl AsRef<Path>) -> Result<Adjacency> {
    let path = path.as_ref();
    let adjacency = read_binary(open_reader(path)?)?;
    info!(nodes = adjacency.node_count(), path = ?path, "Binary graph loaded");
    Ok(adjacency)
}

pub fn save_weighted_edges(path: impl AsRef<Path>, graph: &WeightedBipartiteGraph) -> Result<()> {
    let path = path.as_ref();
    write_weighted_edges(graph, create_writer(path)?)?;
    info!(edges = graph.edge_count(), path = ?path, "Weighted edge list saved");
    Ok(())
}

pub fn load_weighted_edges(path: impl AsRef<Path>) -> Result<WeightedBipartiteGraph> {
    read_weighted_edges(open_reader(path.as_ref())?)
}
