//! Collab Graph: activity-archive ingestion and collaboration graph construction
//!
//! This crate turns a large set of gzip-compressed NDJSON activity archives
//! (one JSON event per line, each naming an actor and a resource) into graphs:
//!
//! 1. **Ingestion** -- Many archives are opened (local file or HTTP), decompressed
//!    and decoded concurrently by a bounded worker pool; decoded records flow
//!    over a bounded channel into a single aggregator
//! 2. **Aggregation** -- The aggregator folds records into a bipartite
//!    actor -> resources graph, optionally weighted by event count
//! 3. **Projection** -- The bipartite graph is projected onto actors: two actors
//!    are linked when they touched a common resource
//! 4. **Serialization** -- Graphs are written as a whitespace text adjacency list,
//!    a little-endian binary listing, or a weighted CSV edge list
//!
//! # Architecture
//!
//! - **Bounded concurrency** -- Fixed worker count, bounded job and record
//!   channels, so memory stays flat however many archives are queued
//! - **Skip-and-continue** -- A missing, unreachable or corrupt archive is
//!   logged and skipped; one undecodable line is skipped without losing the
//!   rest of its archive
//! - **Single-writer aggregation** -- Graph maps are built on one thread and
//!   never locked
//! - **Parallel projection** -- rayon fold/reduce over per-thread partial graphs
//! - **Streaming projection** -- Projects straight from a binary resource
//!   listing without materializing the bipartite graph
//!
//! # Key Modules
//!
//! - [`source`] -- File and HTTP source providers
//! - [`decode`] -- Gzip NDJSON line decoding
//! - [`pipeline`] -- Worker pool, channels and completion barrier
//! - [`aggregate`] -- Record folds producing graphs
//! - [`graph`] -- Bipartite, resource, projected and weighted graph types
//! - [`project`] -- Two-pass and streaming projection
//! - [`codec`] -- Text, binary and weighted CSV graph formats
//! - [`validate`] -- NDJSON pre-flight check
//! - [`schema`] -- Record shape inference
//! - [`stats`] -- Atomic ingestion counters and progress logging
//! - [`config`] -- Constants and pipeline settings
//! - [`error`] -- Library error type
//!
//! # Performance Notes
//!
//! - **FxHashMap** instead of SipHash for integer ids from trusted input
//! - **Buffer sizes** -- 5MB line reader per archive, 256KB for graph files
//! - **Owned lines** -- Each record copies its line out of the reused read
//!   buffer, so the buffer is never shared across threads
//!
//! # Example Usage
//!
//! ```bash
//! # Unweighted collaboration graph from local archives
//! collab-graph -v collab data/2024-01-01-*.json.gz -o collab.txt
//!
//! # Weighted edge list from HTTP archives listed in a file
//! collab-graph weighted-collab -t http --jobs-file urls.txt -o weighted.csv
//!
//! # Resource listing, then streaming projection onto actors
//! collab-graph resource-graph collab.txt -o resources.bin
//! collab-graph project --from resource-binary resources.bin -o projected.txt
//! ```

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod decode;
pub mod error;
pub mod graph;
pub mod models;
pub mod pipeline;
pub mod project;
pub mod schema;
pub mod source;
pub mod stats;
pub mod validate;

pub use error::{Error, Result};
