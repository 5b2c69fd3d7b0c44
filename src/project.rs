//! One-mode projection: actors linked when they share a resource.
//!
//! Two strategies produce the same [`ProjectedGraph`]:
//!
//! 1. **Two-pass** -- invert the materialized [`BipartiteGraph`] into a
//!    [`ResourceGraph`], then emit every actor pair of every resource. Resources
//!    are processed in parallel (rayon fold/reduce over per-thread graphs).
//! 2. **Streaming** -- read a binary resource -> actors listing record by record
//!    and emit pairs straight from each decoded actor list, never holding the
//!    bipartite graph in memory.
//!
//! Cost per resource is quadratic in its fan-in. A handful of very popular
//! resources dominate the run and give their actors enormous degree, so the
//! result is a poor direct input for degree-sensitive algorithms unless
//! [`ProjectionOptions::max_fan_in`] cuts those resources out.

use crate::codec::BinaryRecords;
use crate::config::{STREAM_LOG_BYTES, WRITE_BUFFER_SIZE};
use crate::error::Result;
use crate::graph::{BipartiteGraph, ProjectedGraph, ResourceGraph};
use crate::models::NodeId;
use crate::stats::ProgressLog;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Skip resources with more distinct actors than this.
    pub max_fan_in: Option<usize>,
}

impl ProjectionOptions {
    fn admits(&self, fan_in: usize) -> bool {
        self.max_fan_in.is_none_or(|max| fan_in <= max)
    }
}

/// Inserts every unordered pair of `actors`; `actors` must be duplicate-free.
fn emit_pairs(actors: &[NodeId], out: &mut ProjectedGraph) {
    for (i, a) in actors.iter().enumerate() {
        for b in &actors[i + 1..] {
            out.insert_pair(*a, *b);
        }
    }
}

impl BipartiteGraph {
    /// Two-pass projection with no fan-in cutoff.
    pub fn project(&self) -> ProjectedGraph {
        project_two_pass(self, ProjectionOptions::default())
    }
}

impl ResourceGraph {
    pub fn project(&self) -> ProjectedGraph {
        project_resources(self, ProjectionOptions::default())
    }
}

pub fn project_two_pass(graph: &BipartiteGraph, options: ProjectionOptions) -> ProjectedGraph {
    let resources = graph.invert();
    debug!(
        actors = graph.actor_count(),
        resources = resources.resource_count(),
        "Inverted collab graph"
    );
    project_resources(&resources, options)
}

/// Second pass of the two-pass strategy.
pub fn project_resources(resources: &ResourceGraph, options: ProjectionOptions) -> ProjectedGraph {
    let skipped = AtomicU64::new(0);

    let projected = resources
        .as_adjacency()
        .par_iter()
        .fold(ProjectedGraph::new, |mut acc, (_, actors)| {
            if !options.admits(actors.len()) {
                skipped.fetch_add(1, Ordering::Relaxed);
                return acc;
            }
            let actors: Vec<NodeId> = actors.iter().copied().collect();
            emit_pairs(&actors, &mut acc);
            acc
        })
        .reduce(ProjectedGraph::new, |mut left, right| {
            left.merge(right);
            left
        });

    info!(
        resources = resources.resource_count(),
        skipped_resources = skipped.load(Ordering::Relaxed),
        edges = projected.edge_count(),
        "Projection complete"
    );
    projected
}

/// Streaming strategy over a binary resource -> actors listing.
///
/// `total_bytes` only feeds the progress ETA; pass 0 when unknown. A truncated
/// listing fails the whole projection.
pub fn project_resource_listing<R: Read>(
    reader: R,
    total_bytes: u64,
    options: ProjectionOptions,
) -> Result<ProjectedGraph> {
    let mut projected = ProjectedGraph::new();
    let mut records = BinaryRecords::new(reader);
    let mut progress = ProgressLog::new("Streaming projection", total_bytes, STREAM_LOG_BYTES);
    let mut resources = 0u64;
    let mut skipped = 0u64;

    while let Some(record) = records.next() {
        let (_resource, mut actors) = record?;
        resources += 1;
        actors.sort_unstable();
        actors.dedup();

        if options.admits(actors.len()) {
            emit_pairs(&actors, &mut projected);
        } else {
            skipped += 1;
        }
        progress.update(records.offset());
    }

    info!(
        resources,
        skipped_resources = skipped,
        edges = projected.edge_count(),
        "Streaming projection complete"
    );
    Ok(projected)
}

pub fn project_resource_file(
    path: impl AsRef<Path>,
    options: ProjectionOptions,
) -> Result<ProjectedGraph> {
    let file = File::open(path.as_ref())?;
    let total_bytes = file.metadata()?.len();
    project_resource_listing(
        BufReader::with_capacity(WRITE_BUFFER_SIZE, file),
        total_bytes,
        options,
    )
}
