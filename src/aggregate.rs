//! Single-consumer folds over the decoded record channel.

use crate::graph::{BipartiteGraph, WeightedBipartiteGraph};
use crate::models::{ActivityEvent, RawRecord};
use crossbeam_channel::Receiver;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Folds every record of a pipeline run into one result.
///
/// `fold` runs on exactly one thread and drains `records` until the pipeline
/// closes the channel. The result must not depend on record order, because
/// records from different sources interleave arbitrarily.
pub trait Aggregator {
    type Record: DeserializeOwned + Send;
    type Output;

    fn fold(self, records: Receiver<RawRecord<Self::Record>>) -> Self::Output;
}

/// Builds the unweighted actor -> resources graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollabFold;

impl Aggregator for CollabFold {
    type Record = ActivityEvent;
    type Output = BipartiteGraph;

    fn fold(self, records: Receiver<RawRecord<ActivityEvent>>) -> BipartiteGraph {
        let mut graph = BipartiteGraph::new();
        for record in records {
            let (actor, resource) = record.value.edge();
            graph.insert_edge(actor, resource);
        }
        debug!(
            actors = graph.actor_count(),
            edges = graph.edge_count(),
            "Collab fold finished"
        );
        graph
    }
}

/// Builds the actor -> resource graph weighted by record count.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedCollabFold;

impl Aggregator for WeightedCollabFold {
    type Record = ActivityEvent;
    type Output = WeightedBipartiteGraph;

    fn fold(self, records: Receiver<RawRecord<ActivityEvent>>) -> WeightedBipartiteGraph {
        let mut graph = WeightedBipartiteGraph::new();
        for record in records {
            let (actor, resource) = record.value.edge();
            graph.increment(actor, resource);
        }
        debug!(
            actors = graph.actor_count(),
            edges = graph.edge_count(),
            "Weighted collab fold finished"
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_line;

    fn feed(lines: &[&str]) -> Receiver<RawRecord<ActivityEvent>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        for (i, line) in lines.iter().enumerate() {
            tx.send(decode_line(line.as_bytes(), i as u64 + 1).unwrap())
                .unwrap();
        }
        rx
    }

    const REPEATED: [&str; 2] = [
        r#"{"actor":{"id":1},"repo":{"id":2}}"#,
        r#"{"actor":{"id":1},"repo":{"id":2}}"#,
    ];

    #[test]
    fn collab_fold_deduplicates() {
        let graph = CollabFold.fold(feed(&REPEATED));
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains_edge(1, 2));
    }

    #[test]
    fn weighted_fold_counts() {
        let graph = WeightedCollabFold.fold(feed(&REPEATED));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.weight(1, 2), 2);
    }

    #[test]
    fn fold_of_empty_channel_is_empty() {
        let graph = CollabFold.fold(feed(&[]));
        assert_eq!(graph.actor_count(), 0);
    }
}
