//! Adjacency structures for the actor/resource collaboration graph.
//!
//! [`Adjacency`] is the untyped node -> neighbor-set map shared by every graph
//! and by the codecs. The wrappers give it a meaning so actor ids and resource
//! ids are never mixed up:
//!
//! - [`BipartiteGraph`] -- actor -> resources
//! - [`ResourceGraph`] -- resource -> actors (the inverse)
//! - [`ProjectedGraph`] -- actor <-> actor, each edge stored once under the larger id
//! - [`WeightedBipartiteGraph`] -- actor -> (resource -> interaction count)
//!
//! None of these types synchronize internally; a single aggregator owns them.

use crate::models::NodeId;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// Node -> neighbor set. A node without neighbors has no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjacency {
    nodes: FxHashMap<NodeId, FxHashSet<NodeId>>,
}

impl Adjacency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: FxHashMap::with_capacity_and_hasher(nodes, Default::default()),
        }
    }

    /// Inserts `node -> neighbor`, returning false if it was already present.
    pub fn insert(&mut self, node: NodeId, neighbor: NodeId) -> bool {
        self.nodes.entry(node).or_default().insert(neighbor)
    }

    pub fn neighbors(&self, node: NodeId) -> Option<&FxHashSet<NodeId>> {
        self.nodes.get(&node)
    }

    pub fn contains(&self, node: NodeId, neighbor: NodeId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|neighbors| neighbors.contains(&neighbor))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of stored (node, neighbor) pairs.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &FxHashSet<NodeId>)> {
        self.nodes.iter().map(|(node, neighbors)| (*node, neighbors))
    }

    pub fn par_iter(&self) -> impl ParallelIterator<Item = (NodeId, &FxHashSet<NodeId>)> {
        self.nodes
            .par_iter()
            .map(|(node, neighbors)| (*node, neighbors))
    }

    /// Folds every pair of `other` into `self`.
    pub fn merge(&mut self, other: Adjacency) {
        if self.nodes.is_empty() {
            self.nodes = other.nodes;
            return;
        }
        for (node, neighbors) in other.nodes {
            self.nodes.entry(node).or_default().extend(neighbors);
        }
    }

    /// Map with keys and values swapped.
    pub fn inverted(&self) -> Adjacency {
        let mut inverse = Adjacency::new();
        for (node, neighbors) in &self.nodes {
            for neighbor in neighbors {
                inverse.insert(*neighbor, *node);
            }
        }
        inverse
    }
}

/// Actor -> resources observed together in at least one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BipartiteGraph {
    adjacency: Adjacency,
}

impl BipartiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_adjacency(adjacency: Adjacency) -> Self {
        Self { adjacency }
    }

    /// Idempotent: inserting the same edge twice leaves the graph unchanged.
    pub fn insert_edge(&mut self, actor: NodeId, resource: NodeId) -> bool {
        self.adjacency.insert(actor, resource)
    }

    pub fn resources_of(&self, actor: NodeId) -> Option<&FxHashSet<NodeId>> {
        self.adjacency.neighbors(actor)
    }

    pub fn contains_edge(&self, actor: NodeId, resource: NodeId) -> bool {
        self.adjacency.contains(actor, resource)
    }

    pub fn actor_count(&self) -> usize {
        self.adjacency.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.edge_count()
    }

    /// Resource -> actors view of the same edges.
    pub fn invert(&self) -> ResourceGraph {
        ResourceGraph::from_adjacency(self.adjacency.inverted())
    }

    pub fn as_adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    pub fn into_adjacency(self) -> Adjacency {
        self.adjacency
    }
}

/// Resource -> actors that touched it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceGraph {
    adjacency: Adjacency,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_adjacency(adjacency: Adjacency) -> Self {
        Self { adjacency }
    }

    pub fn insert(&mut self, resource: NodeId, actor: NodeId) -> bool {
        self.adjacency.insert(resource, actor)
    }

    pub fn actors_of(&self, resource: NodeId) -> Option<&FxHashSet<NodeId>> {
        self.adjacency.neighbors(resource)
    }

    /// Number of distinct actors on `resource`.
    pub fn fan_in(&self, resource: NodeId) -> usize {
        self.actors_of(resource).map_or(0, |actors| actors.len())
    }

    pub fn resource_count(&self) -> usize {
        self.adjacency.node_count()
    }

    pub fn as_adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    pub fn into_adjacency(self) -> Adjacency {
        self.adjacency
    }
}

/// Undirected actor <-> actor graph.
///
/// Edge {a, b} is stored once, as `max(a, b) -> min(a, b)`. Self-loops are
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedGraph {
    adjacency: Adjacency,
}

impl ProjectedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an adjacency read back from disk, re-orienting any pair stored the
    /// wrong way round and dropping self-loops.
    pub fn from_adjacency(adjacency: Adjacency) -> Self {
        let canonical = adjacency
            .iter()
            .all(|(node, neighbors)| neighbors.iter().all(|n| *n < node));
        if canonical {
            return Self { adjacency };
        }
        let mut graph = ProjectedGraph::new();
        for (node, neighbors) in adjacency.iter() {
            for neighbor in neighbors {
                graph.insert_pair(node, *neighbor);
            }
        }
        graph
    }

    /// Inserts the undirected edge {a, b}. Returns false for self-loops and
    /// edges already present.
    pub fn insert_pair(&mut self, a: NodeId, b: NodeId) -> bool {
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => self.adjacency.insert(a, b),
            std::cmp::Ordering::Less => self.adjacency.insert(b, a),
            std::cmp::Ordering::Equal => false,
        }
    }

    /// Orientation-independent membership test.
    pub fn contains_edge(&self, a: NodeId, b: NodeId) -> bool {
        if a > b {
            self.adjacency.contains(a, b)
        } else {
            self.adjacency.contains(b, a)
        }
    }

    /// Smaller-id neighbors stored under `node`.
    pub fn lower_neighbors(&self, node: NodeId) -> Option<&FxHashSet<NodeId>> {
        self.adjacency.neighbors(node)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.edge_count()
    }

    pub fn merge(&mut self, other: ProjectedGraph) {
        self.adjacency.merge(other.adjacency);
    }

    pub fn as_adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    pub fn into_adjacency(self) -> Adjacency {
        self.adjacency
    }
}

/// Actor -> resource -> number of records seen for that pair.
///
/// Counts saturate at `u32::MAX`; past that the weight stops growing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightedBipartiteGraph {
    nodes: FxHashMap<NodeId, FxHashMap<NodeId, u32>>,
}

impl WeightedBipartiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to the (actor, resource) weight and returns the new weight.
    pub fn increment(&mut self, actor: NodeId, resource: NodeId) -> u32 {
        self.add_weight(actor, resource, 1)
    }

    pub fn add_weight(&mut self, actor: NodeId, resource: NodeId, weight: u32) -> u32 {
        let slot = self
            .nodes
            .entry(actor)
            .or_default()
            .entry(resource)
            .or_insert(0);
        *slot = slot.saturating_add(weight);
        *slot
    }

    /// 0 when the pair was never observed.
    pub fn weight(&self, actor: NodeId, resource: NodeId) -> u32 {
        self.nodes
            .get(&actor)
            .and_then(|resources| resources.get(&resource))
            .copied()
            .unwrap_or(0)
    }

    pub fn actor_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|r| r.len()).sum()
    }

    /// All (actor, resource, weight) triples in no particular order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, u32)> + '_ {
        self.nodes.iter().flat_map(|(actor, resources)| {
            resources
                .iter()
                .map(move |(resource, weight)| (*actor, *resource, *weight))
        })
    }

    /// Drops the weights.
    pub fn to_unweighted(&self) -> BipartiteGraph {
        let mut graph = BipartiteGraph::new();
        for (actor, resource, _) in self.edges() {
            graph.insert_edge(actor, resource);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_and_order_free() {
        let edges = [(1, 2), (1, 3), (4, 2), (1, 2), (4, 2)];

        let mut forward = BipartiteGraph::new();
        for (a, r) in edges {
            forward.insert_edge(a, r);
        }
        let mut reversed = BipartiteGraph::new();
        for (a, r) in edges.iter().rev() {
            reversed.insert_edge(*a, *r);
        }

        assert_eq!(forward, reversed);
        assert_eq!(forward.edge_count(), 3);
        assert_eq!(forward.actor_count(), 2);
    }

    #[test]
    fn insert_reports_new_edges() {
        let mut graph = BipartiteGraph::new();
        assert!(graph.insert_edge(1, 2));
        assert!(!graph.insert_edge(1, 2));
        assert!(graph.contains_edge(1, 2));
        assert!(!graph.contains_edge(2, 1));
    }

    #[test]
    fn invert_swaps_sides() {
        let mut graph = BipartiteGraph::new();
        graph.insert_edge(1, 2);
        graph.insert_edge(1, 3);
        graph.insert_edge(4, 2);

        let resources = graph.invert();
        assert_eq!(resources.resource_count(), 2);
        assert_eq!(resources.fan_in(2), 2);
        assert_eq!(resources.fan_in(3), 1);
        assert_eq!(resources.fan_in(99), 0);
        assert!(resources.actors_of(2).unwrap().contains(&4));
    }

    #[test]
    fn projected_pairs_stored_under_larger_id() {
        let mut graph = ProjectedGraph::new();
        assert!(graph.insert_pair(1, 4));
        assert!(!graph.insert_pair(4, 1));
        assert!(!graph.insert_pair(3, 3));

        assert!(graph.lower_neighbors(4).unwrap().contains(&1));
        assert!(graph.lower_neighbors(1).is_none());
        assert!(graph.contains_edge(1, 4));
        assert!(graph.contains_edge(4, 1));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn projected_from_adjacency_canonicalizes() {
        let mut adjacency = Adjacency::new();
        adjacency.insert(1, 4);
        adjacency.insert(5, 2);
        adjacency.insert(7, 7);

        let graph = ProjectedGraph::from_adjacency(adjacency);
        assert!(graph.lower_neighbors(4).unwrap().contains(&1));
        assert!(graph.lower_neighbors(5).unwrap().contains(&2));
        assert!(graph.lower_neighbors(7).is_none());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn merge_unions_neighbor_sets() {
        let mut left = Adjacency::new();
        left.insert(1, 2);
        let mut right = Adjacency::new();
        right.insert(1, 3);
        right.insert(5, 6);

        left.merge(right);
        assert_eq!(left.node_count(), 2);
        assert!(left.contains(1, 2));
        assert!(left.contains(1, 3));
        assert!(left.contains(5, 6));
    }

    #[test]
    fn weighted_increment_counts_repeats() {
        let mut graph = WeightedBipartiteGraph::new();
        assert_eq!(graph.increment(1, 2), 1);
        assert_eq!(graph.increment(1, 2), 2);
        graph.increment(1, 3);
        assert_eq!(graph.weight(1, 2), 2);
        assert_eq!(graph.weight(1, 3), 1);
        assert_eq!(graph.weight(9, 9), 0);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn weighted_saturates_instead_of_wrapping() {
        let mut graph = WeightedBipartiteGraph::new();
        graph.add_weight(1, 2, u32::MAX - 1);
        assert_eq!(graph.increment(1, 2), u32::MAX);
        assert_eq!(graph.increment(1, 2), u32::MAX);
    }

    #[test]
    fn weighted_to_unweighted_keeps_edges() {
        let mut weighted = WeightedBipartiteGraph::new();
        weighted.increment(1, 2);
        weighted.increment(1, 2);
        weighted.increment(3, 2);

        let graph = weighted.to_unweighted();
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.contains_edge(1, 2));
        assert!(graph.contains_edge(3, 2));
    }
}
