//! Diffusion networks with cache-friendly CSR representation.
//!
//! A [`DiffusionNetwork`] is a directed, weighted graph over user ids.
//! Adjacency is stored in Compressed Sparse Row format (two flat vectors),
//! with node labels kept in a side table and a label→id map built once at
//! construction.
//!
//! # Examples
//!
//! ```
//! use recast::graph::DiffusionNetwork;
//!
//! let net = DiffusionNetwork::from_weighted_edges(
//!     &[("a", "b", 2.0), ("a", "c", 1.0)],
//!     true,
//! );
//! assert_eq!(net.num_nodes(), 3);
//! assert_eq!(net.num_edges(), 2);
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::cascade::CascadeTable;
use crate::reconstruct::CascadeVariant;

pub mod centrality;
pub mod community;

pub use centrality::NetworkCentrality;

/// Graph node identifier (contiguous integers for cache efficiency).
pub type NodeId = usize;

/// A directed or undirected weighted graph over labeled nodes.
///
/// Parallel edges are combined at construction by summing weights. For
/// undirected graphs the CSR stores both directions of every edge;
/// [`DiffusionNetwork::num_edges`] still counts each undirected edge once.
#[derive(Debug, Clone)]
pub struct DiffusionNetwork {
    // CSR adjacency (out-edges for directed graphs).
    row_ptr: Vec<usize>,
    col_indices: Vec<NodeId>,
    edge_weights: Vec<f64>,

    labels: Vec<String>,
    label_to_id: HashMap<String, NodeId>,

    is_directed: bool,
    n_edges: usize,
}

impl DiffusionNetwork {
    /// Build from weighted labeled edges; duplicates are summed.
    #[must_use]
    pub fn from_weighted_edges<S: AsRef<str>>(edges: &[(S, S, f64)], directed: bool) -> Self {
        Self::build(
            std::iter::empty::<&str>(),
            edges.iter().map(|(s, t, w)| (s.as_ref(), t.as_ref(), *w)),
            directed,
        )
    }

    /// Build from weighted labeled edges with the node set seeded by
    /// `vertices`, so isolated nodes survive.
    #[must_use]
    pub fn from_weighted_edges_with_vertices<V, S>(
        vertices: V,
        edges: &[(S, S, f64)],
        directed: bool,
    ) -> Self
    where
        V: IntoIterator,
        V::Item: AsRef<str>,
        S: AsRef<str>,
    {
        Self::build(
            vertices,
            edges.iter().map(|(s, t, w)| (s.as_ref(), t.as_ref(), *w)),
            directed,
        )
    }

    /// Build a directed network where the weight of an edge is its
    /// multiplicity in `edges`. `vertices` seeds the node set so isolated
    /// nodes survive.
    #[must_use]
    pub fn from_edge_multiset<'a, V, S>(vertices: V, edges: &'a [(S, S)]) -> Self
    where
        V: IntoIterator,
        V::Item: AsRef<str>,
        S: AsRef<str> + 'a,
    {
        Self::build(
            vertices,
            edges.iter().map(|(s, t)| (s.as_ref(), t.as_ref(), 1.0)),
            true,
        )
    }

    fn build<'a, V, E>(vertices: V, edges: E, directed: bool) -> Self
    where
        V: IntoIterator,
        V::Item: AsRef<str>,
        E: IntoIterator<Item = (&'a str, &'a str, f64)>,
    {
        let mut labels: Vec<String> = Vec::new();
        let mut label_to_id: HashMap<String, NodeId> = HashMap::new();
        let mut intern = |label: &str, labels: &mut Vec<String>, map: &mut HashMap<String, NodeId>| {
            if let Some(&id) = map.get(label) {
                id
            } else {
                let id = labels.len();
                labels.push(label.to_string());
                map.insert(label.to_string(), id);
                id
            }
        };

        for v in vertices {
            intern(v.as_ref(), &mut labels, &mut label_to_id);
        }

        // Combine parallel edges; undirected edges are keyed canonically.
        let mut combined: BTreeMap<(NodeId, NodeId), f64> = BTreeMap::new();
        for (source, target, weight) in edges {
            let s = intern(source, &mut labels, &mut label_to_id);
            let t = intern(target, &mut labels, &mut label_to_id);
            let key = if directed || s <= t { (s, t) } else { (t, s) };
            *combined.entry(key).or_insert(0.0) += weight;
        }

        let n = labels.len();
        let n_edges = combined.len();

        // Expand to per-row adjacency (both directions for undirected).
        let mut adjacency: Vec<Vec<(NodeId, f64)>> = vec![Vec::new(); n];
        for (&(s, t), &w) in &combined {
            adjacency[s].push((t, w));
            if !directed && s != t {
                adjacency[t].push((s, w));
            }
        }

        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_indices = Vec::new();
        let mut edge_weights = Vec::new();
        row_ptr.push(0);
        for row in &mut adjacency {
            row.sort_unstable_by_key(|&(t, _)| t);
            for &(t, w) in row.iter() {
                col_indices.push(t);
                edge_weights.push(w);
            }
            row_ptr.push(col_indices.len());
        }

        Self {
            row_ptr,
            col_indices,
            edge_weights,
            labels,
            label_to_id,
            is_directed: directed,
            n_edges,
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    /// Number of (combined) edges; undirected edges count once.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.n_edges
    }

    /// Whether edges are directed.
    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.is_directed
    }

    /// Node label by id.
    ///
    /// # Panics
    ///
    /// Panics if `v` is out of range.
    #[must_use]
    pub fn label(&self, v: NodeId) -> &str {
        &self.labels[v]
    }

    /// All node labels, indexed by [`NodeId`].
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Node id for a label, if present.
    #[must_use]
    pub fn node_id(&self, label: &str) -> Option<NodeId> {
        self.label_to_id.get(label).copied()
    }

    /// Out-neighbors of `v` (all neighbors for undirected graphs).
    #[must_use]
    pub fn out_neighbors(&self, v: NodeId) -> &[NodeId] {
        &self.col_indices[self.row_ptr[v]..self.row_ptr[v + 1]]
    }

    /// Weights parallel to [`DiffusionNetwork::out_neighbors`].
    #[must_use]
    pub fn out_weights(&self, v: NodeId) -> &[f64] {
        &self.edge_weights[self.row_ptr[v]..self.row_ptr[v + 1]]
    }

    /// Iterate CSR entries as `(source, target, weight)`.
    ///
    /// For undirected graphs every edge other than a self-loop appears in
    /// both directions.
    pub fn adjacency_entries(&self) -> impl Iterator<Item = (NodeId, NodeId, f64)> + '_ {
        (0..self.num_nodes()).flat_map(move |v| {
            self.out_neighbors(v)
                .iter()
                .zip(self.out_weights(v))
                .map(move |(&t, &w)| (v, t, w))
        })
    }

    /// Total edge weight, counting each (undirected) edge once.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        let mut sum = 0.0;
        for (s, t, w) in self.adjacency_entries() {
            if self.is_directed || s <= t {
                sum += w;
            }
        }
        sum
    }

    /// Undirected view: antiparallel edge pairs are collapsed by summing
    /// their weights, mirroring igraph's `to_undirected(mode="each")`
    /// followed by weight aggregation.
    #[must_use]
    pub fn to_undirected(&self) -> Self {
        if !self.is_directed {
            return self.clone();
        }
        let edges: Vec<(&str, &str, f64)> = self
            .adjacency_entries()
            .map(|(s, t, w)| (self.label(s), self.label(t), w))
            .collect();
        Self::build(self.labels.iter(), edges.into_iter(), false)
    }

    /// BFS distances from `source` along stored adjacency.
    #[must_use]
    pub fn bfs_distances(&self, source: NodeId) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.num_nodes()];
        let mut queue = VecDeque::new();
        dist[source] = Some(0);
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            let d = dist[v].unwrap_or(0);
            for &w in self.out_neighbors(v) {
                if dist[w].is_none() {
                    dist[w] = Some(d + 1);
                    queue.push_back(w);
                }
            }
        }
        dist
    }

    /// Maximum finite BFS distance from `source`.
    #[must_use]
    pub fn eccentricity(&self, source: NodeId) -> usize {
        self.bfs_distances(source)
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0)
    }

    /// Number of nodes at each BFS depth from `source` (index = depth).
    #[must_use]
    pub fn breadth_profile(&self, source: NodeId) -> Vec<usize> {
        let mut counts = Vec::new();
        for d in self.bfs_distances(source).into_iter().flatten() {
            if d >= counts.len() {
                counts.resize(d + 1, 0);
            }
            counts[d] += 1;
        }
        counts
    }

    /// Mean shortest-path length over ordered reachable pairs.
    ///
    /// Unreachable pairs are ignored; returns 0.0 when no pair is reachable.
    #[must_use]
    pub fn average_path_length(&self) -> f64 {
        let mut total = 0usize;
        let mut pairs = 0usize;
        for v in 0..self.num_nodes() {
            for d in self.bfs_distances(v).into_iter().flatten() {
                if d > 0 {
                    total += d;
                    pairs += 1;
                }
            }
        }
        if pairs == 0 {
            0.0
        } else {
            total as f64 / pairs as f64
        }
    }
}

/// Merge reconstructed cascade variants into one user-level network version.
///
/// Variant edges are event-id pairs; each is mapped to the posting users via
/// the cascade table, self-reshares are dropped, and edge multiplicity
/// becomes the edge weight. Every user appearing in a merged cascade is a
/// vertex even if all their edges were self-reshares.
#[must_use]
pub fn merge_cascade_variants(
    table: &CascadeTable,
    variants: &[&CascadeVariant],
) -> DiffusionNetwork {
    let mut vertices: Vec<String> = Vec::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    for variant in variants {
        let Some(cascade) = table.get(&variant.cascade_id) else {
            continue;
        };
        let users = cascade.user_of_event();
        for event in cascade.events() {
            vertices.push(event.user_id.clone());
        }
        for (parent_event, child_event) in &variant.edges {
            let (Some(&src), Some(&dst)) = (
                users.get(parent_event.as_str()),
                users.get(child_event.as_str()),
            ) else {
                continue;
            };
            if src != dst {
                edges.push((src.to_string(), dst.to_string()));
            }
        }
    }
    DiffusionNetwork::from_edge_multiset(vertices.iter(), &edges)
}

/// The naive baseline: a star per cascade, wiring the root user to every
/// resharing user regardless of timing. Weights are edge multiplicities.
#[must_use]
pub fn naive_network(table: &CascadeTable) -> DiffusionNetwork {
    let mut vertices: Vec<String> = Vec::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    for cascade in table.iter() {
        let root_user = cascade.root().user_id.clone();
        for event in cascade.events() {
            vertices.push(event.user_id.clone());
        }
        for event in cascade.events().iter().skip(1) {
            if event.user_id != root_user {
                edges.push((root_user.clone(), event.user_id.clone()));
            }
        }
    }
    DiffusionNetwork::from_edge_multiset(vertices.iter(), &edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::ResharingEvent;

    fn event(cascade: &str, id: &str, user: &str, ts: i64) -> ResharingEvent {
        ResharingEvent {
            cascade_id: cascade.to_string(),
            event_id: id.to_string(),
            user_id: user.to_string(),
            parent_id: None,
            timestamp: ts,
            follower_count: 1.0,
        }
    }

    #[test]
    fn parallel_edges_are_combined() {
        let net = DiffusionNetwork::from_edge_multiset(
            Vec::<&str>::new(),
            &[("a", "b"), ("a", "b"), ("a", "c")],
        );
        assert_eq!(net.num_nodes(), 3);
        assert_eq!(net.num_edges(), 2);
        let a = net.node_id("a").unwrap();
        let b = net.node_id("b").unwrap();
        let pos = net.out_neighbors(a).iter().position(|&t| t == b).unwrap();
        assert_eq!(net.out_weights(a)[pos], 2.0);
    }

    #[test]
    fn undirected_view_collapses_antiparallel_edges() {
        let net = DiffusionNetwork::from_weighted_edges(
            &[("a", "b", 2.0), ("b", "a", 3.0)],
            true,
        );
        let undirected = net.to_undirected();
        assert!(!undirected.is_directed());
        assert_eq!(undirected.num_edges(), 1);
        let a = undirected.node_id("a").unwrap();
        assert_eq!(undirected.out_weights(a), &[5.0]);
        assert_eq!(undirected.total_weight(), 5.0);
    }

    #[test]
    fn bfs_metrics_on_a_path() {
        // a -> b -> c -> d
        let net = DiffusionNetwork::from_weighted_edges(
            &[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0)],
            true,
        );
        let a = net.node_id("a").unwrap();
        assert_eq!(net.eccentricity(a), 3);
        assert_eq!(net.breadth_profile(a), vec![1, 1, 1, 1]);
    }

    #[test]
    fn average_path_length_matches_hand_computation() {
        // Undirected path a - b - c: distances 1, 1, 2 (unordered) so the
        // ordered mean is (1+1+2+2+1+1)/6 = 4/3.
        let net = DiffusionNetwork::from_weighted_edges(
            &[("a", "b", 1.0), ("b", "c", 1.0)],
            false,
        );
        let apl = net.average_path_length();
        assert!((apl - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn naive_network_is_a_weighted_star() {
        let table = CascadeTable::from_events(vec![
            event("c1", "p0", "root", 0),
            event("c1", "p1", "u1", 10),
            event("c1", "p2", "u2", 20),
            event("c1", "p3", "u1", 30),
        ])
        .unwrap();

        let net = naive_network(&table);
        let root = net.node_id("root").unwrap();
        let u1 = net.node_id("u1").unwrap();
        assert_eq!(net.out_neighbors(root).len(), 2);
        let pos = net.out_neighbors(root).iter().position(|&t| t == u1).unwrap();
        // u1 reshared twice.
        assert_eq!(net.out_weights(root)[pos], 2.0);
    }

    #[test]
    fn merge_maps_events_to_users_and_drops_self_reshares() {
        let mut e0 = event("c1", "p0", "alice", 0);
        e0.follower_count = 10.0;
        let e1 = event("c1", "p1", "bob", 10);
        let e2 = event("c1", "p2", "alice", 20);
        let table = CascadeTable::from_events(vec![e0, e1, e2]).unwrap();

        let variant = CascadeVariant {
            cascade_id: "c1".to_string(),
            version: 1,
            edges: vec![
                ("p0".to_string(), "p1".to_string()),
                ("p0".to_string(), "p2".to_string()), // alice -> alice, dropped
            ],
        };

        let net = merge_cascade_variants(&table, &[&variant]);
        assert_eq!(net.num_edges(), 1);
        // alice stays a vertex despite her only other edge being a self-reshare.
        assert!(net.node_id("alice").is_some());
        assert!(net.node_id("bob").is_some());
    }
}
