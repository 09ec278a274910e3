//! Community detection and partition comparison.
//!
//! Weighted Louvain with the classical resolution (1.0), weighted
//! modularity, and pairwise co-assignment Jaccard for comparing partitions
//! across network versions.
//!
//! Louvain is run on the *undirected* view of a diffusion network; direction
//! is an artifact of who reshared whom and carries no meaning for mesoscale
//! structure.

use std::collections::HashMap;

use rand::prelude::*;
use rand::rngs::StdRng;

use super::{DiffusionNetwork, NodeId};

/// A node partition over a network's label set.
///
/// Community ids are compact (`0..n_communities`). Nodes are addressed by
/// label so partitions of different network versions stay comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    membership: Vec<usize>,
    labels: Vec<String>,
    n_communities: usize,
}

impl Partition {
    /// Build from a raw membership vector, renumbering community ids to be
    /// compact in first-appearance order.
    #[must_use]
    pub fn from_membership(raw: &[usize], labels: Vec<String>) -> Self {
        let mut renumber: HashMap<usize, usize> = HashMap::new();
        let mut membership = Vec::with_capacity(raw.len());
        for &community in raw {
            let next = renumber.len();
            let id = *renumber.entry(community).or_insert(next);
            membership.push(id);
        }
        Self {
            membership,
            labels,
            n_communities: renumber.len(),
        }
    }

    /// Community id per [`NodeId`].
    #[must_use]
    pub fn membership(&self) -> &[usize] {
        &self.membership
    }

    /// Number of communities.
    #[must_use]
    pub fn n_communities(&self) -> usize {
        self.n_communities
    }

    /// Nodes grouped by community.
    #[must_use]
    pub fn communities(&self) -> Vec<Vec<NodeId>> {
        let mut groups = vec![Vec::new(); self.n_communities];
        for (node, &community) in self.membership.iter().enumerate() {
            groups[community].push(node);
        }
        groups
    }

    /// Label → community id view, used for cross-version comparison.
    #[must_use]
    pub fn assignments(&self) -> HashMap<&str, usize> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.membership.iter().copied())
            .collect()
    }
}

/// Extension trait for community detection on diffusion networks.
pub trait CommunityDetection {
    /// Weighted Louvain. `seed` fixes the node visiting order, making runs
    /// reproducible; different seeds explore different local optima.
    fn louvain(&self, seed: u64) -> Partition;

    /// Weighted modularity of a membership vector (resolution 1.0).
    fn modularity(&self, membership: &[usize]) -> f64;
}

/// Working graph for the aggregation phases of Louvain.
struct LevelGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_weight: Vec<f64>,
}

impl LevelGraph {
    fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Weighted degree including twice the self-loop weight.
    fn strength(&self, v: usize) -> f64 {
        let link: f64 = self.adjacency[v].iter().map(|&(_, w)| w).sum();
        link + 2.0 * self.self_weight[v]
    }

    fn total_weight_doubled(&self) -> f64 {
        (0..self.node_count()).map(|v| self.strength(v)).sum()
    }
}

/// One pass of local moves. Returns whether anything moved.
fn local_moves(graph: &LevelGraph, node_to_comm: &mut [usize], rng: &mut StdRng) -> bool {
    let n = graph.node_count();
    let m2 = graph.total_weight_doubled();
    if m2 == 0.0 {
        return false;
    }

    let mut comm_tot = vec![0.0; n];
    for v in 0..n {
        comm_tot[node_to_comm[v]] += graph.strength(v);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut moved_any = false;
    let mut improved = true;
    while improved {
        improved = false;
        for &v in &order {
            let k_v = graph.strength(v);
            let current = node_to_comm[v];
            comm_tot[current] -= k_v;

            // Weight of links from v into each adjacent community.
            let mut links: HashMap<usize, f64> = HashMap::new();
            links.insert(current, 0.0);
            for &(u, w) in &graph.adjacency[v] {
                *links.entry(node_to_comm[u]).or_insert(0.0) += w;
            }

            // Gain of joining community c, up to constants: w_vc - Σ_tot(c)·k_v / m2.
            let mut best = current;
            let mut best_gain = links[&current] - comm_tot[current] * k_v / m2;
            for (&community, &w_vc) in &links {
                let gain = w_vc - comm_tot[community] * k_v / m2;
                if gain > best_gain + 1e-12 {
                    best = community;
                    best_gain = gain;
                }
            }

            comm_tot[best] += k_v;
            if best != current {
                node_to_comm[v] = best;
                improved = true;
                moved_any = true;
            }
        }
    }
    moved_any
}

/// Collapse communities into super-nodes for the next level.
fn aggregate(graph: &LevelGraph, node_to_comm: &[usize]) -> (LevelGraph, Vec<usize>) {
    let mut renumber: HashMap<usize, usize> = HashMap::new();
    let mut compact = Vec::with_capacity(node_to_comm.len());
    for &c in node_to_comm {
        let next = renumber.len();
        compact.push(*renumber.entry(c).or_insert(next));
    }
    let k = renumber.len();

    let mut self_weight = vec![0.0; k];
    let mut between: HashMap<(usize, usize), f64> = HashMap::new();
    for v in 0..graph.node_count() {
        let cv = compact[v];
        self_weight[cv] += graph.self_weight[v];
        for &(u, w) in &graph.adjacency[v] {
            let cu = compact[u];
            if cv == cu {
                // Each intra-community edge is visited from both endpoints.
                self_weight[cv] += w / 2.0;
            } else if cv < cu {
                *between.entry((cv, cu)).or_insert(0.0) += w;
            }
        }
    }

    let mut adjacency = vec![Vec::new(); k];
    for (&(a, b), &w) in &between {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
    }
    (
        LevelGraph {
            adjacency,
            self_weight,
        },
        compact,
    )
}

impl CommunityDetection for DiffusionNetwork {
    fn louvain(&self, seed: u64) -> Partition {
        debug_assert!(
            !self.is_directed(),
            "run louvain on the undirected view (DiffusionNetwork::to_undirected)"
        );
        let n = self.num_nodes();
        let mut rng = StdRng::seed_from_u64(seed);

        // Level-0 working copy of the adjacency.
        let mut adjacency = vec![Vec::new(); n];
        let mut self_weight = vec![0.0; n];
        for (s, t, w) in self.adjacency_entries() {
            if s == t {
                self_weight[s] += w;
            } else {
                adjacency[s].push((t, w));
            }
        }
        let mut graph = LevelGraph {
            adjacency,
            self_weight,
        };

        // membership[v] = community of original node v in terms of the
        // current level's node ids.
        let mut membership: Vec<usize> = (0..n).collect();

        loop {
            let mut node_to_comm: Vec<usize> = (0..graph.node_count()).collect();
            let moved = local_moves(&graph, &mut node_to_comm, &mut rng);
            if !moved {
                break;
            }
            let (next, compact) = aggregate(&graph, &node_to_comm);
            // A node's new id at the next level is its compact community id.
            for community in membership.iter_mut() {
                *community = compact[*community];
            }
            if next.node_count() == graph.node_count() {
                graph = next;
                break;
            }
            graph = next;
        }

        Partition::from_membership(&membership, self.labels().to_vec())
    }

    fn modularity(&self, membership: &[usize]) -> f64 {
        debug_assert_eq!(membership.len(), self.num_nodes());
        let m = self.total_weight();
        if m == 0.0 {
            return 0.0;
        }
        let two_m = 2.0 * m;

        let mut strength = vec![0.0; self.num_nodes()];
        let mut intra = 0.0;
        for (s, t, w) in self.adjacency_entries() {
            // Self-loops appear once in the CSR but contribute twice to both
            // the strength and the intra-community weight.
            let multiplier = if s == t { 2.0 } else { 1.0 };
            strength[s] += multiplier * w;
            if membership[s] == membership[t] {
                intra += multiplier * w;
            }
        }

        let n_comms = membership.iter().copied().max().map_or(0, |c| c + 1);
        let mut comm_strength = vec![0.0; n_comms];
        for (v, &c) in membership.iter().enumerate() {
            comm_strength[c] += strength[v];
        }

        let expected: f64 = comm_strength.iter().map(|s| (s / two_m).powi(2)).sum();
        intra / two_m - expected
    }
}

/// Pairwise co-assignment Jaccard between two partitions.
///
/// Over node pairs drawn from the labels common to both partitions:
/// `N11 / (N11 + N10 + N01)`, where `N11` counts pairs clustered together in
/// both. Returns 1.0 when neither partition co-clusters any common pair.
#[must_use]
pub fn partition_jaccard(a: &Partition, b: &Partition) -> f64 {
    let assignments_b = b.assignments();

    // Contingency counts over common labels.
    let mut contingency: HashMap<(usize, usize), f64> = HashMap::new();
    let mut count_a: HashMap<usize, f64> = HashMap::new();
    let mut count_b: HashMap<usize, f64> = HashMap::new();
    for (label, &ca) in a.labels.iter().zip(a.membership.iter()) {
        if let Some(&cb) = assignments_b.get(label.as_str()) {
            *contingency.entry((ca, cb)).or_insert(0.0) += 1.0;
            *count_a.entry(ca).or_insert(0.0) += 1.0;
            *count_b.entry(cb).or_insert(0.0) += 1.0;
        }
    }

    let choose2 = |x: f64| x * (x - 1.0) / 2.0;
    let n11: f64 = contingency.values().map(|&c| choose2(c)).sum();
    let same_a: f64 = count_a.values().map(|&c| choose2(c)).sum();
    let same_b: f64 = count_b.values().map(|&c| choose2(c)).sum();

    let denominator = same_a + same_b - n11;
    if denominator == 0.0 {
        1.0
    } else {
        n11 / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DiffusionNetwork;

    fn two_cliques() -> DiffusionNetwork {
        DiffusionNetwork::from_weighted_edges(
            &[
                ("a", "b", 1.0),
                ("b", "c", 1.0),
                ("c", "a", 1.0),
                ("x", "y", 1.0),
                ("y", "z", 1.0),
                ("z", "x", 1.0),
                ("c", "x", 0.1), // weak bridge
            ],
            false,
        )
    }

    #[test]
    fn louvain_splits_two_cliques() {
        let net = two_cliques();
        let partition = net.louvain(7);
        assert_eq!(partition.n_communities(), 2);

        let assignments = partition.assignments();
        assert_eq!(assignments["a"], assignments["b"]);
        assert_eq!(assignments["a"], assignments["c"]);
        assert_eq!(assignments["x"], assignments["y"]);
        assert_ne!(assignments["a"], assignments["x"]);
    }

    #[test]
    fn louvain_is_seed_reproducible() {
        let net = two_cliques();
        assert_eq!(net.louvain(3), net.louvain(3));
    }

    #[test]
    fn modularity_of_clique_split_is_positive() {
        let net = two_cliques();
        let partition = net.louvain(1);
        let q = net.modularity(partition.membership());
        assert!(q > 0.3, "modularity = {q}");

        // A single community always has modularity 0.
        let single = vec![0; net.num_nodes()];
        assert!(net.modularity(&single).abs() < 1e-12);
    }

    #[test]
    fn identical_partitions_have_jaccard_one() {
        let net = two_cliques();
        let p = net.louvain(5);
        assert!((partition_jaccard(&p, &p) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn opposed_partitions_have_low_jaccard() {
        let labels: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let together = Partition::from_membership(&[0, 0, 0, 0], labels.clone());
        let apart = Partition::from_membership(&[0, 1, 2, 3], labels);
        assert_eq!(partition_jaccard(&together, &apart), 0.0);
    }

    #[test]
    fn jaccard_restricts_to_common_labels() {
        let a = Partition::from_membership(
            &[0, 0, 1],
            vec!["a".into(), "b".into(), "only-in-a".into()],
        );
        let b = Partition::from_membership(
            &[0, 0, 1],
            vec!["a".into(), "b".into(), "only-in-b".into()],
        );
        // On the common {a, b} both partitions agree completely.
        assert!((partition_jaccard(&a, &b) - 1.0).abs() < 1e-12);
    }
}
