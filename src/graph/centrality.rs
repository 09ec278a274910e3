//! Node centrality measures for diffusion networks.
//!
//! The measure set follows the study's influence columns: out-degree,
//! out-strength (weighted out-degree), out-degree k-core number, and
//! weighted eigenvector centrality.

use crate::error::{RecastError, Result};

use super::{DiffusionNetwork, NodeId};

/// Extension trait for node centrality measures.
pub trait NetworkCentrality {
    /// Number of out-neighbors per node.
    fn out_degree(&self) -> Vec<usize>;

    /// Sum of out-edge weights per node.
    fn out_strength(&self) -> Vec<f64>;

    /// k-core numbers based on out-degree (Batagelj–Zaveršnik peeling).
    ///
    /// A node's core number is the largest `k` such that it belongs to a
    /// subgraph in which every node has out-degree at least `k`.
    fn out_coreness(&self) -> Vec<usize>;

    /// Weighted eigenvector centrality, scaled so the maximum score is 1.
    ///
    /// Computed on the underlying undirected structure (igraph's default for
    /// this measure) with a shifted power iteration, `x' = (A + I) x`. The
    /// shift leaves the eigenvectors untouched but breaks the period-2
    /// oscillation plain power iteration exhibits on bipartite graphs and
    /// directed 2-cycles. Edgeless graphs get a uniform score of 1.
    ///
    /// # Errors
    ///
    /// Returns [`RecastError::ConvergenceFailure`] if the iteration does not
    /// settle within `max_iter` iterations.
    fn eigenvector_centrality(&self, max_iter: usize, tol: f64) -> Result<Vec<f64>>;
}

impl NetworkCentrality for DiffusionNetwork {
    fn out_degree(&self) -> Vec<usize> {
        (0..self.num_nodes())
            .map(|v| self.out_neighbors(v).len())
            .collect()
    }

    fn out_strength(&self) -> Vec<f64> {
        (0..self.num_nodes())
            .map(|v| self.out_weights(v).iter().sum())
            .collect()
    }

    fn out_coreness(&self) -> Vec<usize> {
        let n = self.num_nodes();
        if n == 0 {
            return Vec::new();
        }

        // Removing a node only lowers the out-degree of its in-neighbors.
        let mut in_neighbors: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        for (s, t, _) in self.adjacency_entries() {
            in_neighbors[t].push(s);
        }

        let mut degree: Vec<usize> = self.out_degree();
        let max_degree = degree.iter().copied().max().unwrap_or(0);

        // Bucket sort nodes by current degree.
        let mut buckets: Vec<Vec<NodeId>> = vec![Vec::new(); max_degree + 1];
        for (v, &d) in degree.iter().enumerate() {
            buckets[d].push(v);
        }

        let mut core = vec![0usize; n];
        let mut removed = vec![false; n];
        let mut k = 0usize;
        for _ in 0..n {
            // Find the lowest non-empty bucket at or below the current k.
            let mut d = 0;
            let v = loop {
                while d <= max_degree && buckets[d].is_empty() {
                    d += 1;
                }
                match buckets[d].pop() {
                    // Stale entries stay behind when a node moves buckets.
                    Some(candidate) if !removed[candidate] && degree[candidate] == d => {
                        break candidate
                    }
                    _ => {}
                }
            };

            k = k.max(degree[v]);
            core[v] = k;
            removed[v] = true;

            for &u in &in_neighbors[v] {
                if !removed[u] && degree[u] > degree[v] {
                    degree[u] -= 1;
                    buckets[degree[u]].push(u);
                }
            }
        }
        core
    }

    fn eigenvector_centrality(&self, max_iter: usize, tol: f64) -> Result<Vec<f64>> {
        let n = self.num_nodes();
        if n == 0 {
            return Ok(Vec::new());
        }
        if self.num_edges() == 0 {
            return Ok(vec![1.0; n]);
        }

        let mut x = vec![1.0; n];
        let mut next = vec![0.0; n];
        for _ in 0..max_iter {
            // Shifted iteration keeps every node's own score in the mix.
            next.copy_from_slice(&x);
            for (s, t, w) in self.adjacency_entries() {
                next[s] += w * x[t];
                if self.is_directed() {
                    next[t] += w * x[s];
                }
            }

            let max = next.iter().cloned().fold(0.0f64, f64::max);
            for value in next.iter_mut() {
                *value /= max;
            }

            let diff: f64 = x
                .iter()
                .zip(next.iter())
                .map(|(a, b)| (a - b).abs())
                .sum();
            std::mem::swap(&mut x, &mut next);
            if diff < tol {
                return Ok(x);
            }
        }
        Err(RecastError::ConvergenceFailure {
            iterations: max_iter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DiffusionNetwork;

    #[test]
    fn degree_and_strength() {
        let net = DiffusionNetwork::from_weighted_edges(
            &[("a", "b", 2.0), ("a", "c", 1.0), ("b", "c", 4.0)],
            true,
        );
        let a = net.node_id("a").unwrap();
        let c = net.node_id("c").unwrap();
        assert_eq!(net.out_degree()[a], 2);
        assert_eq!(net.out_strength()[a], 3.0);
        assert_eq!(net.out_degree()[c], 0);
        assert_eq!(net.out_strength()[c], 0.0);
    }

    #[test]
    fn coreness_separates_core_from_periphery() {
        // Directed 4-clique (every ordered pair) plus a pendant node with a
        // single out-edge into the clique.
        let mut edges = Vec::new();
        let clique = ["a", "b", "c", "d"];
        for s in clique {
            for t in clique {
                if s != t {
                    edges.push((s, t, 1.0));
                }
            }
        }
        edges.push(("e", "a", 1.0));
        let net = DiffusionNetwork::from_weighted_edges(&edges, true);

        let core = net.out_coreness();
        for label in clique {
            assert_eq!(core[net.node_id(label).unwrap()], 3, "node {label}");
        }
        assert_eq!(core[net.node_id("e").unwrap()], 1);
    }

    #[test]
    fn eigenvector_on_symmetric_cycle_is_uniform() {
        let net = DiffusionNetwork::from_weighted_edges(
            &[("a", "b", 1.0), ("b", "c", 1.0), ("c", "a", 1.0)],
            false,
        );
        let scores = net.eigenvector_centrality(200, 1e-9).unwrap();
        for score in scores {
            assert!((score - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn eigenvector_ignores_edge_direction() {
        // Directed star a -> b, a -> c: on the underlying undirected K_{1,2}
        // the center scores 1 and each leaf 1/sqrt(2).
        let net = DiffusionNetwork::from_weighted_edges(
            &[("a", "b", 1.0), ("a", "c", 1.0)],
            true,
        );
        let scores = net.eigenvector_centrality(500, 1e-10).unwrap();
        let a = scores[net.node_id("a").unwrap()];
        let b = scores[net.node_id("b").unwrap()];
        assert!((a - 1.0).abs() < 1e-6);
        assert!((b - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn eigenvector_favors_heavier_neighborhoods() {
        // Undirected: hub with three spokes vs. a node with one spoke.
        let net = DiffusionNetwork::from_weighted_edges(
            &[
                ("hub", "s1", 1.0),
                ("hub", "s2", 1.0),
                ("hub", "s3", 1.0),
                ("s1", "leaf", 1.0),
            ],
            false,
        );
        let scores = net.eigenvector_centrality(500, 1e-10).unwrap();
        let hub = scores[net.node_id("hub").unwrap()];
        let leaf = scores[net.node_id("leaf").unwrap()];
        assert!(hub > leaf);
        assert!((hub - 1.0).abs() < 1e-6);
    }
}
