//! Cascade-level metrics and method comparison measures.
//!
//! A reconstructed variant is a tree (or near-tree) over event ids; the
//! structural metrics here follow Goel et al.'s cascade vocabulary: size,
//! depth, maximum breadth and structural virality. Comparison measures put
//! numbers on how much two reconstructions of the same cascade disagree.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::cascade::Cascade;
use crate::error::{RecastError, Result};
use crate::graph::{DiffusionNetwork, NetworkCentrality};
use crate::reconstruct::CascadeVariant;
use crate::stats::percentile;

/// Percentile cutoffs used for top-k influencer overlap.
pub const TOP_K_PERCENTS: [f64; 6] = [1.0, 5.0, 10.0, 15.0, 20.0, 25.0];

/// Structural metrics of one reconstructed cascade variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeMetrics {
    /// Cascade the variant belongs to.
    pub cascade_id: String,
    /// 1-based variant version.
    pub version: usize,
    /// Follower-weight parameter of the reconstruction, if applicable.
    pub gamma: Option<f64>,
    /// Power-law exponent of the reconstruction, if applicable.
    pub alpha: Option<f64>,
    /// Number of events in the cascade.
    pub size: usize,
    /// Seconds between the root and the last reshare.
    pub time_span_seconds: i64,
    /// Number of distinct users in the cascade.
    pub unique_users: usize,
    /// Eccentricity of the root: length of the longest root-to-leaf chain.
    pub depth: usize,
    /// Largest number of events at any single depth.
    pub max_breadth: usize,
    /// Mean pairwise distance on the undirected variant tree.
    pub structural_virality: f64,
}

/// Compute structural metrics for a reconstructed variant of `cascade`.
///
/// `gamma` and `alpha` are carried through to the record so parameter sweeps
/// stay self-describing; pass `None` for parameter-free methods.
///
/// # Errors
///
/// Fails when the variant has no edges or its root event is missing from the
/// edge list.
pub fn cascade_metrics(
    variant: &CascadeVariant,
    cascade: &Cascade,
    gamma: Option<f64>,
    alpha: Option<f64>,
) -> Result<CascadeMetrics> {
    if variant.edges.is_empty() {
        return Err(RecastError::InvalidCascade {
            cascade_id: variant.cascade_id.clone(),
            message: "variant has no edges, metrics are undefined".to_string(),
        });
    }

    let edges: Vec<(&str, &str, f64)> = variant
        .edges
        .iter()
        .map(|(s, t)| (s.as_str(), t.as_str(), 1.0))
        .collect();
    let tree = DiffusionNetwork::from_weighted_edges(&edges, true);

    let root_event = &cascade.root().event_id;
    let root = tree
        .node_id(root_event)
        .ok_or_else(|| RecastError::InvalidCascade {
            cascade_id: variant.cascade_id.clone(),
            message: format!("root event {root_event} absent from variant edges"),
        })?;

    let depth = tree.eccentricity(root);
    let max_breadth = tree
        .breadth_profile(root)
        .into_iter()
        .skip(1) // depth 0 is the root itself
        .max()
        .unwrap_or(0);
    let structural_virality = tree.to_undirected().average_path_length();

    Ok(CascadeMetrics {
        cascade_id: variant.cascade_id.clone(),
        version: variant.version,
        gamma,
        alpha,
        size: cascade.len(),
        time_span_seconds: cascade.time_span_seconds(),
        unique_users: cascade.unique_user_count(),
        depth,
        max_breadth,
        structural_virality,
    })
}

/// Agreement between two reconstructions of the same cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeSimilarity {
    /// Jaccard index of the directed edge sets.
    pub jaccard: f64,
    /// Proportion of the first variant's edges absent from the second, i.e.
    /// the fraction of children wired to a different parent.
    pub prop_mismatched_parents: f64,
}

/// Compare the edge sets of two variants of the same cascade.
///
/// # Errors
///
/// Fails when the variants belong to different cascades or both are empty.
pub fn edge_similarity(a: &CascadeVariant, b: &CascadeVariant) -> Result<EdgeSimilarity> {
    if a.cascade_id != b.cascade_id {
        return Err(RecastError::InvalidParameter {
            param: "b".to_string(),
            value: b.cascade_id.clone(),
            constraint: format!("must belong to cascade {}", a.cascade_id),
        });
    }

    let set_a = a.edge_set();
    let set_b = b.edge_set();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return Err(RecastError::InvalidCascade {
            cascade_id: a.cascade_id.clone(),
            message: "both variants are empty".to_string(),
        });
    }
    let intersection = set_a.intersection(&set_b).count();
    let only_in_a = set_a.difference(&set_b).count();

    Ok(EdgeSimilarity {
        jaccard: intersection as f64 / union as f64,
        prop_mismatched_parents: if set_a.is_empty() {
            0.0
        } else {
            only_in_a as f64 / set_a.len() as f64
        },
    })
}

/// Jaccard overlap of the top `k_percent` nodes under two score vectors.
///
/// Both vectors index the same node set. A node is in a top set when its
/// score is at or above the `(100 - k_percent)`-th percentile of its vector.
///
/// # Errors
///
/// Fails on mismatched lengths, empty inputs, or `k_percent` outside
/// `(0, 100]`.
pub fn top_k_jaccard(a: &[f64], b: &[f64], k_percent: f64) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RecastError::InvalidParameter {
            param: "b".to_string(),
            value: b.len().to_string(),
            constraint: format!("must match a length {}", a.len()),
        });
    }
    if !(0.0..=100.0).contains(&k_percent) || k_percent == 0.0 {
        return Err(RecastError::InvalidParameter {
            param: "k_percent".to_string(),
            value: k_percent.to_string(),
            constraint: "must be in (0, 100]".to_string(),
        });
    }

    let cutoff = 100.0 - k_percent;
    let threshold_a = percentile(a, cutoff)?;
    let threshold_b = percentile(b, cutoff)?;

    let top = |scores: &[f64], threshold: f64| -> BTreeSet<usize> {
        scores
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s >= threshold)
            .map(|(i, _)| i)
            .collect()
    };
    let top_a = top(a, threshold_a);
    let top_b = top(b, threshold_b);

    let union = top_a.union(&top_b).count();
    if union == 0 {
        return Ok(1.0);
    }
    Ok(top_a.intersection(&top_b).count() as f64 / union as f64)
}

/// Per-user out-strength difference between two networks over shared users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrengthChange {
    /// User label.
    pub user_id: String,
    /// Out-strength in the reconstructed network.
    pub reconstructed: f64,
    /// Out-strength in the baseline network.
    pub baseline: f64,
    /// `reconstructed - baseline`.
    pub change: f64,
}

/// Out-strength changes of users present in both networks, ordered by label.
#[must_use]
pub fn strength_changes(
    reconstructed: &DiffusionNetwork,
    baseline: &DiffusionNetwork,
) -> Vec<StrengthChange> {
    let strengths = reconstructed.out_strength();
    let baseline_strengths = baseline.out_strength();

    let mut records: Vec<StrengthChange> = reconstructed
        .labels()
        .iter()
        .enumerate()
        .filter_map(|(v, label)| {
            let b = baseline.node_id(label)?;
            Some(StrengthChange {
                user_id: label.clone(),
                reconstructed: strengths[v],
                baseline: baseline_strengths[b],
                change: strengths[v] - baseline_strengths[b],
            })
        })
        .collect();
    records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::ResharingEvent;

    fn cascade_of(n: usize) -> Cascade {
        let events: Vec<ResharingEvent> = (0..n)
            .map(|i| ResharingEvent {
                cascade_id: "c1".to_string(),
                event_id: format!("e{i}"),
                user_id: format!("u{i}"),
                parent_id: None,
                timestamp: 100 * i as i64,
                follower_count: 1.0,
            })
            .collect();
        Cascade::new("c1".to_string(), events).unwrap()
    }

    fn variant(edges: &[(&str, &str)]) -> CascadeVariant {
        CascadeVariant {
            cascade_id: "c1".to_string(),
            version: 1,
            edges: edges
                .iter()
                .map(|(s, t)| (s.to_string(), t.to_string()))
                .collect(),
        }
    }

    #[test]
    fn star_metrics() {
        let cascade = cascade_of(4);
        let star = variant(&[("e0", "e1"), ("e0", "e2"), ("e0", "e3")]);
        let metrics = cascade_metrics(&star, &cascade, Some(0.5), Some(2.0)).unwrap();
        assert_eq!(metrics.size, 4);
        assert_eq!(metrics.depth, 1);
        assert_eq!(metrics.max_breadth, 3);
        // Star on 4 nodes: 6 leaf-leaf pairs at distance 2, 3 root pairs at 1.
        assert!((metrics.structural_virality - 18.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn chain_metrics() {
        let cascade = cascade_of(4);
        let chain = variant(&[("e0", "e1"), ("e1", "e2"), ("e2", "e3")]);
        let metrics = cascade_metrics(&chain, &cascade, None, None).unwrap();
        assert_eq!(metrics.depth, 3);
        assert_eq!(metrics.max_breadth, 1);
        assert!(metrics.structural_virality > 1.5);
    }

    #[test]
    fn edge_similarity_counts_parent_mismatches() {
        let a = variant(&[("e0", "e1"), ("e0", "e2"), ("e1", "e3")]);
        let b = variant(&[("e0", "e1"), ("e0", "e2"), ("e2", "e3")]);
        let sim = edge_similarity(&a, &b).unwrap();
        // 2 shared of 4 distinct edges.
        assert!((sim.jaccard - 0.5).abs() < 1e-12);
        // e3 is the only reparented child among a's 3 edges.
        assert!((sim.prop_mismatched_parents - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn identical_variants_agree_perfectly() {
        let a = variant(&[("e0", "e1"), ("e1", "e2")]);
        let sim = edge_similarity(&a, &a.clone()).unwrap();
        assert_eq!(sim.jaccard, 1.0);
        assert_eq!(sim.prop_mismatched_parents, 0.0);
    }

    #[test]
    fn cross_cascade_comparison_rejected() {
        let a = variant(&[("e0", "e1")]);
        let mut b = a.clone();
        b.cascade_id = "c2".to_string();
        assert!(edge_similarity(&a, &b).is_err());
    }

    #[test]
    fn top_k_jaccard_full_and_disjoint() {
        let a = [10.0, 9.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let same = top_k_jaccard(&a, &a, 20.0).unwrap();
        assert_eq!(same, 1.0);

        let b = [1.0, 1.0, 10.0, 9.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let disjoint = top_k_jaccard(&a, &b, 20.0).unwrap();
        assert_eq!(disjoint, 0.0);
    }

    #[test]
    fn strength_changes_cover_shared_users() {
        let reconstructed = DiffusionNetwork::from_weighted_edges(
            &[("alice", "bob", 3.0), ("bob", "carol", 1.0)],
            true,
        );
        let baseline = DiffusionNetwork::from_weighted_edges(
            &[("alice", "bob", 1.0), ("alice", "carol", 1.0)],
            true,
        );
        let changes = strength_changes(&reconstructed, &baseline);
        assert_eq!(changes.len(), 3);

        let alice = changes.iter().find(|c| c.user_id == "alice").unwrap();
        assert_eq!(alice.reconstructed, 3.0);
        assert_eq!(alice.baseline, 2.0);
        assert_eq!(alice.change, 1.0);

        let bob = changes.iter().find(|c| c.user_id == "bob").unwrap();
        assert_eq!(bob.change, 1.0);
    }

    #[test]
    fn centrality_vectors_feed_top_k() {
        let net = DiffusionNetwork::from_weighted_edges(
            &[
                ("hub", "a", 5.0),
                ("hub", "b", 5.0),
                ("a", "b", 1.0),
                ("c", "hub", 1.0),
            ],
            true,
        );
        let strength = net.out_strength();
        let degree: Vec<f64> = net.out_degree().iter().map(|&d| d as f64).collect();
        let overlap = top_k_jaccard(&strength, &degree, 25.0).unwrap();
        // The hub tops both rankings.
        assert_eq!(overlap, 1.0);
    }
}
