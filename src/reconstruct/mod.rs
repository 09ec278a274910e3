//! Cascade reconstruction methods.
//!
//! Observed resharing logs tell us *that* a user reshared a piece of content,
//! but not *whom* they saw it from: most platforms attribute every reshare to
//! the root post. Reconstruction infers the hidden diffusion edge for each
//! reshare. Three methods are provided:
//!
//! - **PDI** (probabilistic diffusion inference): samples each parent from the
//!   temporal predecessors, weighting candidates by follower share and by a
//!   power law over elapsed time ([`PdiReconstructor`]).
//! - **Random**: parent drawn uniformly from the predecessors
//!   ([`RandomReconstructor`]).
//! - **TID** (time-inferred diffusion): uses the observed parent attribution
//!   directly ([`tid_reconstruction`]).
//!
//! Stochastic methods produce many [`CascadeVariant`]s per cascade; a
//! length-2 cascade has a single possible wiring, so exactly one variant is
//! generated for it.

pub mod powerlaw;

use std::collections::BTreeSet;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cascade::Cascade;
use crate::error::{RecastError, Result};
use powerlaw::probability_window;

/// Number of variants generated per stochastic reconstruction by default.
pub const DEFAULT_VARIANTS: usize = 100;

/// Gamma sweep used in the original study.
pub const DEFAULT_GAMMAS: [f64; 3] = [0.25, 0.5, 0.75];

/// Alpha sweep used in the original study.
pub const DEFAULT_ALPHAS: [f64; 5] = [1.1, 1.5, 2.0, 2.5, 3.0];

/// Offset added to time differences so zero gaps (second resolution) have
/// positive power-law mass.
const TIME_DIFF_SHIFT: f64 = 0.1;

/// A reconstruction method selector, as exposed on the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Probabilistic diffusion inference.
    Pdi,
    /// Uniform-random parent baseline.
    Random,
    /// Time-inferred diffusion (observed parents).
    Tid,
}

impl Method {
    /// Stable lowercase name, used in directory layouts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdi => "pdi",
            Self::Random => "random",
            Self::Tid => "tid",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for probabilistic diffusion inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdiParams {
    /// Weight of the follower-count distribution; `1 - gamma` goes to the
    /// time-difference distribution.
    pub gamma: f64,
    /// Power-law exponent over elapsed time.
    pub alpha: f64,
    /// Minimum value where power-law behavior starts (seconds).
    pub xmin: f64,
}

impl PdiParams {
    /// Validate and build a parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`RecastError::InvalidParameter`] unless `gamma ∈ [0, 1]`,
    /// `alpha > 1` and `xmin > 0`.
    pub fn new(gamma: f64, alpha: f64, xmin: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&gamma) {
            return Err(RecastError::InvalidParameter {
                param: "gamma".to_string(),
                value: gamma.to_string(),
                constraint: "must be in [0, 1]".to_string(),
            });
        }
        if alpha <= 1.0 {
            return Err(RecastError::InvalidParameter {
                param: "alpha".to_string(),
                value: alpha.to_string(),
                constraint: "must be > 1".to_string(),
            });
        }
        if xmin <= 0.0 {
            return Err(RecastError::InvalidParameter {
                param: "xmin".to_string(),
                value: xmin.to_string(),
                constraint: "must be > 0".to_string(),
            });
        }
        Ok(Self { gamma, alpha, xmin })
    }
}

/// One reconstructed wiring of a cascade: a directed edge list over event ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeVariant {
    /// Cascade this variant belongs to.
    pub cascade_id: String,
    /// 1-based version number within the cascade.
    pub version: usize,
    /// `(parent_event, child_event)` pairs, one per non-root event.
    pub edges: Vec<(String, String)>,
}

impl CascadeVariant {
    /// Edge set view for similarity comparisons.
    #[must_use]
    pub fn edge_set(&self) -> BTreeSet<(&str, &str)> {
        self.edges
            .iter()
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect()
    }

    /// All event ids touched by the edges.
    #[must_use]
    pub fn vertices(&self) -> BTreeSet<&str> {
        self.edges
            .iter()
            .flat_map(|(s, t)| [s.as_str(), t.as_str()])
            .collect()
    }
}

/// How many variants a cascade of the given length yields.
///
/// Length-2 cascades have no guesswork: one variant only.
#[must_use]
pub fn variant_count(cascade_len: usize, requested: usize) -> usize {
    if cascade_len == 2 {
        1
    } else {
        requested
    }
}

fn require_reconstructible(cascade: &Cascade) -> Result<()> {
    if !cascade.is_reconstructible() {
        return Err(RecastError::InvalidCascade {
            cascade_id: cascade.id().to_string(),
            message: "fewer than two events, nothing to reconstruct".to_string(),
        });
    }
    Ok(())
}

/// Probabilistic diffusion inference.
///
/// For every reshare, the parent is sampled from the temporal predecessors
/// with weights `gamma * follower_share + (1 - gamma) * powerlaw_time_mass`,
/// both distributions normalized over the candidate set.
#[derive(Debug, Clone)]
pub struct PdiReconstructor {
    params: PdiParams,
}

impl PdiReconstructor {
    /// Build a reconstructor with the given parameters.
    #[must_use]
    pub fn new(params: PdiParams) -> Self {
        Self { params }
    }

    /// The parameter set in use.
    #[must_use]
    pub fn params(&self) -> &PdiParams {
        &self.params
    }

    /// Sample the parent index for the event at `idx` among events `0..idx`.
    fn infer_parent_index<R: Rng>(
        &self,
        timestamps: &[i64],
        fcounts: &[f64],
        idx: usize,
        rng: &mut R,
    ) -> Result<usize> {
        let candidates = idx;
        let current = timestamps[idx];

        // Follower-share distribution. All-zero follower counts fall back to
        // uniform rather than propagating NaN.
        let total_fcount: f64 = fcounts[..candidates].iter().sum();
        let fshare = |j: usize| {
            if total_fcount > 0.0 {
                fcounts[j] / total_fcount
            } else {
                1.0 / candidates as f64
            }
        };

        // Power-law mass over elapsed time, normalized over candidates.
        let mut time_mass = Vec::with_capacity(candidates);
        for &t in &timestamps[..candidates] {
            let diff = (current - t) as f64 + TIME_DIFF_SHIFT;
            time_mass.push(probability_window(diff, self.params.alpha, self.params.xmin)?);
        }
        let mass_total: f64 = time_mass.iter().sum();

        let mut weights = Vec::with_capacity(candidates);
        for (j, mass) in time_mass.iter().enumerate() {
            let tshare = if mass_total > 0.0 {
                mass / mass_total
            } else {
                1.0 / candidates as f64
            };
            weights.push(self.params.gamma * fshare(j) + (1.0 - self.params.gamma) * tshare);
        }

        let dist = WeightedIndex::new(&weights).map_err(|e| {
            RecastError::Other(format!("degenerate parent weights: {e}"))
        })?;
        Ok(dist.sample(rng))
    }

    /// Reconstruct one wiring of `cascade` with the supplied RNG.
    ///
    /// The first edge is always `(events[0], events[1])`; every later event
    /// samples its parent from all temporal predecessors.
    ///
    /// # Errors
    ///
    /// Fails on cascades with fewer than two events.
    pub fn reconstruct<R: Rng>(
        &self,
        cascade: &Cascade,
        rng: &mut R,
    ) -> Result<Vec<(String, String)>> {
        require_reconstructible(cascade)?;
        let ids = cascade.event_ids();
        let timestamps = cascade.timestamps();
        let fcounts = cascade.follower_counts();

        let mut edges = Vec::with_capacity(ids.len() - 1);
        edges.push((ids[0].to_string(), ids[1].to_string()));

        for idx in 2..ids.len() {
            let parent = self.infer_parent_index(&timestamps, &fcounts, idx, rng)?;
            edges.push((ids[parent].to_string(), ids[idx].to_string()));
        }
        Ok(edges)
    }

    /// Generate `requested` variants of `cascade` (1 for length-2 cascades).
    ///
    /// Variant `v` uses an RNG seeded from `(seed, v)`, so a given
    /// `(seed, cascade, params)` tuple always reproduces the same output and
    /// variants can be generated in parallel.
    pub fn variants(
        &self,
        cascade: &Cascade,
        requested: usize,
        seed: u64,
    ) -> Result<Vec<CascadeVariant>> {
        require_reconstructible(cascade)?;
        let n = variant_count(cascade.len(), requested);
        (1..=n)
            .into_par_iter()
            .map(|version| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(version as u64));
                let edges = self.reconstruct(cascade, &mut rng)?;
                Ok(CascadeVariant {
                    cascade_id: cascade.id().to_string(),
                    version,
                    edges,
                })
            })
            .collect()
    }
}

/// Uniform-random parent baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomReconstructor;

impl RandomReconstructor {
    /// Reconstruct one wiring, drawing every parent uniformly from the
    /// temporal predecessors.
    ///
    /// # Errors
    ///
    /// Fails on cascades with fewer than two events.
    pub fn reconstruct<R: Rng>(
        &self,
        cascade: &Cascade,
        rng: &mut R,
    ) -> Result<Vec<(String, String)>> {
        require_reconstructible(cascade)?;
        let ids = cascade.event_ids();

        let mut edges = Vec::with_capacity(ids.len() - 1);
        edges.push((ids[0].to_string(), ids[1].to_string()));
        for idx in 2..ids.len() {
            let parent = rng.gen_range(0..idx);
            edges.push((ids[parent].to_string(), ids[idx].to_string()));
        }
        Ok(edges)
    }

    /// Generate `requested` variants (1 for length-2 cascades), seeded as in
    /// [`PdiReconstructor::variants`].
    pub fn variants(
        &self,
        cascade: &Cascade,
        requested: usize,
        seed: u64,
    ) -> Result<Vec<CascadeVariant>> {
        require_reconstructible(cascade)?;
        let n = variant_count(cascade.len(), requested);
        (1..=n)
            .into_par_iter()
            .map(|version| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(version as u64));
                let edges = self.reconstruct(cascade, &mut rng)?;
                Ok(CascadeVariant {
                    cascade_id: cascade.id().to_string(),
                    version,
                    edges,
                })
            })
            .collect()
    }
}

/// Time-inferred diffusion: wire each event to its *observed* parent.
///
/// Deterministic, one variant. Roots and events whose observed parent is not
/// part of the cascade contribute no edge.
///
/// # Errors
///
/// Fails on cascades with fewer than two events.
pub fn tid_reconstruction(cascade: &Cascade) -> Result<CascadeVariant> {
    require_reconstructible(cascade)?;
    let parents = cascade.observed_parents();

    let mut edges = Vec::new();
    for event in cascade.events() {
        if let Some(parent) = parents.get(event.event_id.as_str()) {
            edges.push(((*parent).to_string(), event.event_id.clone()));
        }
    }
    Ok(CascadeVariant {
        cascade_id: cascade.id().to_string(),
        version: 1,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::ResharingEvent;
    use proptest::prelude::*;

    fn cascade_of(n: usize) -> Cascade {
        let events: Vec<ResharingEvent> = (0..n)
            .map(|i| ResharingEvent {
                cascade_id: "c1".to_string(),
                event_id: format!("e{i}"),
                user_id: format!("u{i}"),
                parent_id: (i > 0).then(|| "e0".to_string()),
                timestamp: 1_000 + (i as i64) * 30,
                follower_count: 10.0 * (i + 1) as f64,
            })
            .collect();
        Cascade::new("c1".to_string(), events).unwrap()
    }

    #[test]
    fn pdi_params_validated() {
        assert!(PdiParams::new(1.5, 2.0, 1.0).is_err());
        assert!(PdiParams::new(0.5, 1.0, 1.0).is_err());
        assert!(PdiParams::new(0.5, 2.0, 0.0).is_err());
        assert!(PdiParams::new(0.5, 2.0, 1.0).is_ok());
    }

    #[test]
    fn first_edge_is_fixed() {
        let cascade = cascade_of(5);
        let rec = PdiReconstructor::new(PdiParams::new(0.5, 2.0, 1.0).unwrap());
        let mut rng = StdRng::seed_from_u64(7);
        let edges = rec.reconstruct(&cascade, &mut rng).unwrap();
        assert_eq!(edges[0], ("e0".to_string(), "e1".to_string()));
        assert_eq!(edges.len(), 4);
    }

    #[test]
    fn seeded_variants_are_reproducible() {
        let cascade = cascade_of(8);
        let rec = PdiReconstructor::new(PdiParams::new(0.25, 1.5, 1.0).unwrap());
        let a = rec.variants(&cascade, 5, 99).unwrap();
        let b = rec.variants(&cascade, 5, 99).unwrap();
        assert_eq!(a, b);
        let c = rec.variants(&cascade, 5, 100).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn length_two_cascades_get_one_variant() {
        let cascade = cascade_of(2);
        let rec = RandomReconstructor;
        let variants = rec.variants(&cascade, 100, 1).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(
            variants[0].edges,
            vec![("e0".to_string(), "e1".to_string())]
        );
    }

    #[test]
    fn tid_follows_observed_parents() {
        let cascade = cascade_of(4);
        let variant = tid_reconstruction(&cascade).unwrap();
        // Every non-root observed a parent of e0 in the fixture.
        assert_eq!(variant.edges.len(), 3);
        assert!(variant.edges.iter().all(|(s, _)| s == "e0"));
    }

    #[test]
    fn singleton_cascade_rejected() {
        let cascade = cascade_of(1);
        assert!(tid_reconstruction(&cascade).is_err());
    }

    proptest! {
        #[test]
        fn parents_always_precede_children(len in 3usize..20, seed in 0u64..1_000) {
            let cascade = cascade_of(len);
            let rec = PdiReconstructor::new(PdiParams::new(0.5, 2.5, 1.0).unwrap());
            let mut rng = StdRng::seed_from_u64(seed);
            let edges = rec.reconstruct(&cascade, &mut rng).unwrap();

            let position: std::collections::HashMap<&str, usize> = cascade
                .event_ids()
                .into_iter()
                .enumerate()
                .map(|(i, id)| (id, i))
                .collect();

            // One edge per non-root, each child has exactly one parent that
            // comes earlier in temporal order.
            prop_assert_eq!(edges.len(), len - 1);
            for (parent, child) in &edges {
                prop_assert!(position[parent.as_str()] < position[child.as_str()]);
            }
            let children: std::collections::HashSet<&str> =
                edges.iter().map(|(_, c)| c.as_str()).collect();
            prop_assert_eq!(children.len(), edges.len());
        }
    }
}
