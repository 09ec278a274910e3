//! Stage sequencing for full reconstruction runs.
//!
//! A run walks six stages in a fixed order: reconstruct cascades, merge them
//! into network versions, compute centralities, compare reconstructions,
//! detect communities, and derive summary statistics. Stages execute strictly
//! sequentially and fail fast: the first stage error aborts the run with the
//! failing stage named. Within a stage, independent units (cascades, network
//! versions) run in parallel; parallelism never crosses a stage boundary.
//!
//! All intermediate artifacts go through [`crate::store`], so interrupted
//! runs resume by skipping whatever is already on disk.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cascade::{Cascade, CascadeTable, CleaningReport, TimeDiffMode};
use crate::error::{RecastError, Result};
use crate::graph::community::{partition_jaccard, CommunityDetection, Partition};
use crate::graph::{
    merge_cascade_variants, naive_network, DiffusionNetwork, NetworkCentrality,
};
use crate::metrics::{
    cascade_metrics, edge_similarity, strength_changes, top_k_jaccard, StrengthChange,
    TOP_K_PERCENTS,
};
use crate::reconstruct::{
    tid_reconstruction, variant_count, CascadeVariant, Method, PdiParams, PdiReconstructor,
    RandomReconstructor, DEFAULT_ALPHAS, DEFAULT_GAMMAS, DEFAULT_VARIANTS,
};
use crate::stats::{bootstrap_ci, cosine_similarity, spearman};
use crate::store::{self, StoreLayout};

const EIGENVECTOR_MAX_ITER: usize = 1_000;
const EIGENVECTOR_TOL: f64 = 1e-6;
const CONFIDENCE: f64 = 0.95;

/// The six pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Generate cascade variants per method and parameter combination.
    Reconstruct,
    /// Merge variants into network versions; build the naive baseline.
    Networks,
    /// Node centralities for every network version.
    Centralities,
    /// Variant-level agreement between reconstruction methods.
    Similarity,
    /// Louvain communities and partition stability.
    Communities,
    /// Cascade metrics, strength changes, correlations, top-k overlap,
    /// power-law fits.
    Stats,
}

impl Stage {
    /// All stages in execution order.
    pub const ORDER: [Stage; 6] = [
        Stage::Reconstruct,
        Stage::Networks,
        Stage::Centralities,
        Stage::Similarity,
        Stage::Communities,
        Stage::Stats,
    ];

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reconstruct => "reconstruct",
            Self::Networks => "networks",
            Self::Centralities => "centralities",
            Self::Similarity => "similarity",
            Self::Communities => "communities",
            Self::Stats => "stats",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_methods() -> Vec<Method> {
    vec![Method::Pdi, Method::Random, Method::Tid]
}

fn default_gammas() -> Vec<f64> {
    DEFAULT_GAMMAS.to_vec()
}

fn default_alphas() -> Vec<f64> {
    DEFAULT_ALPHAS.to_vec()
}

fn default_xmin() -> f64 {
    1.0
}

fn default_variants() -> usize {
    DEFAULT_VARIANTS
}

fn default_seed() -> u64 {
    42
}

fn default_community_reps() -> usize {
    10
}

fn default_bootstrap_resamples() -> usize {
    1_000
}

fn default_fit_sims() -> usize {
    100
}

fn default_stages() -> Vec<Stage> {
    Stage::ORDER.to_vec()
}

/// Manifest of one pipeline run, JSON round-trippable so a run can be
/// reproduced from its `run_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Event-log CSV path.
    pub events: PathBuf,
    /// Data directory holding all run artifacts.
    pub data_dir: PathBuf,
    /// Reconstruction methods to run.
    #[serde(default = "default_methods")]
    pub methods: Vec<Method>,
    /// Gamma sweep for PDI.
    #[serde(default = "default_gammas")]
    pub gammas: Vec<f64>,
    /// Alpha sweep for PDI.
    #[serde(default = "default_alphas")]
    pub alphas: Vec<f64>,
    /// Power-law `xmin` in seconds.
    #[serde(default = "default_xmin")]
    pub xmin: f64,
    /// Variants per cascade (also the network version count).
    #[serde(default = "default_variants")]
    pub variants: usize,
    /// Master seed; all per-unit seeds derive from it.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Louvain runs per network.
    #[serde(default = "default_community_reps")]
    pub community_reps: usize,
    /// Resamples per bootstrap confidence interval.
    #[serde(default = "default_bootstrap_resamples")]
    pub bootstrap_resamples: usize,
    /// Simulations per power-law fit stratum.
    #[serde(default = "default_fit_sims")]
    pub fit_sims: usize,
    /// Regenerate artifacts even when they already exist.
    #[serde(default)]
    pub force: bool,
    /// Stages to run (always executed in [`Stage::ORDER`]).
    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,
}

impl RunConfig {
    /// Config with the study's default sweep and counts.
    #[must_use]
    pub fn new(events: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            events: events.into(),
            data_dir: data_dir.into(),
            methods: default_methods(),
            gammas: default_gammas(),
            alphas: default_alphas(),
            xmin: default_xmin(),
            variants: default_variants(),
            seed: default_seed(),
            community_reps: default_community_reps(),
            bootstrap_resamples: default_bootstrap_resamples(),
            fit_sims: default_fit_sims(),
            force: false,
            stages: default_stages(),
        }
    }

    /// Load a JSON manifest.
    ///
    /// # Errors
    ///
    /// Fails on IO or deserialization errors.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Write the manifest as pretty JSON.
    ///
    /// # Errors
    ///
    /// Fails on IO or serialization errors.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// The full gamma × alpha parameter grid.
    ///
    /// # Errors
    ///
    /// Propagates parameter validation failures.
    pub fn pdi_param_grid(&self) -> Result<Vec<PdiParams>> {
        let mut grid = Vec::with_capacity(self.gammas.len() * self.alphas.len());
        for &gamma in &self.gammas {
            for &alpha in &self.alphas {
                grid.push(PdiParams::new(gamma, alpha, self.xmin)?);
            }
        }
        Ok(grid)
    }
}

/// Outcome of one stage: artifacts produced vs. skipped on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Which stage ran.
    pub stage: Stage,
    /// Artifacts (files or table rows) written.
    pub written: usize,
    /// Artifacts skipped because they already existed.
    pub skipped: usize,
}

/// One method/parameter combination of the run.
#[derive(Debug, Clone, Copy)]
struct Combo {
    method: Method,
    params: Option<PdiParams>,
}

impl Combo {
    fn gamma(&self) -> Option<f64> {
        self.params.map(|p| p.gamma)
    }

    fn alpha(&self) -> Option<f64> {
        self.params.map(|p| p.alpha)
    }
}

/// FNV-1a over a tag string, mixed with the master seed. Stable across runs
/// and platforms, unlike the std hasher.
fn derive_seed(base: u64, tag: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ base;
    for &byte in tag.as_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Executes the stages of a [`RunConfig`] against one event log.
pub struct Pipeline {
    config: RunConfig,
    layout: StoreLayout,
    table: CascadeTable,
    cleaning: CleaningReport,
}

impl Pipeline {
    /// Load the event log, drop non-reconstructible cascades, and prepare the
    /// artifact layout.
    ///
    /// # Errors
    ///
    /// Fails when the event log cannot be read or contains no
    /// reconstructible cascade.
    pub fn new(config: RunConfig) -> Result<Self> {
        let mut table = CascadeTable::load_csv(&config.events)?;
        let cleaning = table.retain_reconstructible();
        if table.is_empty() {
            return Err(RecastError::EmptyInput {
                what: format!(
                    "no reconstructible cascade in {}",
                    config.events.display()
                ),
            });
        }
        let layout = StoreLayout::new(&config.data_dir);
        Ok(Self {
            config,
            layout,
            table,
            cleaning,
        })
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// What the cleaning pass dropped.
    #[must_use]
    pub fn cleaning_report(&self) -> CleaningReport {
        self.cleaning
    }

    /// The cleaned cascade table.
    #[must_use]
    pub fn table(&self) -> &CascadeTable {
        &self.table
    }

    /// Run the configured stages in order, fail-fast. Writes the run
    /// manifest first so interrupted runs stay reproducible.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure, naming the stage.
    pub fn run(&self) -> Result<Vec<StageReport>> {
        self.config.save(&self.layout.run_config_path())?;

        let mut reports = Vec::new();
        for stage in Stage::ORDER {
            if !self.config.stages.contains(&stage) {
                continue;
            }
            let report = self.run_stage(stage).map_err(|err| {
                RecastError::Other(format!("{stage} stage failed: {err}"))
            })?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Run a single stage.
    ///
    /// # Errors
    ///
    /// Propagates the stage's failure.
    pub fn run_stage(&self, stage: Stage) -> Result<StageReport> {
        match stage {
            Stage::Reconstruct => self.run_reconstruct(),
            Stage::Networks => self.run_networks(),
            Stage::Centralities => self.run_centralities(),
            Stage::Similarity => self.run_similarity(),
            Stage::Communities => self.run_communities(),
            Stage::Stats => self.run_stats(),
        }
    }

    fn combos(&self) -> Result<Vec<Combo>> {
        let mut combos = Vec::new();
        for &method in &self.config.methods {
            match method {
                Method::Pdi => {
                    for params in self.config.pdi_param_grid()? {
                        combos.push(Combo {
                            method,
                            params: Some(params),
                        });
                    }
                }
                Method::Random | Method::Tid => combos.push(Combo {
                    method,
                    params: None,
                }),
            }
        }
        Ok(combos)
    }

    fn versions_for(&self, method: Method) -> usize {
        match method {
            Method::Tid => 1,
            Method::Pdi | Method::Random => self.config.variants,
        }
    }

    fn combo_dir(&self, combo: &Combo) -> PathBuf {
        self.layout.param_dir(combo.method, combo.params.as_ref())
    }

    fn combo_tag(combo: &Combo) -> String {
        match combo.params {
            Some(p) => format!("{}/g{}/a{}", combo.method, p.gamma, p.alpha),
            None => combo.method.to_string(),
        }
    }

    /// Load one cascade's variant for a given network version. Cascades with
    /// a single variant (length-2, or deterministic methods) serve it for
    /// every version.
    fn load_variant(
        &self,
        param_dir: &Path,
        cascade: &Cascade,
        version: usize,
    ) -> Result<CascadeVariant> {
        let cascade_dir = self.layout.cascade_dir(param_dir, cascade.id());
        let exact = self.layout.variant_path(&cascade_dir, version);
        if exact.exists() {
            return store::read_variant(&exact, cascade.id(), version);
        }
        let first = self.layout.variant_path(&cascade_dir, 1);
        store::read_variant(&first, cascade.id(), version)
    }

    fn run_reconstruct(&self) -> Result<StageReport> {
        let cascades: Vec<&Cascade> = self.table.iter().collect();
        let mut written = 0;
        let mut skipped = 0;

        for combo in self.combos()? {
            let param_dir = self.combo_dir(&combo);
            let tag = Self::combo_tag(&combo);

            let counts: Vec<(usize, usize)> = cascades
                .par_iter()
                .map(|cascade| -> Result<(usize, usize)> {
                    let cascade_dir = self.layout.cascade_dir(&param_dir, cascade.id());
                    let expected = match combo.method {
                        Method::Tid => 1,
                        _ => variant_count(cascade.len(), self.config.variants),
                    };
                    if !self.config.force
                        && self.layout.variant_versions(&cascade_dir)?.len() == expected
                    {
                        return Ok((0, expected));
                    }

                    let seed = derive_seed(self.config.seed, &format!("{tag}/{}", cascade.id()));
                    let variants = match combo.method {
                        Method::Pdi => {
                            let params = combo.params.ok_or_else(|| {
                                RecastError::Other("pdi combo without parameters".to_string())
                            })?;
                            PdiReconstructor::new(params).variants(
                                cascade,
                                self.config.variants,
                                seed,
                            )?
                        }
                        Method::Random => RandomReconstructor.variants(
                            cascade,
                            self.config.variants,
                            seed,
                        )?,
                        Method::Tid => vec![tid_reconstruction(cascade)?],
                    };
                    for variant in &variants {
                        let path = self.layout.variant_path(&cascade_dir, variant.version);
                        store::write_variant(&path, variant)?;
                    }
                    Ok((variants.len(), 0))
                })
                .collect::<Result<Vec<_>>>()?;

            for (w, s) in counts {
                written += w;
                skipped += s;
            }
        }
        Ok(StageReport {
            stage: Stage::Reconstruct,
            written,
            skipped,
        })
    }

    fn run_networks(&self) -> Result<StageReport> {
        let mut written = 0;
        let mut skipped = 0;

        let naive_path = self.layout.naive_network_path();
        if store::can_skip(&naive_path, self.config.force) {
            skipped += 1;
        } else {
            store::write_network(&naive_path, &naive_network(&self.table))?;
            written += 1;
        }

        let cascades: Vec<&Cascade> = self.table.iter().collect();
        for combo in self.combos()? {
            let param_dir = self.combo_dir(&combo);
            let versions = self.versions_for(combo.method);

            let counts: Vec<(usize, usize)> = (1..=versions)
                .into_par_iter()
                .map(|version| -> Result<(usize, usize)> {
                    let path = self.layout.network_path(&param_dir, version);
                    if store::can_skip(&path, self.config.force) {
                        return Ok((0, 1));
                    }
                    let variants: Vec<CascadeVariant> = cascades
                        .iter()
                        .map(|cascade| self.load_variant(&param_dir, cascade, version))
                        .collect::<Result<Vec<_>>>()?;
                    let refs: Vec<&CascadeVariant> = variants.iter().collect();
                    let network = merge_cascade_variants(&self.table, &refs);
                    store::write_network(&path, &network)?;
                    Ok((1, 0))
                })
                .collect::<Result<Vec<_>>>()?;

            for (w, s) in counts {
                written += w;
                skipped += s;
            }
        }
        Ok(StageReport {
            stage: Stage::Networks,
            written,
            skipped,
        })
    }

    fn centrality_rows(
        &self,
        method: &str,
        gamma: Option<f64>,
        alpha: Option<f64>,
        version: usize,
        network: &DiffusionNetwork,
    ) -> Result<Vec<CentralityRecord>> {
        let degree = network.out_degree();
        let strength = network.out_strength();
        let coreness = network.out_coreness();
        let eigenvector =
            network.eigenvector_centrality(EIGENVECTOR_MAX_ITER, EIGENVECTOR_TOL)?;

        Ok((0..network.num_nodes())
            .map(|v| CentralityRecord {
                method: method.to_string(),
                gamma,
                alpha,
                version,
                user_id: network.label(v).to_string(),
                out_degree: degree[v],
                out_strength: strength[v],
                out_coreness: coreness[v],
                eigenvector: eigenvector[v],
            })
            .collect())
    }

    fn run_centralities(&self) -> Result<StageReport> {
        let naive = store::read_network(&self.layout.naive_network_path())?;
        let mut records = self.centrality_rows("naive", None, None, 1, &naive)?;

        for combo in self.combos()? {
            let param_dir = self.combo_dir(&combo);
            let versions = self.versions_for(combo.method);

            let mut combo_rows: Vec<Vec<CentralityRecord>> = (1..=versions)
                .into_par_iter()
                .map(|version| -> Result<Vec<CentralityRecord>> {
                    let network =
                        store::read_network(&self.layout.network_path(&param_dir, version))?;
                    self.centrality_rows(
                        combo.method.as_str(),
                        combo.gamma(),
                        combo.alpha(),
                        version,
                        &network,
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            for rows in combo_rows.drain(..) {
                records.extend(rows);
            }
        }

        let written = records.len();
        store::write_csv(&self.layout.table_path("centralities"), &records)?;
        Ok(StageReport {
            stage: Stage::Centralities,
            written,
            skipped: 0,
        })
    }

    fn run_similarity(&self) -> Result<StageReport> {
        let tid_dir = self
            .config
            .methods
            .contains(&Method::Tid)
            .then(|| self.layout.param_dir(Method::Tid, None));
        let cascades: Vec<&Cascade> = self.table.iter().collect();

        let mut records = Vec::new();
        for combo in self.combos()? {
            if combo.method == Method::Tid {
                continue;
            }
            let param_dir = self.combo_dir(&combo);

            let rows: Vec<SimilarityRecord> = cascades
                .par_iter()
                .map(|cascade| -> Result<SimilarityRecord> {
                    let cascade_dir = self.layout.cascade_dir(&param_dir, cascade.id());
                    let versions = self.layout.variant_versions(&cascade_dir)?;
                    let variants: Vec<CascadeVariant> = versions
                        .iter()
                        .map(|&v| {
                            store::read_variant(
                                &self.layout.variant_path(&cascade_dir, v),
                                cascade.id(),
                                v,
                            )
                        })
                        .collect::<Result<Vec<_>>>()?;

                    // Protocol: each variant vs. the TID wiring when TID ran,
                    // otherwise all pairs of the stochastic variants.
                    let mut jaccards = Vec::new();
                    let mut mismatches = Vec::new();
                    let protocol;
                    if let Some(tid_dir) = &tid_dir {
                        protocol = "vs_tid";
                        let reference = self.load_variant(tid_dir, cascade, 1)?;
                        for variant in &variants {
                            let sim = edge_similarity(variant, &reference)?;
                            jaccards.push(sim.jaccard);
                            mismatches.push(sim.prop_mismatched_parents);
                        }
                    } else {
                        protocol = "all_pairs";
                        for (i, a) in variants.iter().enumerate() {
                            for b in variants.iter().skip(i + 1) {
                                let sim = edge_similarity(a, b)?;
                                jaccards.push(sim.jaccard);
                                mismatches.push(sim.prop_mismatched_parents);
                            }
                        }
                    }
                    if jaccards.is_empty() {
                        // Single-variant cascade under the all-pairs protocol.
                        jaccards.push(1.0);
                        mismatches.push(0.0);
                    }

                    let seed = derive_seed(
                        self.config.seed,
                        &format!("similarity/{}/{}", Self::combo_tag(&combo), cascade.id()),
                    );
                    let jaccard_ci =
                        bootstrap_ci(&jaccards, CONFIDENCE, self.config.bootstrap_resamples, seed)?;
                    let mismatch_ci = bootstrap_ci(
                        &mismatches,
                        CONFIDENCE,
                        self.config.bootstrap_resamples,
                        seed.wrapping_add(1),
                    )?;

                    Ok(SimilarityRecord {
                        method: combo.method.to_string(),
                        gamma: combo.gamma(),
                        alpha: combo.alpha(),
                        cascade_id: cascade.id().to_string(),
                        protocol: protocol.to_string(),
                        comparisons: jaccards.len(),
                        mean_jaccard: jaccard_ci.mean,
                        jaccard_ci_low: jaccard_ci.lower,
                        jaccard_ci_high: jaccard_ci.upper,
                        mean_mismatched: mismatch_ci.mean,
                        mismatched_ci_low: mismatch_ci.lower,
                        mismatched_ci_high: mismatch_ci.upper,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            records.extend(rows);
        }

        let written = records.len();
        store::write_csv(&self.layout.table_path("similarity"), &records)?;
        Ok(StageReport {
            stage: Stage::Similarity,
            written,
            skipped: 0,
        })
    }

    fn run_communities(&self) -> Result<StageReport> {
        let reps = self.config.community_reps.max(1);
        let naive = store::read_network(&self.layout.naive_network_path())?.to_undirected();

        // The reference partition is the naive network's first run.
        let reference = naive.louvain(derive_seed(self.config.seed, "communities/naive/0"));

        let mut records = Vec::new();
        for rep in 0..reps {
            let partition = if rep == 0 {
                reference.clone()
            } else {
                naive.louvain(derive_seed(self.config.seed, &format!("communities/naive/{rep}")))
            };
            records.push(community_record("naive", None, None, 1, rep, &naive, &partition, &reference));
        }

        for combo in self.combos()? {
            let param_dir = self.combo_dir(&combo);
            let versions = self.versions_for(combo.method);
            let tag = Self::combo_tag(&combo);

            let rows: Vec<Vec<CommunityRecord>> = (1..=versions)
                .into_par_iter()
                .map(|version| -> Result<Vec<CommunityRecord>> {
                    let network =
                        store::read_network(&self.layout.network_path(&param_dir, version))?
                            .to_undirected();
                    let mut rows = Vec::with_capacity(reps);
                    for rep in 0..reps {
                        let seed = derive_seed(
                            self.config.seed,
                            &format!("communities/{tag}/{version}/{rep}"),
                        );
                        let partition = network.louvain(seed);
                        rows.push(community_record(
                            combo.method.as_str(),
                            combo.gamma(),
                            combo.alpha(),
                            version,
                            rep,
                            &network,
                            &partition,
                            &reference,
                        ));
                    }
                    Ok(rows)
                })
                .collect::<Result<Vec<_>>>()?;
            for row in rows {
                records.extend(row);
            }
        }

        let written = records.len();
        store::write_csv(&self.layout.table_path("communities"), &records)?;
        Ok(StageReport {
            stage: Stage::Communities,
            written,
            skipped: 0,
        })
    }

    fn run_stats(&self) -> Result<StageReport> {
        let mut written = 0;
        written += self.write_cascade_metrics()?;
        written += self.write_strength_tables()?;
        written += self.write_alpha_fits()?;
        Ok(StageReport {
            stage: Stage::Stats,
            written,
            skipped: 0,
        })
    }

    /// Per-variant cascade metrics, plus cosine similarity of per-cascade
    /// mean metric vectors against the TID baseline.
    fn write_cascade_metrics(&self) -> Result<usize> {
        let cascades: Vec<&Cascade> = self.table.iter().collect();
        let mut records: Vec<MetricsRecord> = Vec::new();

        for combo in self.combos()? {
            let param_dir = self.combo_dir(&combo);
            let rows: Vec<Vec<MetricsRecord>> = cascades
                .par_iter()
                .map(|cascade| -> Result<Vec<MetricsRecord>> {
                    let cascade_dir = self.layout.cascade_dir(&param_dir, cascade.id());
                    let versions = self.layout.variant_versions(&cascade_dir)?;
                    versions
                        .iter()
                        .map(|&v| {
                            let variant = store::read_variant(
                                &self.layout.variant_path(&cascade_dir, v),
                                cascade.id(),
                                v,
                            )?;
                            let metrics = cascade_metrics(
                                &variant,
                                cascade,
                                combo.gamma(),
                                combo.alpha(),
                            )?;
                            Ok(MetricsRecord {
                                method: combo.method.to_string(),
                                gamma: metrics.gamma,
                                alpha: metrics.alpha,
                                cascade_id: metrics.cascade_id,
                                version: metrics.version,
                                size: metrics.size,
                                time_span_seconds: metrics.time_span_seconds,
                                unique_users: metrics.unique_users,
                                depth: metrics.depth,
                                max_breadth: metrics.max_breadth,
                                structural_virality: metrics.structural_virality,
                            })
                        })
                        .collect()
                })
                .collect::<Result<Vec<_>>>()?;
            for row in rows {
                records.extend(row);
            }
        }

        let mut written = records.len();
        store::write_csv(&self.layout.table_path("cascade_metrics"), &records)?;

        // Structure-metric cosine similarity: per-cascade mean vectors of each
        // stochastic combo against the TID vectors.
        if self.config.methods.contains(&Method::Tid) {
            let cosine = self.metric_cosines(&records)?;
            written += cosine.len();
            store::write_csv(&self.layout.table_path("metrics_cosine"), &cosine)?;
        }
        Ok(written)
    }

    fn metric_cosines(&self, records: &[MetricsRecord]) -> Result<Vec<CosineRecord>> {
        // (method, gamma, alpha) -> cascade -> (sum of metric vector, count).
        type Key = (String, Option<u64>, Option<u64>);
        let key_of = |r: &MetricsRecord| -> Key {
            (
                r.method.clone(),
                r.gamma.map(f64::to_bits),
                r.alpha.map(f64::to_bits),
            )
        };

        let mut per_combo: BTreeMap<Key, BTreeMap<String, ([f64; 3], usize)>> = BTreeMap::new();
        for record in records {
            let entry = per_combo
                .entry(key_of(record))
                .or_default()
                .entry(record.cascade_id.clone())
                .or_insert(([0.0; 3], 0));
            entry.0[0] += record.depth as f64;
            entry.0[1] += record.max_breadth as f64;
            entry.0[2] += record.structural_virality;
            entry.1 += 1;
        }

        let tid_key: Key = (Method::Tid.to_string(), None, None);
        let Some(tid_means) = per_combo.get(&tid_key).cloned() else {
            return Ok(Vec::new());
        };

        let metric_names = ["depth", "max_breadth", "structural_virality"];
        let mut cosines = Vec::new();
        for (key, cascades) in &per_combo {
            if *key == tid_key {
                continue;
            }
            for (m, name) in metric_names.iter().enumerate() {
                let mut ours = Vec::new();
                let mut theirs = Vec::new();
                for (cascade_id, (sums, count)) in cascades {
                    if let Some((tid_sums, tid_count)) = tid_means.get(cascade_id) {
                        ours.push(sums[m] / *count as f64);
                        theirs.push(tid_sums[m] / *tid_count as f64);
                    }
                }
                if ours.is_empty() {
                    continue;
                }
                let cosine = match cosine_similarity(&ours, &theirs) {
                    Ok(c) => c,
                    // All-zero metric vectors (e.g. flat cascades) have no angle.
                    Err(_) => continue,
                };
                cosines.push(CosineRecord {
                    method: key.0.clone(),
                    gamma: key.1.map(f64::from_bits),
                    alpha: key.2.map(f64::from_bits),
                    metric: (*name).to_string(),
                    cascades: ours.len(),
                    cosine,
                });
            }
        }
        Ok(cosines)
    }

    /// Strength change vs. the naive baseline, Spearman correlations, and
    /// top-k influencer overlap.
    fn write_strength_tables(&self) -> Result<usize> {
        let naive = store::read_network(&self.layout.naive_network_path())?;
        let naive_strength = naive.out_strength();
        let naive_degree: Vec<f64> = naive.out_degree().iter().map(|&d| d as f64).collect();
        let naive_core: Vec<f64> = naive.out_coreness().iter().map(|&c| c as f64).collect();
        let naive_eigen = naive.eigenvector_centrality(EIGENVECTOR_MAX_ITER, EIGENVECTOR_TOL)?;

        let mut change_records: Vec<StrengthChangeRecord> = Vec::new();
        let mut correlation_records: Vec<CorrelationRecord> = Vec::new();
        let mut topk_records: Vec<TopKRecord> = Vec::new();

        for combo in self.combos()? {
            let param_dir = self.combo_dir(&combo);
            let versions = self.versions_for(combo.method);

            // user -> (sum of change, versions seen)
            let mut mean_change: BTreeMap<String, (f64, usize)> = BTreeMap::new();

            type VersionStats = (Vec<StrengthChange>, CorrelationRecord, Vec<TopKRecord>);
            let per_version: Vec<VersionStats> =
                (1..=versions)
                    .into_par_iter()
                    .map(|version| -> Result<VersionStats> {
                        let network =
                            store::read_network(&self.layout.network_path(&param_dir, version))?;
                        let changes = strength_changes(&network, &naive);
                        if changes.len() < 3 {
                            return Err(RecastError::EmptyInput {
                                what: format!(
                                    "fewer than 3 shared users between {} version {version} and the naive network",
                                    Self::combo_tag(&combo)
                                ),
                            });
                        }

                        let ours: Vec<f64> = changes.iter().map(|c| c.reconstructed).collect();
                        let theirs: Vec<f64> = changes.iter().map(|c| c.baseline).collect();
                        let correlation = spearman(&ours, &theirs)?;
                        let correlation_record = CorrelationRecord {
                            method: combo.method.to_string(),
                            gamma: combo.gamma(),
                            alpha: combo.alpha(),
                            version,
                            shared_users: changes.len(),
                            rho: correlation.rho,
                            p_value: correlation.p_value,
                        };

                        // Centrality vectors restricted to the shared users.
                        let strength = network.out_strength();
                        let degree: Vec<f64> =
                            network.out_degree().iter().map(|&d| d as f64).collect();
                        let core: Vec<f64> =
                            network.out_coreness().iter().map(|&c| c as f64).collect();
                        let eigen = network
                            .eigenvector_centrality(EIGENVECTOR_MAX_ITER, EIGENVECTOR_TOL)?;

                        let mut ours_by_centrality: [Vec<f64>; 4] = Default::default();
                        let mut naive_by_centrality: [Vec<f64>; 4] = Default::default();
                        for change in &changes {
                            let v = network
                                .node_id(&change.user_id)
                                .ok_or_else(|| missing_user(&change.user_id))?;
                            let n = naive
                                .node_id(&change.user_id)
                                .ok_or_else(|| missing_user(&change.user_id))?;
                            ours_by_centrality[0].push(degree[v]);
                            ours_by_centrality[1].push(strength[v]);
                            ours_by_centrality[2].push(core[v]);
                            ours_by_centrality[3].push(eigen[v]);
                            naive_by_centrality[0].push(naive_degree[n]);
                            naive_by_centrality[1].push(naive_strength[n]);
                            naive_by_centrality[2].push(naive_core[n]);
                            naive_by_centrality[3].push(naive_eigen[n]);
                        }

                        let centrality_names =
                            ["out_degree", "out_strength", "out_coreness", "eigenvector"];
                        let mut topk = Vec::new();
                        for (c, name) in centrality_names.iter().enumerate() {
                            for &k in &TOP_K_PERCENTS {
                                let jaccard = top_k_jaccard(
                                    &ours_by_centrality[c],
                                    &naive_by_centrality[c],
                                    k,
                                )?;
                                topk.push(TopKRecord {
                                    method: combo.method.to_string(),
                                    gamma: combo.gamma(),
                                    alpha: combo.alpha(),
                                    version,
                                    centrality: (*name).to_string(),
                                    k_percent: k,
                                    jaccard,
                                });
                            }
                        }
                        Ok((changes, correlation_record, topk))
                    })
                    .collect::<Result<Vec<_>>>()?;

            for (changes, correlation, topk) in per_version {
                for change in changes {
                    let entry = mean_change.entry(change.user_id).or_insert((0.0, 0));
                    entry.0 += change.change;
                    entry.1 += 1;
                }
                correlation_records.push(correlation);
                topk_records.extend(topk);
            }

            for (user_id, (total, count)) in mean_change {
                change_records.push(StrengthChangeRecord {
                    method: combo.method.to_string(),
                    gamma: combo.gamma(),
                    alpha: combo.alpha(),
                    user_id,
                    mean_change: total / count as f64,
                    versions: count,
                });
            }
        }

        let written = change_records.len() + correlation_records.len() + topk_records.len();
        store::write_csv(&self.layout.table_path("strength_changes"), &change_records)?;
        store::write_csv(
            &self.layout.table_path("strength_correlations"),
            &correlation_records,
        )?;
        store::write_csv(&self.layout.table_path("top_k_jaccard"), &topk_records)?;
        Ok(written)
    }

    /// Size-stratified power-law exponent fits over inter-event gaps.
    fn write_alpha_fits(&self) -> Result<usize> {
        use crate::reconstruct::powerlaw::{
            simulate_fits, stratify_by_min_size, SplitMode,
        };
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let diffs: Vec<(usize, Vec<f64>)> = self
            .table
            .iter()
            .map(|c| (c.len(), c.time_differences(TimeDiffMode::MostRecent)))
            .collect();

        let mut records = Vec::new();
        for (mode, mode_name) in [(SplitMode::Hard, "hard"), (SplitMode::AtLeast, "at_least")] {
            let strata = stratify_by_min_size(
                diffs.iter().map(|(size, d)| (*size, d.as_slice())),
                mode,
            );
            for (min_size, samples) in &strata {
                if samples.is_empty() {
                    continue;
                }
                let seed = derive_seed(
                    self.config.seed,
                    &format!("alpha_fits/{mode_name}/{min_size}"),
                );
                let mut rng = StdRng::seed_from_u64(seed);
                let sample_size = samples.len().min(10_000);
                let fits = simulate_fits(
                    samples,
                    sample_size,
                    self.config.fit_sims,
                    self.config.xmin,
                    &mut rng,
                )?;
                for fit in fits {
                    records.push(AlphaFitRecord {
                        split_mode: mode_name.to_string(),
                        min_size: *min_size,
                        n_samples: samples.len(),
                        run: fit.run,
                        xmin: fit.xmin,
                        alpha: fit.alpha,
                    });
                }
            }
        }

        let written = records.len();
        store::write_csv(&self.layout.table_path("alpha_fits"), &records)?;
        Ok(written)
    }
}

fn missing_user(user_id: &str) -> RecastError {
    RecastError::Other(format!("user {user_id} vanished between networks"))
}

#[allow(clippy::too_many_arguments)]
fn community_record(
    method: &str,
    gamma: Option<f64>,
    alpha: Option<f64>,
    version: usize,
    rep: usize,
    network: &DiffusionNetwork,
    partition: &Partition,
    reference: &Partition,
) -> CommunityRecord {
    CommunityRecord {
        method: method.to_string(),
        gamma,
        alpha,
        version,
        rep,
        n_communities: partition.n_communities(),
        modularity: network.modularity(partition.membership()),
        jaccard_vs_reference: partition_jaccard(partition, reference),
    }
}

/// One row of `centralities.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct CentralityRecord {
    /// Reconstruction method (or `naive`).
    pub method: String,
    /// PDI gamma, if applicable.
    pub gamma: Option<f64>,
    /// PDI alpha, if applicable.
    pub alpha: Option<f64>,
    /// Network version.
    pub version: usize,
    /// User label.
    pub user_id: String,
    /// Out-degree.
    pub out_degree: usize,
    /// Weighted out-degree.
    pub out_strength: f64,
    /// Out-degree k-core number.
    pub out_coreness: usize,
    /// Weighted eigenvector centrality.
    pub eigenvector: f64,
}

/// One row of `similarity.csv`: per-cascade variant agreement with CIs.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityRecord {
    pub method: String,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub cascade_id: String,
    pub protocol: String,
    pub comparisons: usize,
    pub mean_jaccard: f64,
    pub jaccard_ci_low: f64,
    pub jaccard_ci_high: f64,
    pub mean_mismatched: f64,
    pub mismatched_ci_low: f64,
    pub mismatched_ci_high: f64,
}

/// One row of `communities.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct CommunityRecord {
    pub method: String,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub version: usize,
    pub rep: usize,
    pub n_communities: usize,
    pub modularity: f64,
    pub jaccard_vs_reference: f64,
}

/// One row of `cascade_metrics.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsRecord {
    pub method: String,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub cascade_id: String,
    pub version: usize,
    pub size: usize,
    pub time_span_seconds: i64,
    pub unique_users: usize,
    pub depth: usize,
    pub max_breadth: usize,
    pub structural_virality: f64,
}

/// One row of `metrics_cosine.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct CosineRecord {
    pub method: String,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub metric: String,
    pub cascades: usize,
    pub cosine: f64,
}

/// One row of `strength_changes.csv`: per-user mean across versions.
#[derive(Debug, Clone, Serialize)]
pub struct StrengthChangeRecord {
    pub method: String,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub user_id: String,
    pub mean_change: f64,
    pub versions: usize,
}

/// One row of `strength_correlations.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationRecord {
    pub method: String,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub version: usize,
    pub shared_users: usize,
    pub rho: f64,
    pub p_value: f64,
}

/// One row of `top_k_jaccard.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct TopKRecord {
    pub method: String,
    pub gamma: Option<f64>,
    pub alpha: Option<f64>,
    pub version: usize,
    pub centrality: String,
    pub k_percent: f64,
    pub jaccard: f64,
}

/// One row of `alpha_fits.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct AlphaFitRecord {
    pub split_mode: String,
    pub min_size: i64,
    pub n_samples: usize,
    pub run: usize,
    pub xmin: f64,
    pub alpha: f64,
}
