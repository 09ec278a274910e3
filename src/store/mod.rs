//! On-disk layout and artifact IO for reconstruction runs.
//!
//! Everything a run produces lives under one data directory:
//!
//! ```text
//! <root>/
//!   run_config.json
//!   pdi/gamma_0_25/alpha_1_1/<cascade>/v_001.edges.zst
//!   pdi/gamma_0_25/alpha_1_1/network_version_001.edges.zst
//!   random/<cascade>/v_001.edges.zst
//!   tid/<cascade>/v_001.edges.zst
//!   naive_network.edges.zst
//!   *.csv
//! ```
//!
//! Edge lists are zstd-compressed tab-separated text with a header line, so
//! artifacts stay inspectable with `zstdcat`. Numeric cascade ids are
//! zero-padded to keep directory listings in cascade order.
//!
//! Large sweeps produce one file per cascade variant, which adds up to
//! millions of small files on real datasets. Merged network versions and
//! tabular outputs are single files precisely to keep the downstream stages
//! off that path; plan inode budgets around the variant tree.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{RecastError, Result};
use crate::graph::DiffusionNetwork;
use crate::reconstruct::{CascadeVariant, Method, PdiParams};

/// Compression level for edge-list artifacts (zstd default).
const ZSTD_LEVEL: i32 = 3;

/// Resolves artifact paths under a run's data directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Layout rooted at `root`. Nothing is created until first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `run_config.json` location.
    #[must_use]
    pub fn run_config_path(&self) -> PathBuf {
        self.root.join("run_config.json")
    }

    /// Directory for one method/parameter combination. PDI runs nest under
    /// `gamma_*/alpha_*`; parameter-free methods use the method name alone.
    #[must_use]
    pub fn param_dir(&self, method: Method, params: Option<&PdiParams>) -> PathBuf {
        let base = self.root.join(method.as_str());
        match params {
            Some(p) => base
                .join(format!("gamma_{}", decimal_token(p.gamma)))
                .join(format!("alpha_{}", decimal_token(p.alpha))),
            None => base,
        }
    }

    /// Directory holding one cascade's variants within a parameter dir.
    #[must_use]
    pub fn cascade_dir(&self, param_dir: &Path, cascade_id: &str) -> PathBuf {
        param_dir.join(padded_cascade_id(cascade_id))
    }

    /// Path of one variant's edge list.
    #[must_use]
    pub fn variant_path(&self, cascade_dir: &Path, version: usize) -> PathBuf {
        cascade_dir.join(format!("v_{version:03}.edges.zst"))
    }

    /// Path of one merged network version within a parameter dir.
    #[must_use]
    pub fn network_path(&self, param_dir: &Path, version: usize) -> PathBuf {
        param_dir.join(format!("network_version_{version:03}.edges.zst"))
    }

    /// Path of the naive baseline network.
    #[must_use]
    pub fn naive_network_path(&self) -> PathBuf {
        self.root.join("naive_network.edges.zst")
    }

    /// Path of a tabular output at the run root.
    #[must_use]
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }

    /// Variant versions already present in a cascade directory, sorted.
    ///
    /// # Errors
    ///
    /// Propagates directory read failures; a missing directory yields an
    /// empty list.
    pub fn variant_versions(&self, cascade_dir: &Path) -> Result<Vec<usize>> {
        if !cascade_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(cascade_dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(v) = name
                .strip_prefix("v_")
                .and_then(|rest| rest.strip_suffix(".edges.zst"))
                .and_then(|digits| digits.parse::<usize>().ok())
            {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }
}

/// `0.25` becomes `0_25`, matching the directory naming scheme.
fn decimal_token(value: f64) -> String {
    value.to_string().replace('.', "_")
}

/// Numeric cascade ids are zero-padded to five digits; anything else is used
/// verbatim.
#[must_use]
pub fn padded_cascade_id(cascade_id: &str) -> String {
    match cascade_id.parse::<u64>() {
        Ok(n) => format!("{n:05}"),
        Err(_) => cascade_id.to_string(),
    }
}

/// True when `path` exists and `force` is off, i.e. the artifact can be
/// skipped on resume.
#[must_use]
pub fn can_skip(path: &Path, force: bool) -> bool {
    !force && path.exists()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write a variant's edge list as compressed `source\ttarget` rows.
///
/// # Errors
///
/// Propagates IO and compression failures.
pub fn write_variant(path: &Path, variant: &CascadeVariant) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    let mut encoder = zstd::stream::Encoder::new(file, ZSTD_LEVEL)?;
    writeln!(encoder, "source\ttarget")?;
    for (source, target) in &variant.edges {
        writeln!(encoder, "{source}\t{target}")?;
    }
    encoder.finish()?;
    Ok(())
}

/// Read a variant edge list written by [`write_variant`].
///
/// `cascade_id` and `version` are not stored in the file; the caller derives
/// them from the path.
///
/// # Errors
///
/// Fails on IO errors or malformed rows.
pub fn read_variant(path: &Path, cascade_id: &str, version: usize) -> Result<CascadeVariant> {
    let file = File::open(path).map_err(|_| RecastError::MissingArtifact {
        path: path.to_path_buf(),
    })?;
    let reader = BufReader::new(zstd::stream::Decoder::new(file)?);

    let mut edges = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 {
            continue; // header
        }
        let mut fields = line.split('\t');
        match (fields.next(), fields.next()) {
            (Some(source), Some(target)) => {
                edges.push((source.to_string(), target.to_string()));
            }
            _ => {
                return Err(RecastError::Serialization(format!(
                    "malformed edge row {i} in {}",
                    path.display()
                )))
            }
        }
    }
    Ok(CascadeVariant {
        cascade_id: cascade_id.to_string(),
        version,
        edges,
    })
}

/// Write a weighted network as compressed `source\ttarget\tweight` rows.
///
/// # Errors
///
/// Propagates IO and compression failures.
pub fn write_network(path: &Path, network: &DiffusionNetwork) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    let mut encoder = zstd::stream::Encoder::new(file, ZSTD_LEVEL)?;
    writeln!(encoder, "source\ttarget\tweight")?;
    for (s, t, w) in network.adjacency_entries() {
        if network.is_directed() || s <= t {
            writeln!(encoder, "{}\t{}\t{w}", network.label(s), network.label(t))?;
        }
    }
    // Isolated nodes carry no edges; record them so the vertex set survives.
    let mut has_edge = vec![false; network.num_nodes()];
    for (s, t, _) in network.adjacency_entries() {
        has_edge[s] = true;
        has_edge[t] = true;
    }
    for (v, &touched) in has_edge.iter().enumerate() {
        if !touched {
            writeln!(encoder, "{}\t\t", network.label(v))?;
        }
    }
    encoder.finish()?;
    Ok(())
}

/// Read a directed weighted network written by [`write_network`].
///
/// # Errors
///
/// Fails on IO errors or malformed rows.
pub fn read_network(path: &Path) -> Result<DiffusionNetwork> {
    let file = File::open(path).map_err(|_| RecastError::MissingArtifact {
        path: path.to_path_buf(),
    })?;
    let reader = BufReader::new(zstd::stream::Decoder::new(file)?);

    let mut vertices: Vec<String> = Vec::new();
    let mut edges: Vec<(String, String, f64)> = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 || line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(source), Some(""), _) | (Some(source), None, _) => {
                vertices.push(source.to_string());
            }
            (Some(source), Some(target), Some(weight)) => {
                let weight = weight.parse::<f64>().map_err(|_| {
                    RecastError::Serialization(format!(
                        "bad weight on row {i} in {}",
                        path.display()
                    ))
                })?;
                edges.push((source.to_string(), target.to_string(), weight));
            }
            _ => {
                return Err(RecastError::Serialization(format!(
                    "malformed network row {i} in {}",
                    path.display()
                )))
            }
        }
    }

    let weighted: Vec<(&str, &str, f64)> = edges
        .iter()
        .map(|(s, t, w)| (s.as_str(), t.as_str(), *w))
        .collect();
    Ok(DiffusionNetwork::from_weighted_edges_with_vertices(
        vertices.iter(),
        &weighted,
        true,
    ))
}

/// Append-free CSV writer: serializes all `records` to `path` with headers.
///
/// # Errors
///
/// Propagates IO and serialization failures.
pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let file = BufWriter::new(File::create(path)?);
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_paths_are_stable() {
        let layout = StoreLayout::new("/data/run1");
        let params = PdiParams::new(0.25, 1.1, 1.0).unwrap();
        let param_dir = layout.param_dir(Method::Pdi, Some(&params));
        assert_eq!(
            param_dir,
            PathBuf::from("/data/run1/pdi/gamma_0_25/alpha_1_1")
        );

        let cascade_dir = layout.cascade_dir(&param_dir, "42");
        assert!(cascade_dir.ends_with("00042"));
        assert!(layout
            .variant_path(&cascade_dir, 7)
            .ends_with("v_007.edges.zst"));
        assert!(layout
            .network_path(&param_dir, 3)
            .ends_with("network_version_003.edges.zst"));

        let tid_dir = layout.param_dir(Method::Tid, None);
        assert_eq!(tid_dir, PathBuf::from("/data/run1/tid"));
    }

    #[test]
    fn decimal_tokens_match_directory_scheme() {
        assert_eq!(decimal_token(0.25), "0_25");
        assert_eq!(decimal_token(1.1), "1_1");
        assert_eq!(decimal_token(3.0), "3");
    }

    #[test]
    fn variant_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v_001.edges.zst");
        let variant = CascadeVariant {
            cascade_id: "7".to_string(),
            version: 1,
            edges: vec![
                ("e0".to_string(), "e1".to_string()),
                ("e0".to_string(), "e2".to_string()),
            ],
        };
        write_variant(&path, &variant).unwrap();
        let loaded = read_variant(&path, "7", 1).unwrap();
        assert_eq!(loaded, variant);
    }

    #[test]
    fn network_round_trip_preserves_weights() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("network_version_001.edges.zst");
        let network = DiffusionNetwork::from_weighted_edges(
            &[("alice", "bob", 3.0), ("bob", "carol", 1.5)],
            true,
        );
        write_network(&path, &network).unwrap();

        let loaded = read_network(&path).unwrap();
        assert_eq!(loaded.num_nodes(), 3);
        assert_eq!(loaded.num_edges(), 2);
        let a = loaded.node_id("alice").unwrap();
        let b = loaded.node_id("bob").unwrap();
        let pos = loaded.out_neighbors(a).iter().position(|&t| t == b).unwrap();
        assert_eq!(loaded.out_weights(a)[pos], 3.0);
    }

    #[test]
    fn missing_artifact_is_reported_with_its_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.edges.zst");
        let err = read_network(&path).unwrap_err();
        assert!(matches!(err, RecastError::MissingArtifact { .. }));
    }

    #[test]
    fn skip_logic_honors_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifact");
        assert!(!can_skip(&path, false));
        std::fs::write(&path, b"x").unwrap();
        assert!(can_skip(&path, false));
        assert!(!can_skip(&path, true));
    }

    #[test]
    fn variant_versions_sorted() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path());
        for v in [3usize, 1, 2] {
            let variant = CascadeVariant {
                cascade_id: "1".to_string(),
                version: v,
                edges: vec![("a".to_string(), "b".to_string())],
            };
            write_variant(&layout.variant_path(dir.path(), v), &variant).unwrap();
        }
        assert_eq!(layout.variant_versions(dir.path()).unwrap(), vec![1, 2, 3]);
    }
}
