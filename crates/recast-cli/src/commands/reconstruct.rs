//! `recast reconstruct`: generate cascade variants for one method.

use std::path::Path;

use recast::pipeline::{RunConfig, Stage};

use super::{execute_stage, parse_method, require_file, GlobalFlags};
use crate::error::Result;

#[allow(clippy::too_many_arguments)]
pub(crate) fn run(
    data_dir: &Path,
    events: &Path,
    method: &str,
    gammas: &[f64],
    alphas: &[f64],
    variants: usize,
    seed: u64,
    force: bool,
    flags: GlobalFlags,
) -> Result<()> {
    require_file(events)?;
    let method = parse_method(method)?;

    let mut config = RunConfig::new(events, data_dir);
    config.methods = vec![method];
    if !gammas.is_empty() {
        config.gammas = gammas.to_vec();
    }
    if !alphas.is_empty() {
        config.alphas = alphas.to_vec();
    }
    config.variants = variants;
    config.seed = seed;
    config.force = force;

    execute_stage(config, Stage::Reconstruct, flags)
}
