//! `recast communities`: Louvain communities and partition stability.

use std::path::Path;

use recast::pipeline::Stage;

use super::{execute_stage, load_manifest, GlobalFlags};
use crate::error::Result;

pub(crate) fn run(
    data_dir: &Path,
    reps: Option<usize>,
    seed: Option<u64>,
    flags: GlobalFlags,
) -> Result<()> {
    let mut config = load_manifest(data_dir)?;
    if let Some(reps) = reps {
        config.community_reps = reps;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    execute_stage(config, Stage::Communities, flags)
}
