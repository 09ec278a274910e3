//! `recast compare`: strength change, correlations, top-k overlap, fits.

use std::path::Path;

use recast::pipeline::Stage;

use super::{execute_stage, load_manifest, GlobalFlags};
use crate::error::Result;

pub(crate) fn run(data_dir: &Path, flags: GlobalFlags) -> Result<()> {
    let config = load_manifest(data_dir)?;
    execute_stage(config, Stage::Stats, flags)
}
