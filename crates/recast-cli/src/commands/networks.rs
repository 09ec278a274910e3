//! `recast networks`: merge cascade variants into network versions.

use std::path::Path;

use recast::pipeline::Stage;

use super::{execute_stage, load_manifest, GlobalFlags};
use crate::error::Result;

pub(crate) fn run(
    data_dir: &Path,
    versions: Option<usize>,
    force: bool,
    flags: GlobalFlags,
) -> Result<()> {
    let mut config = load_manifest(data_dir)?;
    if let Some(versions) = versions {
        config.variants = versions;
    }
    config.force = force;
    execute_stage(config, Stage::Networks, flags)
}
