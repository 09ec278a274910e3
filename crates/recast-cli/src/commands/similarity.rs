//! `recast similarity`: variant agreement between reconstruction methods.

use std::path::Path;

use recast::pipeline::Stage;
use recast::reconstruct::Method;

use super::{execute_stage, load_manifest, GlobalFlags};
use crate::error::{CliError, Result};

pub(crate) fn run(data_dir: &Path, vs_tid: bool, flags: GlobalFlags) -> Result<()> {
    let config = load_manifest(data_dir)?;
    if vs_tid && !config.methods.contains(&Method::Tid) {
        return Err(CliError::InvalidArgument(
            "--vs-tid requires a run that reconstructed with the tid method".to_string(),
        ));
    }
    execute_stage(config, Stage::Similarity, flags)
}
