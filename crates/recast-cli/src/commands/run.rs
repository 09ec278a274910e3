//! `recast run`: the full fail-fast pipeline from a JSON manifest.

use std::path::Path;

use recast::pipeline::{Pipeline, RunConfig};

use super::{require_file, GlobalFlags};
use crate::error::{CliError, Result};
use crate::output;

pub(crate) fn run(config_path: &Path, force: bool, flags: GlobalFlags) -> Result<()> {
    require_file(config_path)?;
    let mut config = RunConfig::load(config_path)?;
    if force {
        config.force = true;
    }

    let pipeline = Pipeline::new(config)?;
    if flags.verbose && !flags.quiet && !flags.json {
        let cleaning = pipeline.cleaning_report();
        output::info(&format!(
            "{} cascades loaded, {} dropped as too short",
            cleaning.kept, cleaning.dropped_short
        ));
    }

    let reports = pipeline
        .run()
        .map_err(|e| CliError::PipelineFailed(e.to_string()))?;
    for report in &reports {
        output::stage_report(report, flags.json, flags.quiet);
    }
    if !flags.quiet && !flags.json {
        output::success(&format!("run complete, {} stages", reports.len()));
    }
    Ok(())
}
