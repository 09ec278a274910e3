//! Subcommand implementations.

pub(crate) mod centralities;
pub(crate) mod communities;
pub(crate) mod compare;
pub(crate) mod fit_alpha;
pub(crate) mod naive;
pub(crate) mod networks;
pub(crate) mod reconstruct;
pub(crate) mod run;
pub(crate) mod similarity;

use std::path::Path;

use recast::pipeline::{Pipeline, RunConfig, Stage};
use recast::reconstruct::Method;
use recast::store::StoreLayout;

use crate::error::{CliError, Result};
use crate::output;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlobalFlags {
    pub json: bool,
    pub verbose: bool,
    pub quiet: bool,
}

pub(crate) fn parse_method(name: &str) -> Result<Method> {
    match name {
        "pdi" => Ok(Method::Pdi),
        "random" => Ok(Method::Random),
        "tid" => Ok(Method::Tid),
        other => Err(CliError::InvalidArgument(format!(
            "unknown method `{other}` (expected pdi, random, or tid)"
        ))),
    }
}

pub(crate) fn require_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Load the manifest a previous `reconstruct` or `run` left in the data dir.
pub(crate) fn load_manifest(data_dir: &Path) -> Result<RunConfig> {
    let path = StoreLayout::new(data_dir).run_config_path();
    if !path.is_file() {
        return Err(CliError::FileNotFound(path));
    }
    Ok(RunConfig::load(&path)?)
}

/// Save the manifest and run a single stage, reporting the outcome.
pub(crate) fn execute_stage(config: RunConfig, stage: Stage, flags: GlobalFlags) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    pipeline
        .config()
        .save(&StoreLayout::new(&pipeline.config().data_dir).run_config_path())?;

    if flags.verbose && !flags.quiet && !flags.json {
        let cleaning = pipeline.cleaning_report();
        output::info(&format!(
            "{} cascades loaded, {} dropped as too short",
            cleaning.kept, cleaning.dropped_short
        ));
    }

    let report = pipeline
        .run_stage(stage)
        .map_err(|e| CliError::PipelineFailed(format!("{stage}: {e}")))?;
    output::stage_report(&report, flags.json, flags.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_parse() {
        assert_eq!(parse_method("pdi").unwrap(), Method::Pdi);
        assert_eq!(parse_method("random").unwrap(), Method::Random);
        assert_eq!(parse_method("tid").unwrap(), Method::Tid);
        assert!(matches!(
            parse_method("naive"),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_manifest_is_a_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest(dir.path()).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }

    #[test]
    fn manifest_round_trips_through_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new("events.csv", dir.path());
        let path = StoreLayout::new(dir.path()).run_config_path();
        config.save(&path).unwrap();

        let loaded = load_manifest(dir.path()).unwrap();
        assert_eq!(loaded.gammas, config.gammas);
        assert_eq!(loaded.variants, config.variants);
    }
}
