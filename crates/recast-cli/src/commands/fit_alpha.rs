//! `recast fit-alpha`: bootstrap power-law exponent estimation.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use recast::cascade::{CascadeTable, TimeDiffMode};
use recast::reconstruct::powerlaw::{simulate_fits, stratify_by_min_size, SplitMode};
use recast::stats::{mean, percentile};

use super::{require_file, GlobalFlags};
use crate::error::{CliError, Result};
use crate::output;

#[allow(clippy::too_many_arguments)]
pub(crate) fn run(
    events: &Path,
    sample_size: Option<usize>,
    fits: usize,
    xmin: f64,
    split: &str,
    seed: u64,
    output_csv: Option<&Path>,
    flags: GlobalFlags,
) -> Result<()> {
    require_file(events)?;
    let mode = match split {
        "hard" => SplitMode::Hard,
        "at-least" => SplitMode::AtLeast,
        other => {
            return Err(CliError::InvalidArgument(format!(
                "unknown split mode `{other}` (expected hard or at-least)"
            )))
        }
    };

    let mut table = CascadeTable::load_csv(events)?;
    table.retain_reconstructible();

    let diffs: Vec<(usize, Vec<f64>)> = table
        .iter()
        .map(|c| (c.len(), c.time_differences(TimeDiffMode::MostRecent)))
        .collect();
    let strata = stratify_by_min_size(
        diffs.iter().map(|(size, d)| (*size, d.as_slice())),
        mode,
    );

    let mut all_fits = Vec::new();
    for (min_size, samples) in &strata {
        if samples.is_empty() {
            continue;
        }
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(*min_size as u64));
        let size = sample_size.unwrap_or_else(|| samples.len().min(10_000));
        let results = simulate_fits(samples, size, fits, xmin, &mut rng)?;
        let alphas: Vec<f64> = results.iter().map(|f| f.alpha).collect();

        if flags.json {
            println!(
                "{}",
                serde_json::json!({
                    "min_size": min_size,
                    "samples": samples.len(),
                    "fits": results.len(),
                    "alpha_mean": mean(&alphas),
                    "alpha_p2_5": percentile(&alphas, 2.5)?,
                    "alpha_p97_5": percentile(&alphas, 97.5)?,
                })
            );
        } else if !flags.quiet {
            output::section(&format!("min cascade size {min_size}"));
            output::kv("samples", samples.len());
            output::kv("alpha (mean)", format!("{:.4}", mean(&alphas)));
            output::kv(
                "alpha (95% range)",
                format!(
                    "{:.4} – {:.4}",
                    percentile(&alphas, 2.5)?,
                    percentile(&alphas, 97.5)?
                ),
            );
        }
        for fit in results {
            all_fits.push((*min_size, fit));
        }
    }

    if let Some(path) = output_csv {
        #[derive(serde::Serialize)]
        struct Row {
            min_size: i64,
            run: usize,
            xmin: f64,
            alpha: f64,
        }
        let rows: Vec<Row> = all_fits
            .iter()
            .map(|(min_size, fit)| Row {
                min_size: *min_size,
                run: fit.run,
                xmin: fit.xmin,
                alpha: fit.alpha,
            })
            .collect();
        recast::store::write_csv(path, &rows)?;
        if !flags.quiet && !flags.json {
            output::success(&format!("wrote {} fits to {}", rows.len(), path.display()));
        }
    }
    Ok(())
}
