//! recast - cascade reconstruction pipeline CLI
//!
//! Usage:
//!   recast reconstruct --data-dir data --events events.csv --method pdi
//!   recast networks --data-dir data
//!   recast naive --data-dir data --events events.csv
//!   recast centralities --data-dir data
//!   recast similarity --data-dir data --vs-tid
//!   recast communities --data-dir data --reps 10
//!   recast compare --data-dir data
//!   recast fit-alpha --events events.csv --fits 100
//!   recast run --config run.json

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod error;
mod output;

use commands::{
    centralities, communities, compare, fit_alpha, naive, networks, reconstruct, run,
    similarity, GlobalFlags,
};

/// recast - reconstruct information-diffusion cascades and measure how the
/// reconstruction assumptions distort network analyses.
#[derive(Parser)]
#[command(name = "recast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate cascade variants for one reconstruction method
    Reconstruct {
        /// Data directory for run artifacts
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Event-log CSV
        #[arg(long, value_name = "FILE")]
        events: PathBuf,

        /// Reconstruction method: pdi, random, or tid
        #[arg(long, default_value = "pdi")]
        method: String,

        /// Gamma sweep (PDI only); defaults to the study grid
        #[arg(long, value_delimiter = ',')]
        gamma: Vec<f64>,

        /// Alpha sweep (PDI only); defaults to the study grid
        #[arg(long, value_delimiter = ',')]
        alpha: Vec<f64>,

        /// Variants per cascade
        #[arg(long, default_value = "100")]
        variants: usize,

        /// Master seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Regenerate artifacts that already exist
        #[arg(long)]
        force: bool,
    },

    /// Merge variants into per-version diffusion networks
    Networks {
        /// Data directory for run artifacts
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Number of network versions (defaults to the run's variant count)
        #[arg(long)]
        versions: Option<usize>,

        /// Regenerate artifacts that already exist
        #[arg(long)]
        force: bool,
    },

    /// Build the star-shaped naive baseline network
    Naive {
        /// Data directory for run artifacts
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Event-log CSV
        #[arg(long, value_name = "FILE")]
        events: PathBuf,
    },

    /// Compute node centralities for every network version
    Centralities {
        /// Data directory for run artifacts
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,
    },

    /// Measure variant agreement between reconstruction methods
    Similarity {
        /// Data directory for run artifacts
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Require comparison against the TID reconstruction
        #[arg(long)]
        vs_tid: bool,
    },

    /// Detect communities and measure partition stability
    Communities {
        /// Data directory for run artifacts
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Louvain runs per network
        #[arg(long)]
        reps: Option<usize>,

        /// Seed override for the Louvain visiting order
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Strength change, Spearman correlations, top-k overlap, exponent fits
    Compare {
        /// Data directory for run artifacts
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,
    },

    /// Bootstrap power-law exponent estimation over inter-event gaps
    FitAlpha {
        /// Event-log CSV
        #[arg(long, value_name = "FILE")]
        events: PathBuf,

        /// Resample size per fit (defaults to the stratum size, capped)
        #[arg(long)]
        sample_size: Option<usize>,

        /// Number of bootstrap fits per stratum
        #[arg(long, default_value = "100")]
        fits: usize,

        /// Power-law xmin in seconds
        #[arg(long, default_value = "1.0")]
        xmin: f64,

        /// Size stratification: hard or at-least
        #[arg(long, default_value = "hard")]
        split: String,

        /// Master seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Also write every fit to this CSV
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Run the full fail-fast pipeline from a JSON manifest
    Run {
        /// Run manifest (run.json)
        #[arg(long, value_name = "FILE")]
        config: PathBuf,

        /// Regenerate artifacts that already exist
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let flags = GlobalFlags {
        json: cli.json,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::Reconstruct {
            data_dir,
            events,
            method,
            gamma,
            alpha,
            variants,
            seed,
            force,
        } => reconstruct::run(
            &data_dir, &events, &method, &gamma, &alpha, variants, seed, force, flags,
        ),

        Commands::Networks {
            data_dir,
            versions,
            force,
        } => networks::run(&data_dir, versions, force, flags),

        Commands::Naive { data_dir, events } => naive::run(&data_dir, &events, flags),

        Commands::Centralities { data_dir } => centralities::run(&data_dir, flags),

        Commands::Similarity { data_dir, vs_tid } => similarity::run(&data_dir, vs_tid, flags),

        Commands::Communities {
            data_dir,
            reps,
            seed,
        } => communities::run(&data_dir, reps, seed, flags),

        Commands::Compare { data_dir } => compare::run(&data_dir, flags),

        Commands::FitAlpha {
            events,
            sample_size,
            fits,
            xmin,
            split,
            seed,
            output,
        } => fit_alpha::run(
            &events,
            sample_size,
            fits,
            xmin,
            &split,
            seed,
            output.as_deref(),
            flags,
        ),

        Commands::Run { config, force } => run::run(&config, force, flags),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
