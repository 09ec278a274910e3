//! Error types for the recast CLI.

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid argument value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Library error
    #[error("Recast error: {0}")]
    Recast(String),

    /// Pipeline stage failure
    #[error("Pipeline failed: {0}")]
    PipelineFailed(String),
}

impl CliError {
    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound(_) => ExitCode::from(3),
            Self::InvalidArgument(_) => ExitCode::from(4),
            Self::Io(_) => ExitCode::from(7),
            Self::Recast(_) => ExitCode::from(1),
            Self::PipelineFailed(_) => ExitCode::from(5),
        }
    }
}

impl From<recast::RecastError> for CliError {
    fn from(e: recast::RecastError) -> Self {
        Self::Recast(e.to_string())
    }
}
