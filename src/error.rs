//! Error types for Recast operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;
use std::path::PathBuf;

/// Main error type for Recast operations.
///
/// # Examples
///
/// ```
/// use recast::error::RecastError;
///
/// let err = RecastError::InvalidParameter {
///     param: "gamma".to_string(),
///     value: "1.5".to_string(),
///     constraint: "must be in [0, 1]".to_string(),
/// };
/// assert!(err.to_string().contains("gamma"));
/// ```
#[derive(Debug)]
pub enum RecastError {
    /// A reconstruction or analysis parameter is out of range.
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A cascade violates a structural invariant (too short, duplicate
    /// event ids, and so on).
    InvalidCascade {
        /// Cascade identifier
        cascade_id: String,
        /// What was wrong
        message: String,
    },

    /// A pipeline artifact expected on disk is missing.
    MissingArtifact {
        /// Path that was expected to exist
        path: PathBuf,
    },

    /// Iterative computation failed to converge within the iteration limit.
    ConvergenceFailure {
        /// Number of iterations attempted
        iterations: usize,
    },

    /// Input collection was empty where at least one element is required.
    EmptyInput {
        /// What was empty
        what: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Malformed CSV event log or tabular artifact.
    Csv(csv::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for RecastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter {
                param,
                value,
                constraint,
            } => {
                write!(f, "invalid parameter `{param}` = {value}: {constraint}")
            }
            Self::InvalidCascade {
                cascade_id,
                message,
            } => write!(f, "invalid cascade `{cascade_id}`: {message}"),
            Self::MissingArtifact { path } => {
                write!(f, "missing pipeline artifact: {}", path.display())
            }
            Self::ConvergenceFailure { iterations } => {
                write!(f, "failed to converge after {iterations} iterations")
            }
            Self::EmptyInput { what } => write!(f, "empty input: {what}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Csv(e) => write!(f, "CSV error: {e}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RecastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RecastError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for RecastError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<serde_json::Error> for RecastError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience result type for Recast operations.
pub type Result<T> = std::result::Result<T, RecastError>;
