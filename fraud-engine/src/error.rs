//! Error types for fraud engine

use std::path::PathBuf;
use thiserror::Error;

/// Fraud engine error
///
/// Scoring itself never fails; these cover configuration loading and the
/// batch file I/O around it.
#[derive(Debug, Error)]
pub enum Error {
    /// Input file does not exist
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Output file could not be created
    #[error("Cannot write output file {}: {source}", .path.display())]
    OutputUnwritable {
        /// Output path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
