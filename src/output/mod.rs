//! Output module for run exports and reports
//!
//! This module handles:
//! - Writing the per-run CSV export of every resolved record
//! - Loading and printing store statistics
//! - Printing the rank history of a single product

mod export;
pub mod stats;

pub use export::{export_file_name, export_records, format_records_csv};
pub use stats::{load_statistics, print_history, print_statistics, RankStatistics};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
