//! Storage traits and error types
//!
//! The tracker core talks to its store through three narrow seams:
//! `TrackingSource` supplies the items, `RankSink` receives the batches, and
//! `RunLog` records what each run did. `Storage` bundles them with the
//! management and reporting queries used by the CLI.

use crate::rank::{ProductId, RankBatch};
use crate::state::CrawlState;
use crate::storage::{CrawlLogEntry, RankRow, RunRecord, RunStatus, TrackedItem};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Supplies the items to rank on a run
pub trait TrackingSource {
    /// Lists every item marked for tracking, in source order
    fn list_tracked_items(&self) -> StorageResult<Vec<TrackedItem>>;
}

/// Accepts batches of rank rows
pub trait RankSink {
    /// Appends a batch after the existing rows of the destination `group_key`
    ///
    /// The destination is created with the fixed sheet header on first use.
    /// The whole batch is written or nothing is.
    ///
    /// # Returns
    ///
    /// The number of rows appended
    fn append_batch(&mut self, group_key: &str, batch: &RankBatch) -> StorageResult<usize>;
}

/// Records run lifecycle and per-item crawl outcomes
pub trait RunLog {
    /// Creates a new run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Records one tracked item's crawl outcome
    fn record_crawl(&mut self, run_id: i64, entry: &CrawlLogEntry) -> StorageResult<()>;
}

/// Full storage backend used by the tracker and its CLI
pub trait Storage: TrackingSource + RankSink + RunLog {
    // ===== Tracked Items =====

    /// Adds an item, or re-enables it if it already exists
    fn add_tracked_item(&mut self, id: ProductId, keyword: &str) -> StorageResult<()>;

    /// Enables or disables every item for a product id; returns rows changed
    fn set_tracking(&mut self, id: ProductId, enabled: bool) -> StorageResult<usize>;

    /// Lists all items including disabled ones
    fn list_all_tracked_items(&self) -> StorageResult<Vec<TrackedItem>>;

    // ===== Rank Sheets =====

    /// Returns the header a sheet was created with
    fn sheet_header(&self, name: &str) -> StorageResult<Option<Vec<String>>>;

    /// Returns every row of a sheet in append order
    fn sheet_rows(&self, name: &str) -> StorageResult<Vec<RankRow>>;

    /// Lists sheet names with their row counts
    fn list_sheets(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Runs =====

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Counts logged crawl outcomes for a run
    fn crawl_outcomes(&self, run_id: i64) -> StorageResult<HashMap<CrawlState, u64>>;
}
