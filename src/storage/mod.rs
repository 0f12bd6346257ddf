//! Storage module for tracked items and rank history
//!
//! This module handles all database operations for the tracker, including:
//! - SQLite database initialization and schema management
//! - The tracked-item list (the tracking source)
//! - Lazily created per-product rank sheets (the rank sink)
//! - Run and per-item crawl logging

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{RankSink, RunLog, Storage, StorageError, StorageResult, TrackingSource};

use crate::rank::ProductId;
use crate::state::CrawlState;
use crate::RankError;

use std::path::Path;

/// Column header written when a rank sheet is created
pub const SHEET_HEADER: [&str; 11] = [
    "Date",
    "Time",
    "MID",
    "Keyword",
    "Store",
    "Item",
    "Rank",
    "Channel",
    "Name",
    "Amt_Search",
    "Amt_Prds",
];

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, RankError> {
    SqliteStorage::new(path)
}

/// A product and keyword the operator wants ranked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedItem {
    pub id: ProductId,
    pub keyword: String,
    pub enabled: bool,
}

impl TrackedItem {
    pub fn new(id: impl Into<ProductId>, keyword: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keyword: keyword.into(),
            enabled: true,
        }
    }
}

/// A row read back from a rank sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRow {
    pub row_index: i64,
    pub date: String,
    pub time: String,
    pub mid: ProductId,
    pub keyword: String,
    pub store: String,
    pub item: String,
    pub rank: String,
    pub channel: String,
    pub name: String,
}

/// Outcome of one tracked item's crawl, as logged for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlLogEntry {
    pub mid: ProductId,
    pub keyword: String,
    pub outcome: CrawlState,
    pub fetch_count: u32,
    pub entry_count: u32,
    pub attempts: u32,
    pub rank: Option<String>,
    pub error_message: Option<String>,
}

/// Represents a tracker run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a tracker run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
