//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Rank-Tracker database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track tracker runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Products and keywords to rank on every run
CREATE TABLE IF NOT EXISTS tracked_items (
    mid INTEGER NOT NULL,
    keyword TEXT NOT NULL,
    tracking INTEGER NOT NULL DEFAULT 1,
    added_at TEXT NOT NULL,
    PRIMARY KEY (mid, keyword)
);

-- One rank sheet per tracked product, created on first write
CREATE TABLE IF NOT EXISTS rank_sheets (
    name TEXT PRIMARY KEY,
    header TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Rank rows, append-only, ordered by row_index within a sheet
CREATE TABLE IF NOT EXISTS rank_rows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sheet TEXT NOT NULL REFERENCES rank_sheets(name),
    row_index INTEGER NOT NULL,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    mid INTEGER NOT NULL,
    keyword TEXT NOT NULL,
    store TEXT NOT NULL,
    item TEXT NOT NULL,
    rank TEXT NOT NULL,
    channel TEXT NOT NULL,
    name TEXT NOT NULL,
    amt_search TEXT NOT NULL DEFAULT '',
    amt_prds TEXT NOT NULL DEFAULT '',
    UNIQUE(sheet, row_index)
);

CREATE INDEX IF NOT EXISTS idx_rank_rows_sheet ON rank_rows(sheet);

-- Per-item crawl outcome for each run
CREATE TABLE IF NOT EXISTS crawl_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    mid INTEGER NOT NULL,
    keyword TEXT NOT NULL,
    outcome TEXT NOT NULL,
    fetch_count INTEGER NOT NULL,
    entry_count INTEGER NOT NULL,
    attempts INTEGER NOT NULL,
    rank TEXT,
    error_message TEXT,
    logged_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_log_run ON crawl_log(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
