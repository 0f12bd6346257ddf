//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::rank::{ProductId, RankBatch};
use crate::state::CrawlState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    RankSink, RunLog, Storage, StorageError, StorageResult, TrackingSource,
};
use crate::storage::{CrawlLogEntry, RankRow, RunRecord, RunStatus, TrackedItem, SHEET_HEADER};
use crate::RankError;
use chrono::{Local, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(RankError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, RankError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, RankError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                .unwrap_or(RunStatus::Running),
        })
    }

    fn tracked_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedItem> {
        Ok(TrackedItem {
            id: ProductId(row.get::<_, i64>(0)? as u64),
            keyword: row.get(1)?,
            enabled: row.get::<_, i64>(2)? != 0,
        })
    }
}

impl TrackingSource for SqliteStorage {
    fn list_tracked_items(&self) -> StorageResult<Vec<TrackedItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT mid, keyword, tracking FROM tracked_items WHERE tracking = 1 ORDER BY rowid",
        )?;

        let items = stmt
            .query_map([], Self::tracked_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }
}

impl RankSink for SqliteStorage {
    fn append_batch(&mut self, group_key: &str, batch: &RankBatch) -> StorageResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        if let Some(stray) = batch.rows.iter().find(|r| r.tracked_id != batch.tracked_id) {
            return Err(StorageError::ConstraintViolation(format!(
                "row for product {} in batch for product {}",
                stray.tracked_id, batch.tracked_id
            )));
        }

        let now = Local::now();
        let date = now.format("%y. %m. %d").to_string();
        let time = now.format("%H:%M:%S").to_string();

        let tx = self.conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT name FROM rank_sheets WHERE name = ?1",
                params![group_key],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_none() {
            let header = serde_json::to_string(&SHEET_HEADER)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            tx.execute(
                "INSERT INTO rank_sheets (name, header, created_at) VALUES (?1, ?2, ?3)",
                params![group_key, header, Utc::now().to_rfc3339()],
            )?;
            tracing::info!("Created rank sheet '{}'", group_key);
        }

        let last_row: i64 = tx.query_row(
            "SELECT COALESCE(MAX(row_index), 0) FROM rank_rows WHERE sheet = ?1",
            params![group_key],
            |row| row.get(0),
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO rank_rows
                 (sheet, row_index, date, time, mid, keyword, store, item, rank, channel, name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for (offset, row) in batch.rows.iter().enumerate() {
                stmt.execute(params![
                    group_key,
                    last_row + 1 + offset as i64,
                    date,
                    time,
                    row.tracked_id.0 as i64,
                    row.keyword,
                    row.store,
                    row.item,
                    row.rank.to_string(),
                    row.channel,
                    row.title,
                ])?;
            }
        }

        tx.commit()?;

        Ok(batch.len())
    }
}

impl RunLog for SqliteStorage {
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn record_crawl(&mut self, run_id: i64, entry: &CrawlLogEntry) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_log
             (run_id, mid, keyword, outcome, fetch_count, entry_count, attempts, rank, error_message, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                entry.mid.0 as i64,
                entry.keyword,
                entry.outcome.to_db_string(),
                entry.fetch_count,
                entry.entry_count,
                entry.attempts,
                entry.rank,
                entry.error_message,
                now
            ],
        )?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    // ===== Tracked Items =====

    fn add_tracked_item(&mut self, id: ProductId, keyword: &str) -> StorageResult<()> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(StorageError::ConstraintViolation(
                "keyword cannot be empty".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO tracked_items (mid, keyword, tracking, added_at) VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(mid, keyword) DO UPDATE SET tracking = 1",
            params![id.0 as i64, keyword, now],
        )?;
        Ok(())
    }

    fn set_tracking(&mut self, id: ProductId, enabled: bool) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE tracked_items SET tracking = ?1 WHERE mid = ?2",
            params![enabled as i64, id.0 as i64],
        )?;
        Ok(changed)
    }

    fn list_all_tracked_items(&self) -> StorageResult<Vec<TrackedItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT mid, keyword, tracking FROM tracked_items ORDER BY mid, rowid")?;

        let items = stmt
            .query_map([], Self::tracked_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    // ===== Rank Sheets =====

    fn sheet_header(&self, name: &str) -> StorageResult<Option<Vec<String>>> {
        let header: Option<String> = self
            .conn
            .query_row(
                "SELECT header FROM rank_sheets WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        header
            .map(|h| {
                serde_json::from_str(&h).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn sheet_rows(&self, name: &str) -> StorageResult<Vec<RankRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT row_index, date, time, mid, keyword, store, item, rank, channel, name
             FROM rank_rows WHERE sheet = ?1 ORDER BY row_index",
        )?;

        let rows = stmt
            .query_map(params![name], |row| {
                Ok(RankRow {
                    row_index: row.get(0)?,
                    date: row.get(1)?,
                    time: row.get(2)?,
                    mid: ProductId(row.get::<_, i64>(3)? as u64),
                    keyword: row.get(4)?,
                    store: row.get(5)?,
                    item: row.get(6)?,
                    rank: row.get(7)?,
                    channel: row.get(8)?,
                    name: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn list_sheets(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name, COUNT(r.id) FROM rank_sheets s
             LEFT JOIN rank_rows r ON r.sheet = s.name
             GROUP BY s.name ORDER BY s.name",
        )?;

        let sheets = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sheets)
    }

    // ===== Runs =====

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                Self::run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                Self::run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn crawl_outcomes(&self, run_id: i64) -> StorageResult<HashMap<CrawlState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT outcome, COUNT(*) FROM crawl_log WHERE run_id = ?1 GROUP BY outcome")?;

        let mut outcomes = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (outcome, count) = row?;
            if let Some(state) = CrawlState::from_db_string(&outcome) {
                outcomes.insert(state, count as u64);
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::{Rank, RankUpdate};

    fn update(id: u64, keyword: &str, rank: Rank) -> RankUpdate {
        RankUpdate {
            tracked_id: ProductId(id),
            keyword: keyword.to_string(),
            rank,
            store: "Widget Shop".to_string(),
            item: "Blue Widget".to_string(),
            channel: "newStore".to_string(),
            title: "Blue Widget".to_string(),
        }
    }

    fn batch(id: u64, rows: Vec<RankUpdate>) -> RankBatch {
        RankBatch {
            tracked_id: ProductId(id),
            rows,
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_list_only_enabled_items_in_source_order() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.add_tracked_item(ProductId(900), "zeta").unwrap();
        storage.add_tracked_item(ProductId(100), "alpha").unwrap();
        storage.add_tracked_item(ProductId(500), "mid").unwrap();
        storage.set_tracking(ProductId(500), false).unwrap();

        let items = storage.list_tracked_items().unwrap();
        let ids: Vec<u64> = items.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![900, 100]);
        assert!(items.iter().all(|i| i.enabled));

        assert_eq!(storage.list_all_tracked_items().unwrap().len(), 3);
    }

    #[test]
    fn test_re_adding_item_enables_it() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.add_tracked_item(ProductId(7), "widget").unwrap();
        storage.set_tracking(ProductId(7), false).unwrap();
        assert!(storage.list_tracked_items().unwrap().is_empty());

        storage.add_tracked_item(ProductId(7), "widget").unwrap();
        assert_eq!(storage.list_tracked_items().unwrap().len(), 1);
        assert_eq!(storage.list_all_tracked_items().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.add_tracked_item(ProductId(7), "   ");
        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
    }

    #[test]
    fn test_sheet_created_lazily_with_header() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.sheet_header("500").unwrap(), None);

        let written = storage
            .append_batch("500", &batch(500, vec![update(500, "widget", Rank::Organic(37))]))
            .unwrap();
        assert_eq!(written, 1);

        let header = storage.sheet_header("500").unwrap().unwrap();
        assert_eq!(header.len(), 11);
        assert_eq!(header[0], "Date");
        assert_eq!(header[2], "MID");
        assert_eq!(header[6], "Rank");
    }

    #[test]
    fn test_batches_append_after_existing_rows() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .append_batch(
                "700",
                &batch(
                    700,
                    vec![
                        update(700, "first", Rank::Organic(3)),
                        update(700, "second", Rank::Promoted("AD".to_string())),
                    ],
                ),
            )
            .unwrap();
        storage
            .append_batch("700", &batch(700, vec![update(700, "first", Rank::Organic(4))]))
            .unwrap();

        let rows = storage.sheet_rows("700").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows.iter().map(|r| r.row_index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(rows[0].keyword, "first");
        assert_eq!(rows[0].rank, "3");
        assert_eq!(rows[1].rank, "AD");
        assert_eq!(rows[2].rank, "4");
        assert_eq!(rows[0].mid, ProductId(700));
        assert_eq!(rows[0].channel, "newStore");
        assert_eq!(rows[0].date.len(), "24. 01. 31".len());

        assert_eq!(storage.list_sheets().unwrap(), vec![("700".to_string(), 3)]);
    }

    #[test]
    fn test_mismatched_row_rejected_atomically() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.append_batch(
            "1",
            &batch(
                1,
                vec![update(1, "a", Rank::Organic(1)), update(2, "b", Rank::Organic(2))],
            ),
        );

        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
        assert!(storage.sheet_rows("1").unwrap().is_empty());
        assert_eq!(storage.sheet_header("1").unwrap(), None);
    }

    #[test]
    fn test_empty_batch_writes_nothing() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.append_batch("9", &RankBatch::new(ProductId(9))).unwrap(), 0);
        assert!(storage.list_sheets().unwrap().is_empty());
    }

    #[test]
    fn test_run_lifecycle_and_outcomes() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("abc").unwrap();
        assert!(run_id > 0);

        for (mid, outcome) in [
            (1, CrawlState::Found),
            (2, CrawlState::Found),
            (3, CrawlState::Exhausted),
            (4, CrawlState::Failed),
        ] {
            storage
                .record_crawl(
                    run_id,
                    &CrawlLogEntry {
                        mid: ProductId(mid),
                        keyword: "k".to_string(),
                        outcome,
                        fetch_count: 1,
                        entry_count: 10,
                        attempts: 1,
                        rank: None,
                        error_message: None,
                    },
                )
                .unwrap();
        }

        storage.finish_run(run_id, RunStatus::Completed).unwrap();

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.config_hash, "abc");

        let outcomes = storage.crawl_outcomes(run_id).unwrap();
        assert_eq!(outcomes.get(&CrawlState::Found), Some(&2));
        assert_eq!(outcomes.get(&CrawlState::Exhausted), Some(&1));
        assert_eq!(outcomes.get(&CrawlState::Failed), Some(&1));

        assert_eq!(storage.get_latest_run().unwrap().unwrap().id, run_id);
    }

    #[test]
    fn test_unknown_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(storage.finish_run(42, RunStatus::Failed).is_err());
    }
}
