//! Run coordinator - main tracking orchestration logic
//!
//! This module contains the main run loop that coordinates all aspects of a
//! tracking run, including:
//! - Loading and ordering the tracked items
//! - Crawling each item and resolving its rank
//! - Grouping rank rows per product and flushing them to the sink
//! - Recording the run and exporting every resolved record

use crate::config::Config;
use crate::crawler::fetcher::{HttpPageFetcher, PageFetcher};
use crate::crawler::pager::{CrawlReport, CrawlSettings, Crawler, RetryPolicy};
use crate::output::export_records;
use crate::rank::{find_target, Aggregator, RankBatch, RankResolver, RankUpdate, RankedRecord};
use crate::state::CrawlState;
use crate::storage::{
    CrawlLogEntry, RankSink, RunLog, RunStatus, SqliteStorage, TrackedItem, TrackingSource,
};
use crate::RankError;
use chrono::Local;
use std::path::{Path, PathBuf};

/// What a completed run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: i64,
    pub items_total: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    pub batches_flushed: usize,
    pub rows_written: usize,
    pub records_resolved: usize,
    pub export_path: Option<PathBuf>,
}

/// Main run coordinator structure
pub struct Coordinator<S> {
    config: Config,
    config_hash: String,
    storage: S,
    fetcher: Box<dyn PageFetcher>,
    resolver: RankResolver,
}

impl Coordinator<SqliteStorage> {
    /// Creates a coordinator backed by the configured database and search endpoint
    ///
    /// # Arguments
    ///
    /// * `config` - The tracker configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(RankError)` - Failed to open the database or build the HTTP client
    pub fn new(config: Config, config_hash: String) -> Result<Self, RankError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let fetcher = HttpPageFetcher::from_config(&config)?;
        Ok(Self::with_parts(config, config_hash, storage, Box::new(fetcher)))
    }
}

impl<S> Coordinator<S>
where
    S: TrackingSource + RankSink + RunLog,
{
    /// Creates a coordinator from explicit parts
    pub fn with_parts(
        config: Config,
        config_hash: String,
        storage: S,
        fetcher: Box<dyn PageFetcher>,
    ) -> Self {
        let resolver = RankResolver::new(config.crawl.page_size)
            .with_known_markers(config.search.known_promoted_markers.iter().cloned());

        Self {
            config,
            config_hash,
            storage,
            fetcher,
            resolver,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Runs every enabled tracked item once
    ///
    /// The run is recorded as `completed` when every batch reached the sink,
    /// and as `failed` when the run stopped early.
    pub async fn run(&mut self) -> Result<RunSummary, RankError> {
        let run_id = self.storage.create_run(&self.config_hash)?;
        tracing::info!("Starting tracking run {}", run_id);

        match self.execute(run_id).await {
            Ok(summary) => {
                self.storage.finish_run(run_id, RunStatus::Completed)?;
                tracing::info!(
                    "Run {} completed: {} found, {} not found, {} failed, {} row(s) written",
                    run_id,
                    summary.found,
                    summary.not_found,
                    summary.failed,
                    summary.rows_written
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Run {} aborted: {}", run_id, e);
                if let Err(finish_err) = self.storage.finish_run(run_id, RunStatus::Failed) {
                    tracing::warn!("Could not mark run {} failed: {}", run_id, finish_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(&mut self, run_id: i64) -> Result<RunSummary, RankError> {
        let mut items = self.storage.list_tracked_items()?;
        // Stable, so items sharing an id keep their source order.
        items.sort_by_key(|item| item.id);

        let settings = CrawlSettings::from(&self.config.crawl);
        let retry = RetryPolicy::from(&self.config.retry);
        let total = items.len();

        tracing::info!("{} tracked item(s) to rank", total);

        let mut summary = RunSummary {
            run_id,
            items_total: total,
            ..RunSummary::default()
        };
        let mut all_records: Vec<RankedRecord> = Vec::new();
        let mut aggregator = Aggregator::new();

        for (idx, item) in items.iter().enumerate() {
            // A new id closes the previous id's batch before any further requests.
            let (next, closed) = aggregator.step(item.id, None);
            aggregator = next;
            if let Some(batch) = closed {
                flush_batch(&mut self.storage, &batch, &mut summary)?;
            }

            tracing::info!(
                "[{}/{}] Ranking product {} for '{}'",
                idx + 1,
                total,
                item.id,
                item.keyword
            );

            let crawler = Crawler::new(self.fetcher.as_ref(), settings);
            let report = crawler
                .crawl_with_retry(&item.keyword, item.id, retry)
                .await?;

            let records = self.resolver.resolve(&report.entries, &item.keyword);
            let update = find_target(&records, item.id).map(|record| {
                RankUpdate::from_record(item.id, record, &self.config.output.channel)
            });

            log_item_result(item, &report, update.as_ref());
            match report.outcome {
                CrawlState::Found => summary.found += 1,
                CrawlState::Failed => summary.failed += 1,
                _ => summary.not_found += 1,
            }

            self.storage
                .record_crawl(run_id, &crawl_log_entry(item, &report, update.as_ref()))?;

            summary.records_resolved += records.len();
            all_records.extend(records);

            let (next, closed) = aggregator.step(item.id, update);
            debug_assert!(closed.is_none(), "batch for {} closed twice", item.id);
            aggregator = next;
        }

        if let Some(batch) = aggregator.finish() {
            flush_batch(&mut self.storage, &batch, &mut summary)?;
        }

        summary.export_path = self.export(&all_records);

        Ok(summary)
    }

    fn export(&self, records: &[RankedRecord]) -> Option<PathBuf> {
        let dir = Path::new(&self.config.output.export_dir);
        match export_records(records, dir, &Local::now()) {
            Ok(Some(path)) => {
                tracing::info!(
                    "Exported {} record(s) to {}",
                    records.len(),
                    path.display()
                );
                Some(path)
            }
            Ok(None) => {
                tracing::info!("No records resolved, skipping export");
                None
            }
            Err(e) => {
                tracing::warn!("Export to {} failed: {}", dir.display(), e);
                None
            }
        }
    }
}

/// Writes one batch to its product's rank sheet
fn flush_batch<K: RankSink>(
    sink: &mut K,
    batch: &RankBatch,
    summary: &mut RunSummary,
) -> Result<(), RankError> {
    let group_key = batch.tracked_id.group_key();

    match sink.append_batch(&group_key, batch) {
        Ok(rows) => {
            tracing::info!("Appended {} row(s) to sheet '{}'", rows, group_key);
            summary.batches_flushed += 1;
            summary.rows_written += rows;
            Ok(())
        }
        Err(source) => {
            tracing::error!("Failed to append to sheet '{}': {}", group_key, source);
            Err(RankError::Sink { group_key, source })
        }
    }
}

fn log_item_result(item: &TrackedItem, report: &CrawlReport, update: Option<&RankUpdate>) {
    match (report.outcome, update) {
        (CrawlState::Found, Some(update)) => tracing::info!(
            "Product {} for '{}': rank {}",
            item.id,
            item.keyword,
            update.rank
        ),
        (CrawlState::Failed, _) => tracing::warn!(
            "Product {} for '{}': crawl failed after {} attempt(s): {}",
            item.id,
            item.keyword,
            report.attempts,
            report.failure.as_deref().unwrap_or("unknown error")
        ),
        _ => tracing::info!(
            "Product {} for '{}': not ranked within {} result(s)",
            item.id,
            item.keyword,
            report.entries.len()
        ),
    }
}

fn crawl_log_entry(
    item: &TrackedItem,
    report: &CrawlReport,
    update: Option<&RankUpdate>,
) -> CrawlLogEntry {
    CrawlLogEntry {
        mid: item.id,
        keyword: item.keyword.clone(),
        outcome: report.outcome,
        fetch_count: report.fetch_count,
        entry_count: report.entries.len() as u32,
        attempts: report.attempts,
        rank: update.map(|u| u.rank.to_string()),
        error_message: report.failure.clone(),
    }
}

/// Runs a complete tracking pass
///
/// This is the main entry point for a run. It will:
/// 1. Open the storage layer
/// 2. Build the HTTP client
/// 3. Crawl and rank every enabled tracked item
/// 4. Flush rank rows per product
/// 5. Export the resolved records
///
/// # Arguments
///
/// * `config` - The tracker configuration
/// * `config_hash` - Hash of the configuration file
///
/// # Returns
///
/// * `Ok(RunSummary)` - Run completed
/// * `Err(RankError)` - Run failed
pub async fn run_tracker(config: Config, config_hash: String) -> Result<RunSummary, RankError> {
    let mut coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}
