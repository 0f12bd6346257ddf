//! Statistics generation from the rank store
//!
//! This module provides functionality for extracting and displaying
//! tracker statistics and per-product rank history from the storage layer.

use crate::output::OutputResult;
use crate::rank::ProductId;
use crate::state::CrawlState;
use crate::storage::{RankRow, RunRecord, Storage};
use std::collections::HashMap;

/// Tracker statistics summary
#[derive(Debug, Clone)]
pub struct RankStatistics {
    /// All tracked items, enabled or not
    pub tracked_total: u64,

    /// Items that will be ranked on the next run
    pub tracked_enabled: u64,

    /// Rank sheets with their row counts
    pub sheets: Vec<(String, u64)>,

    /// The most recent run, if any
    pub last_run: Option<RunRecord>,

    /// Crawl outcomes logged by the most recent run
    pub last_run_outcomes: HashMap<CrawlState, u64>,
}

impl RankStatistics {
    pub fn total_rows(&self) -> u64 {
        self.sheets.iter().map(|(_, rows)| rows).sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(RankStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> OutputResult<RankStatistics> {
    let items = storage.list_all_tracked_items()?;
    let tracked_enabled = items.iter().filter(|i| i.enabled).count() as u64;

    let sheets = storage.list_sheets()?;

    let last_run = storage.get_latest_run()?;
    let last_run_outcomes = match &last_run {
        Some(run) => storage.crawl_outcomes(run.id)?,
        None => HashMap::new(),
    };

    Ok(RankStatistics {
        tracked_total: items.len() as u64,
        tracked_enabled,
        sheets,
        last_run,
        last_run_outcomes,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RankStatistics) {
    println!("=== Rank Tracker Statistics ===\n");

    println!("Tracked Items:");
    println!("  Total: {}", stats.tracked_total);
    println!("  Enabled: {}", stats.tracked_enabled);
    println!();

    println!("Rank Sheets ({}):", stats.sheets.len());
    for (name, rows) in &stats.sheets {
        println!("  {}: {} row(s)", name, rows);
    }
    println!("  Total rows: {}", stats.total_rows());
    println!();

    match &stats.last_run {
        Some(run) => {
            println!("Last Run:");
            println!("  ID: {}", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status.to_db_string());

            let count = |state: CrawlState| stats.last_run_outcomes.get(&state).copied().unwrap_or(0);
            let found = count(CrawlState::Found);
            let not_found = count(CrawlState::Exhausted);
            let failed = count(CrawlState::Failed);
            let total = found + not_found + failed;

            println!("  Found: {}", found);
            println!("  Not found: {}", not_found);
            println!("  Failed: {}", failed);

            if total > 0 {
                println!(
                    "  Hit rate: {:.1}% ({} / {} items)",
                    found as f64 / total as f64 * 100.0,
                    found,
                    total
                );
            }
        }
        None => println!("No runs recorded yet."),
    }
}

/// Prints every rank row recorded for one product
pub fn print_history(id: ProductId, rows: &[RankRow]) {
    println!("=== Rank History: {} ===\n", id);

    if rows.is_empty() {
        println!("No rank rows recorded.");
        return;
    }

    println!(
        "{:<10} {:<8} {:<20} {:>6}  {}",
        "Date", "Time", "Keyword", "Rank", "Store"
    );
    for row in rows {
        println!(
            "{:<10} {:<8} {:<20} {:>6}  {}",
            row.date, row.time, row.keyword, row.rank, row.store
        );
    }
}
