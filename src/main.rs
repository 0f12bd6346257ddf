//! Rank-Tracker main entry point
//!
//! This is the command-line interface for the Rank-Tracker keyword rank tracker.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rank_tracker::config::{load_config_with_hash, Config};
use rank_tracker::crawler::run_tracker;
use rank_tracker::storage::{open_storage, Storage, TrackingSource};
use rank_tracker::ProductId;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Rank-Tracker: keyword rank history for shopping products
///
/// Rank-Tracker searches each tracked keyword, finds where the tracked
/// product ranks among organic results, and appends the rank to that
/// product's history.
#[derive(Parser, Debug)]
#[command(name = "rank-tracker")]
#[command(version = "1.0.0")]
#[command(about = "Keyword rank history for shopping products", long_about = None)]
#[command(group(clap::ArgGroup::new("mode").multiple(false)))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and list the items a run would rank
    #[arg(long, group = "mode")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, group = "mode")]
    stats: bool,

    /// Show the rank history of one product and exit
    #[arg(long, value_name = "MID", group = "mode")]
    history: Option<u64>,

    /// Start tracking a product for a keyword
    #[arg(long, num_args = 2, value_names = ["MID", "KEYWORD"], group = "mode")]
    track: Option<Vec<String>>,

    /// Stop tracking a product for every keyword
    #[arg(long, value_name = "MID", group = "mode")]
    untrack: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(mid) = cli.history {
        handle_history(&config, ProductId(mid))
    } else if let Some(args) = cli.track {
        handle_track(&config, &args)
    } else if let Some(mid) = cli.untrack {
        handle_untrack(&config, ProductId(mid))
    } else {
        handle_run(config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rank_tracker=info,warn"),
            1 => EnvFilter::new("rank_tracker=debug,info"),
            2 => EnvFilter::new("rank_tracker=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn database_path(config: &Config) -> &Path {
    Path::new(&config.output.database_path)
}

/// Handles the --dry-run mode: validates config and lists what would be ranked
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== Rank-Tracker Dry Run ===\n");

    println!("Search:");
    println!("  Endpoint: {}", config.search.endpoint);
    println!("  Search page: {}", config.search.search_page);
    println!("  Sort: {}", config.search.sort);
    if !config.search.known_promoted_markers.is_empty() {
        println!(
            "  Known promoted markers: {}",
            config.search.known_promoted_markers.join(", ")
        );
    }

    println!("\nCrawl:");
    println!("  Page size: {}", config.crawl.page_size);
    println!("  Max pages per item: {}", config.crawl.max_pages);
    println!(
        "  Delay between requests: {}-{}ms",
        config.crawl.min_delay, config.crawl.max_delay
    );
    println!("  Request timeout: {}s", config.crawl.request_timeout);
    println!(
        "  Retry: {} attempt(s), {}ms apart",
        config.retry.max_attempts, config.retry.delay_between_attempts
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Export directory: {}", config.output.export_dir);
    println!("  Channel: {}", config.output.channel);

    let storage = open_storage(database_path(config))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let items = storage.list_tracked_items()?;

    println!("\nTracked Items ({}):", items.len());
    for item in &items {
        println!("  - {} '{}'", item.id, item.keyword);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would issue at most {} search request(s)",
        items.len() as u64 * config.crawl.max_pages as u64
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    use rank_tracker::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(database_path(config))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --history mode: prints one product's rank sheet
fn handle_history(config: &Config, id: ProductId) -> Result<()> {
    use rank_tracker::output::print_history;

    let storage = open_storage(database_path(config))?;
    let rows = storage.sheet_rows(&id.group_key())?;
    print_history(id, &rows);

    Ok(())
}

/// Handles the --track mode: adds or re-enables a tracked item
fn handle_track(config: &Config, args: &[String]) -> Result<()> {
    let (mid, keyword) = match args {
        [mid, keyword] => (mid, keyword),
        _ => bail!("--track expects <MID> <KEYWORD>"),
    };
    let id: u64 = mid
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a valid product id", mid))?;

    let mut storage = open_storage(database_path(config))?;
    storage.add_tracked_item(ProductId(id), keyword)?;

    println!("✓ Tracking product {} for '{}'", id, keyword.trim());
    Ok(())
}

/// Handles the --untrack mode: disables every item for a product
fn handle_untrack(config: &Config, id: ProductId) -> Result<()> {
    let mut storage = open_storage(database_path(config))?;
    let changed = storage.set_tracking(id, false)?;

    if changed == 0 {
        bail!("Product {} is not tracked", id);
    }
    println!("✓ Stopped tracking product {} ({} item(s))", id, changed);
    Ok(())
}

/// Handles the main tracking run
async fn handle_run(config: Config, config_hash: String) -> Result<()> {
    tracing::info!(
        "Ranking up to {} page(s) of {} results per item",
        config.crawl.max_pages,
        config.crawl.page_size
    );

    let summary = run_tracker(config, config_hash)
        .await
        .context("Tracking run failed")?;

    tracing::info!(
        "Run {} finished: {}/{} item(s) ranked, {} row(s) written",
        summary.run_id,
        summary.found,
        summary.items_total,
        summary.rows_written
    );
    if let Some(path) = &summary.export_path {
        tracing::info!("Results exported to {}", path.display());
    }

    Ok(())
}
