//! Crawler module for rank tracking runs
//!
//! This module contains the core tracking logic, including:
//! - Paged search requests with a randomized politeness delay
//! - Strict decoding of provider responses
//! - The per-item crawl state machine and whole-crawl retry
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod pager;
mod response;
mod throttle;

pub use coordinator::{run_tracker, Coordinator, RunSummary};
pub use fetcher::{build_http_client, FetchOutcome, HttpPageFetcher, PageFetcher};
pub use pager::{CrawlReport, CrawlSettings, Crawler, RetryPolicy};
pub use response::{decode_page, RawEntry, SearchPage};
pub use throttle::Throttle;
