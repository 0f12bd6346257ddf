//! Paginated crawl for a single (keyword, target) pair
//!
//! The crawl walks result pages in order and stops as soon as the target
//! appears, the page budget is spent, the provider runs out of results, or a
//! request fails. Whatever was accumulated up to that point is returned.

use crate::config::{CrawlConfig, RetryConfig};
use crate::crawler::fetcher::{FetchOutcome, PageFetcher};
use crate::crawler::response::{RawEntry, SearchPage};
use crate::rank::ProductId;
use crate::state::CrawlState;
use crate::RankError;
use std::time::Duration;

/// Page budget for one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    pub page_size: u32,
    pub max_pages: u32,
}

impl From<&CrawlConfig> for CrawlSettings {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }
}

/// Whole-crawl retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_between_attempts),
        }
    }
}

/// What one crawl produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub keyword: String,
    pub target: ProductId,

    /// `Found`, `Exhausted` or `Failed`
    pub outcome: CrawlState,

    /// Entries in encounter order; ends with the target when `outcome` is `Found`
    pub entries: Vec<RawEntry>,

    /// Page requests issued by the final attempt
    pub fetch_count: u32,

    /// Failure description when `outcome` is `Failed`
    pub failure: Option<String>,

    /// Number of crawl attempts made
    pub attempts: u32,
}

impl CrawlReport {
    pub fn is_found(&self) -> bool {
        self.outcome == CrawlState::Found
    }

    /// A failed crawl that produced nothing at all is worth repeating
    pub fn needs_retry(&self) -> bool {
        self.outcome == CrawlState::Failed && self.entries.is_empty()
    }
}

/// Drives a `PageFetcher` through the crawl state machine
pub struct Crawler<'a> {
    fetcher: &'a dyn PageFetcher,
    settings: CrawlSettings,
}

impl<'a> Crawler<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, settings: CrawlSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Runs one crawl from `Pending` to `Done`
    ///
    /// # State Flow
    ///
    /// | From | Event | To |
    /// |------|-------|----|
    /// | Pending | start | Fetching |
    /// | Fetching | non-empty page | Extending |
    /// | Fetching | empty page | Exhausted |
    /// | Fetching | transport/decode failure | Failed |
    /// | Extending | target seen | Found |
    /// | Extending | page budget spent | Exhausted |
    /// | Extending | otherwise | Fetching |
    /// | Found/Exhausted/Failed | - | Done |
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl reached `Done`
    /// * `Err(RankError::InvalidTransition)` - The state machine was driven illegally
    pub async fn crawl(&self, keyword: &str, target: ProductId) -> Result<CrawlReport, RankError> {
        let mut state = CrawlState::Pending;
        let mut outcome = CrawlState::Pending;
        let mut cursor: u64 = 1;
        let mut fetch_count: u32 = 0;
        let mut entries: Vec<RawEntry> = Vec::new();
        let mut failure: Option<String> = None;
        let mut pending_page: Option<SearchPage> = None;

        self.fetcher.begin(keyword).await;

        loop {
            let next = match state {
                CrawlState::Pending => CrawlState::Fetching,

                CrawlState::Fetching => {
                    fetch_count += 1;
                    match self
                        .fetcher
                        .fetch(keyword, cursor, self.settings.page_size, fetch_count)
                        .await
                    {
                        FetchOutcome::Page(page) => {
                            tracing::debug!(
                                "Page {} for '{}': {} entries",
                                fetch_count,
                                keyword,
                                page.items.len()
                            );
                            pending_page = Some(page);
                            CrawlState::Extending
                        }
                        FetchOutcome::EndOfData => {
                            tracing::debug!("Page {} for '{}' is empty", fetch_count, keyword);
                            CrawlState::Exhausted
                        }
                        FetchOutcome::TransportFailure(message) => {
                            tracing::warn!(
                                "Page {} request for '{}' failed: {}",
                                fetch_count,
                                keyword,
                                message
                            );
                            failure = Some(message);
                            CrawlState::Failed
                        }
                        FetchOutcome::DecodeFailure(message) => {
                            tracing::warn!(
                                "Page {} for '{}' could not be decoded: {}",
                                fetch_count,
                                keyword,
                                message
                            );
                            failure = Some(message);
                            CrawlState::Failed
                        }
                    }
                }

                CrawlState::Extending => match pending_page.take() {
                    Some(page) => {
                        cursor = page.next_cursor.unwrap_or(cursor.saturating_add(1));

                        let mut found = false;
                        for item in page.items {
                            let hit = item.identifier == target;
                            entries.push(item);
                            if hit {
                                found = true;
                                break;
                            }
                        }

                        if found {
                            tracing::info!(
                                "Found product {} for '{}' on page {}",
                                target,
                                keyword,
                                fetch_count
                            );
                            CrawlState::Found
                        } else if fetch_count >= self.settings.max_pages {
                            CrawlState::Exhausted
                        } else {
                            CrawlState::Fetching
                        }
                    }
                    None => CrawlState::Exhausted,
                },

                CrawlState::Found | CrawlState::Exhausted | CrawlState::Failed => {
                    outcome = state;
                    CrawlState::Done
                }

                CrawlState::Done => break,
            };

            if !state.can_transition_to(next) {
                return Err(RankError::InvalidTransition {
                    from: state,
                    to: next,
                });
            }
            tracing::trace!("Crawl '{}': {} -> {}", keyword, state, next);
            state = next;
        }

        if outcome == CrawlState::Exhausted {
            tracing::info!(
                "Product {} not found for '{}' within {} page(s)",
                target,
                keyword,
                fetch_count
            );
        }

        Ok(CrawlReport {
            keyword: keyword.to_string(),
            target,
            outcome,
            entries,
            fetch_count,
            failure,
            attempts: 1,
        })
    }

    /// Runs the crawl, repeating it from scratch while it fails without data
    pub async fn crawl_with_retry(
        &self,
        keyword: &str,
        target: ProductId,
        retry: RetryPolicy,
    ) -> Result<CrawlReport, RankError> {
        let mut attempt = 1;
        loop {
            let mut report = self.crawl(keyword, target).await?;
            report.attempts = attempt;

            if !report.needs_retry() || attempt >= retry.max_attempts {
                return Ok(report);
            }

            tracing::warn!(
                "Crawl for '{}' produced no data, retrying ({}/{})",
                keyword,
                attempt,
                retry.max_attempts
            );
            tokio::time::sleep(retry.delay).await;
            attempt += 1;
        }
    }
}
