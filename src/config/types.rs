use serde::Deserialize;

/// Main configuration structure for Rank-Tracker
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub client: ClientConfig,
    pub output: OutputConfig,
}

/// Search provider endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Paged search API endpoint
    pub endpoint: String,

    /// Human-facing search page, used for session warm-up and the referer header
    #[serde(rename = "search-page")]
    pub search_page: String,

    /// Value of the `sort` request parameter
    #[serde(default = "default_sort")]
    pub sort: String,

    /// Provider labels known to mark promoted placements
    #[serde(rename = "known-promoted-markers", default)]
    pub known_promoted_markers: Vec<String>,
}

/// Pagination and politeness settings for a single crawl
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Number of results requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Hard upper bound on requests per tracked item
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Lower bound of the random delay before each request (milliseconds)
    #[serde(rename = "min-delay", default = "default_min_delay")]
    pub min_delay: u64,

    /// Upper bound of the random delay before each request (milliseconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Whole-crawl retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts for a crawl that failed before producing any data
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (milliseconds)
    #[serde(rename = "delay-between-attempts", default = "default_retry_delay")]
    pub delay_between_attempts: u64,
}

/// Browser identity presented to the provider
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory that receives the per-run CSV export
    #[serde(rename = "export-dir", default = "default_export_dir")]
    pub export_dir: String,

    /// Channel label written with every rank row
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_between_attempts: default_retry_delay(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

fn default_sort() -> String {
    "RECOMMEND".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_max_pages() -> u32 {
    1
}

fn default_min_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    3000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}

fn default_accept_language() -> String {
    "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7".to_string()
}

fn default_export_dir() -> String {
    "results".to_string()
}

fn default_channel() -> String {
    "newStore".to_string()
}
