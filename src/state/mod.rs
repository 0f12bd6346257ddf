//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the lifecycle of a single (keyword, target) crawl

mod crawl_state;

pub use crawl_state::CrawlState;
