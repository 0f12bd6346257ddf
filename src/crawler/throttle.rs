//! Randomized politeness delay
//!
//! Every search request waits a uniformly random time between two fixed
//! bounds first, so consecutive requests never hit the provider at a
//! regular cadence.

use crate::config::CrawlConfig;
use rand::Rng;
use std::time::Duration;

/// Delay bounds applied before each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    min: Duration,
    max: Duration,
}

impl Throttle {
    /// Creates a throttle; bounds given in the wrong order are swapped
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A throttle that never waits
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay),
            Duration::from_millis(config.max_delay),
        )
    }

    /// Draws the next delay from `[min, max]`
    pub fn next_delay(&self) -> Duration {
        if self.max == self.min {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }

    /// Sleeps for a freshly drawn delay
    pub async fn wait(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::trace!("Waiting {:?} before next request", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
