//! Per-product batching of rank rows
//!
//! Tracked items arrive sorted by id, so every row for one id is contiguous.
//! The aggregator is an explicit `(current id, open batch)` accumulator: each
//! step consumes the previous value and hands back the batch it closed, if any.

use crate::rank::{ProductId, RankBatch, RankUpdate};

/// Fold accumulator for grouping rank rows by tracked id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregator {
    current: Option<ProductId>,
    open: Vec<RankUpdate>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id whose batch is currently open
    pub fn current_id(&self) -> Option<ProductId> {
        self.current
    }

    /// Number of rows waiting in the open batch
    pub fn pending_rows(&self) -> usize {
        self.open.len()
    }

    /// Advances the fold by one tracked item
    ///
    /// # Arguments
    ///
    /// * `tracked_id` - Id of the tracked item just processed
    /// * `update` - The row its crawl produced, or `None` when the target was not found
    ///
    /// # Returns
    ///
    /// The next accumulator, plus the previous id's batch when `tracked_id`
    /// differs from the open one and that batch holds at least one row.
    pub fn step(self, tracked_id: ProductId, update: Option<RankUpdate>) -> (Self, Option<RankBatch>) {
        let (mut next, flushed) = match self.current {
            Some(current) if current != tracked_id => {
                let flushed = Self::close(current, self.open);
                (
                    Self {
                        current: Some(tracked_id),
                        open: Vec::new(),
                    },
                    flushed,
                )
            }
            _ => (
                Self {
                    current: Some(tracked_id),
                    open: self.open,
                },
                None,
            ),
        };

        if let Some(update) = update {
            debug_assert_eq!(update.tracked_id, tracked_id);
            next.open.push(update);
        }

        (next, flushed)
    }

    /// Closes the fold, yielding the final batch if it holds any rows
    pub fn finish(self) -> Option<RankBatch> {
        self.current.and_then(|id| Self::close(id, self.open))
    }

    fn close(tracked_id: ProductId, rows: Vec<RankUpdate>) -> Option<RankBatch> {
        if rows.is_empty() {
            None
        } else {
            Some(RankBatch { tracked_id, rows })
        }
    }
}

/// Groups a whole id-sorted sequence of per-item results into batches
pub fn group_batches<I>(results: I) -> Vec<RankBatch>
where
    I: IntoIterator<Item = (ProductId, Option<RankUpdate>)>,
{
    let (aggregator, mut batches) = results.into_iter().fold(
        (Aggregator::new(), Vec::new()),
        |(aggregator, mut batches), (id, update)| {
            let (next, flushed) = aggregator.step(id, update);
            batches.extend(flushed);
            (next, batches)
        },
    );
    batches.extend(aggregator.finish());
    batches
}
