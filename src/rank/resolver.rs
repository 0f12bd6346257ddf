//! Organic rank assignment
//!
//! Promoted placements sit between regular results but do not take up an
//! organic position. The organic counter is seeded from the first entry's
//! page number so numbering stays continuous when a crawl starts past page 1.

use crate::crawler::RawEntry;
use crate::rank::{ProductId, Rank, RankedRecord};
use std::collections::HashSet;

/// Resolves accumulated entries into ranked records
#[derive(Debug, Clone)]
pub struct RankResolver {
    page_size: u32,
    known_markers: HashSet<String>,
}

impl RankResolver {
    /// Creates a resolver for the given page size
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            known_markers: HashSet::new(),
        }
    }

    /// Registers the promoted labels the provider is known to send
    ///
    /// Entries carrying any other label are still excluded from organic
    /// counting, but are logged so the label can be reviewed.
    pub fn with_known_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Assigns sequence numbers and ranks to every entry, in encounter order
    ///
    /// # Arguments
    ///
    /// * `entries` - Entries accumulated across all pages of one crawl
    /// * `keyword` - The keyword the crawl searched for
    ///
    /// # Returns
    ///
    /// One `RankedRecord` per entry. The output depends only on the inputs.
    pub fn resolve(&self, entries: &[RawEntry], keyword: &str) -> Vec<RankedRecord> {
        let first_page = match entries.first() {
            Some(first) => first.page_number.max(1),
            None => return Vec::new(),
        };

        let mut counter = self.page_size.saturating_mul(first_page - 1);

        entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let rank = match &entry.promoted {
                    None => {
                        counter = counter.saturating_add(1);
                        Rank::Organic(counter)
                    }
                    Some(label) => {
                        if !self.known_markers.is_empty() && !self.known_markers.contains(label) {
                            tracing::warn!(
                                "Unrecognized promoted marker '{}' on product {} for '{}'; excluded from organic rank",
                                label,
                                entry.identifier,
                                keyword
                            );
                        }
                        Rank::Promoted(label.clone())
                    }
                };

                RankedRecord {
                    keyword: keyword.to_string(),
                    sequence_number: idx as u32 + 1,
                    rank,
                    identifier: entry.identifier,
                    store_name: entry.store_name.clone(),
                    title: entry.title.clone(),
                }
            })
            .collect()
    }
}

/// Returns the record for the target product, if the crawl reached it
pub fn find_target(records: &[RankedRecord], target: ProductId) -> Option<&RankedRecord> {
    records.iter().find(|r| r.identifier == target)
}
