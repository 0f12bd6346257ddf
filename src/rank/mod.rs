//! Rank resolution and batching
//!
//! This module turns crawled search entries into ranked records and groups
//! the target rows into per-product batches:
//! - `RankResolver` assigns organic ranks, skipping promoted placements
//! - `Aggregator` folds tracked items into one `RankBatch` per product id

mod aggregator;
mod resolver;

pub use aggregator::{group_batches, Aggregator};
pub use resolver::{find_target, RankResolver};

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

/// Provider-side product identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductId(pub u64);

impl ProductId {
    /// Key used to route a batch to this product's rank sheet
    pub fn group_key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProductId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// The provider sends ids either as JSON numbers or as numeric strings.
impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ProductIdVisitor;

        impl<'de> Visitor<'de> for ProductIdVisitor {
            type Value = ProductId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer or a numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ProductId, E> {
                Ok(ProductId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ProductId, E> {
                u64::try_from(v)
                    .map(ProductId)
                    .map_err(|_| E::custom(format!("negative product id {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ProductId, E> {
                v.trim()
                    .parse::<u64>()
                    .map(ProductId)
                    .map_err(|_| E::custom(format!("non-numeric product id '{}'", v)))
            }
        }

        deserializer.deserialize_any(ProductIdVisitor)
    }
}

/// Rank assigned to one search entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rank {
    /// Position among non-promoted entries
    Organic(u32),

    /// Label the provider attached to a promoted placement
    Promoted(String),
}

impl Rank {
    pub fn is_organic(&self) -> bool {
        matches!(self, Self::Organic(_))
    }

    pub fn organic(&self) -> Option<u32> {
        match self {
            Self::Organic(n) => Some(*n),
            Self::Promoted(_) => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organic(n) => write!(f, "{}", n),
            Self::Promoted(label) => write!(f, "{}", label),
        }
    }
}

/// A resolved, keyword-tagged search entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRecord {
    pub keyword: String,

    /// Absolute 1-based position across every page of the crawl
    pub sequence_number: u32,

    pub rank: Rank,
    pub identifier: ProductId,
    pub store_name: String,
    pub title: String,
}

/// One rank row destined for a product's rank sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankUpdate {
    pub tracked_id: ProductId,
    pub keyword: String,
    pub rank: Rank,
    pub store: String,
    pub item: String,
    pub channel: String,
    pub title: String,
}

impl RankUpdate {
    /// Builds the persisted row for a tracked item from its matching record
    pub fn from_record(tracked_id: ProductId, record: &RankedRecord, channel: &str) -> Self {
        Self {
            tracked_id,
            keyword: record.keyword.clone(),
            rank: record.rank.clone(),
            store: record.store_name.clone(),
            item: record.title.clone(),
            channel: channel.to_string(),
            title: record.title.clone(),
        }
    }
}

/// All rank rows for one tracked id, written in a single call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankBatch {
    pub tracked_id: ProductId,
    pub rows: Vec<RankUpdate>,
}

impl RankBatch {
    pub fn new(tracked_id: ProductId) -> Self {
        Self {
            tracked_id,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
