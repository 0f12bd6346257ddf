/// Crawl state definitions
///
/// This module defines every state a single (keyword, target) crawl passes
/// through, and the transitions allowed between them.
use std::fmt;

/// Represents the current state of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    // ===== Active States =====
    /// Nothing fetched yet; cursor is 1 and the page counter is 0
    Pending,

    /// A page request is in flight
    Fetching,

    /// A non-empty page is being appended and scanned for the target
    Extending,

    // ===== Outcome States =====
    /// The target appeared in the results
    Found,

    /// Page budget spent or the provider ran out of results
    Exhausted,

    /// A transport or decode failure ended the crawl early
    Failed,

    // ===== Final State =====
    /// The accumulated entries have been handed off
    Done,
}

impl CrawlState {
    /// Returns true for the three outcome states
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::Found | Self::Exhausted | Self::Failed)
    }

    /// Returns true if the crawl can make no further requests
    pub fn is_terminal(&self) -> bool {
        self.is_outcome() || matches!(self, Self::Done)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Extending)
                | (Fetching, Exhausted)
                | (Fetching, Failed)
                | (Extending, Fetching)
                | (Extending, Found)
                | (Extending, Exhausted)
                | (Found, Done)
                | (Exhausted, Done)
                | (Failed, Done)
        )
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Extending => "extending",
            Self::Found => "found",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
            Self::Done => "done",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetching" => Some(Self::Fetching),
            "extending" => Some(Self::Extending),
            "found" => Some(Self::Found),
            "exhausted" => Some(Self::Exhausted),
            "failed" => Some(Self::Failed),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
