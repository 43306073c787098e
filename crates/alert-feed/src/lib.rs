//! Alert Feed
//!
//! Typed alert records, a lenient parser for raw feed payloads, and the
//! snapshot fetcher used by the poll loop.

mod error;
mod fetcher;
mod parser;
mod record;

pub use error::FeedError;
pub use fetcher::{FetcherConfig, HttpFetcher, SnapshotFetcher, DEFAULT_ALERTS_URL};
pub use parser::{parse_snapshot, ParsedSnapshot};
pub use record::{AlertRecord, Category};

/// Feed category codes
pub mod category_code {
    /// Active red alert
    pub const ACTIVE: i64 = 1;
    /// Event ended (all clear)
    pub const ALL_CLEAR: i64 = 13;
    /// Pre-warning
    pub const PREWARNING: i64 = 14;
}
