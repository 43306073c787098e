//! Alert Record Definitions
//!
//! Typed view of a single entry in the alert feed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category_code;

/// Timestamp format used by the feed's `alertDate` field
pub const ALERT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Alert category as reported by the feed
///
/// Codes outside the known set are kept as [`Category::Other`] so new
/// upstream categories pass through instead of disappearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Category {
    /// Active red alert (1)
    Active,
    /// Event ended (13)
    AllClear,
    /// Pre-warning (14)
    Prewarning,
    /// Any other category code
    Other(i64),
}

impl Category {
    /// Map a raw feed code to a category
    pub fn from_code(code: i64) -> Self {
        match code {
            category_code::ACTIVE => Category::Active,
            category_code::ALL_CLEAR => Category::AllClear,
            category_code::PREWARNING => Category::Prewarning,
            other => Category::Other(other),
        }
    }

    /// Raw feed code
    pub fn code(&self) -> i64 {
        match self {
            Category::Active => category_code::ACTIVE,
            Category::AllClear => category_code::ALL_CLEAR,
            Category::Prewarning => category_code::PREWARNING,
            Category::Other(code) => *code,
        }
    }

    /// Whether the code is one the monitor acts on
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Category::Other(_))
    }
}

impl From<i64> for Category {
    fn from(code: i64) -> Self {
        Category::from_code(code)
    }
}

impl From<Category> for i64 {
    fn from(category: Category) -> Self {
        category.code()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Active => write!(f, "active"),
            Category::AllClear => write!(f, "allclear"),
            Category::Prewarning => write!(f, "prewarning"),
            Category::Other(code) => write!(f, "category {}", code),
        }
    }
}

/// One entry from the alert feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Area name, in the feed's own language
    pub area: String,
    /// Alert category
    pub category: Category,
    /// Raw category text
    pub title: String,
    /// Feed-provided alert time (local time, no zone)
    pub timestamp: Option<NaiveDateTime>,
}

impl AlertRecord {
    /// Create a record without a feed timestamp
    pub fn new(area: impl Into<String>, category: Category, title: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            category,
            title: title.into(),
            timestamp: None,
        }
    }

    /// Attach a feed timestamp
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse a feed `alertDate` value, `None` if absent or unreadable
    pub fn parse_alert_date(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw.trim(), ALERT_DATE_FORMAT).ok()
    }
}
