//! Snapshot Parser
//!
//! Turns a raw feed payload into alert records. The parser never fails:
//! empty payloads are "no alerts", and structurally invalid payloads come
//! back empty with [`ParsedSnapshot::malformed`] set so the caller can warn.
//!
//! Two payload shapes are understood:
//! - history shape, an array of `{"data", "category", "title", "alertDate"}`
//! - live shape, one `{"id", "cat", "title", "data": [..]}` object that is
//!   fanned out into one record per area

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::record::{AlertRecord, Category};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Result of parsing one feed payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSnapshot {
    /// Records in feed order
    pub records: Vec<AlertRecord>,
    /// Payload was present but not a readable alert list, including a
    /// list in which every entry was unreadable
    pub malformed: bool,
    /// Entries dropped because they had no area or no category
    pub skipped: usize,
}

impl ParsedSnapshot {
    fn empty() -> Self {
        Self::default()
    }

    fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::default()
        }
    }

    /// Whether the snapshot carries no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a raw feed payload
pub fn parse_snapshot(payload: &[u8]) -> ParsedSnapshot {
    let payload = payload.strip_prefix(UTF8_BOM).unwrap_or(payload);

    let text = match std::str::from_utf8(payload) {
        Ok(text) => text.trim_start_matches('\u{feff}').trim(),
        Err(e) => {
            debug!("Feed payload is not valid UTF-8: {}", e);
            return ParsedSnapshot::malformed();
        }
    };

    if text.is_empty() {
        debug!("No active alerts (empty response)");
        return ParsedSnapshot::empty();
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            debug!("Feed payload is not valid JSON: {}", e);
            return ParsedSnapshot::malformed();
        }
    };

    let mut snapshot = ParsedSnapshot::empty();
    match value {
        Value::Null => {}
        Value::Array(entries) => {
            for entry in &entries {
                match entry.as_object().and_then(records_from_object) {
                    Some(records) => snapshot.records.extend(records),
                    None => snapshot.skipped += 1,
                }
            }
        }
        Value::Object(object) => match records_from_object(&object) {
            Some(records) => snapshot.records = records,
            None => snapshot.skipped += 1,
        },
        other => {
            debug!("Unexpected top-level feed value: {}", other);
            return ParsedSnapshot::malformed();
        }
    }

    if snapshot.skipped > 0 {
        warn!("Skipped {} unreadable feed entries", snapshot.skipped);
        if snapshot.is_empty() {
            snapshot.malformed = true;
            return snapshot;
        }
    }
    debug!("Received {} alerts", snapshot.records.len());
    snapshot
}

/// Build records from one feed object, `None` if it has no area or category
fn records_from_object(object: &Map<String, Value>) -> Option<Vec<AlertRecord>> {
    let category = object
        .get("category")
        .or_else(|| object.get("cat"))
        .and_then(read_code)
        .map(Category::from_code)?;

    let title = object
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let timestamp = object
        .get("alertDate")
        .and_then(Value::as_str)
        .and_then(AlertRecord::parse_alert_date);

    let areas: Vec<&str> = match object.get("data")? {
        Value::String(area) => vec![area.as_str()],
        Value::Array(areas) => areas.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };

    let records: Vec<AlertRecord> = areas
        .into_iter()
        .filter(|area| !area.trim().is_empty())
        .map(|area| AlertRecord {
            area: area.to_string(),
            category,
            title: title.clone(),
            timestamp,
        })
        .collect();

    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

/// Category codes arrive as numbers in the history feed and strings in the live feed
fn read_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
