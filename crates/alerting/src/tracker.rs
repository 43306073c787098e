//! Area State Tracker
//!
//! [`transition`] is a pure function from the current [`AreaStatus`] and a
//! feed snapshot to the next status plus the events to publish.
//! [`StateTracker`] owns the status for one monitored area between polls.

use alert_feed::{AlertRecord, Category};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Alert status of the monitored area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AreaStatus {
    /// No alert. Both the initial state and the settled all-clear.
    #[default]
    Clear,
    /// Pre-warning received
    Prewarning,
    /// Active red alert
    Active,
}

impl fmt::Display for AreaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaStatus::Clear => write!(f, "none"),
            AreaStatus::Prewarning => write!(f, "prewarning"),
            AreaStatus::Active => write!(f, "active"),
        }
    }
}

/// Kind of published transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Prewarning,
    Active,
    AllClear,
}

impl TransitionKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Prewarning => "prewarning",
            TransitionKind::Active => "active",
            TransitionKind::AllClear => "allclear",
        }
    }

    /// Status the area is in after this transition
    pub fn resulting_status(&self) -> AreaStatus {
        match self {
            TransitionKind::Prewarning => AreaStatus::Prewarning,
            TransitionKind::Active => AreaStatus::Active,
            TransitionKind::AllClear => AreaStatus::Clear,
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change of the monitored area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub kind: TransitionKind,
    pub area: String,
    /// Feed record behind the event, absent for a synthesized all-clear
    pub source: Option<AlertRecord>,
    pub observed_at: DateTime<Utc>,
}

/// Outcome of applying one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: AreaStatus,
    pub events: Vec<TransitionEvent>,
}

impl Transition {
    fn unchanged(status: AreaStatus) -> Self {
        Self {
            next: status,
            events: Vec::new(),
        }
    }
}

/// What the matching records say about the area
enum Signal<'a> {
    /// Alert of the given severity is present
    Raise(TransitionKind, &'a AlertRecord),
    /// Area is absent, or only an event-ended record is present
    Clear(Option<&'a AlertRecord>),
    /// Only unrecognized categories are present
    Ignore,
}

fn classify<'a>(matching: &[&'a AlertRecord]) -> Signal<'a> {
    if matching.is_empty() {
        return Signal::Clear(None);
    }

    let first_of = |category: Category| matching.iter().copied().find(|r| r.category == category);

    if let Some(record) = first_of(Category::Active) {
        Signal::Raise(TransitionKind::Active, record)
    } else if let Some(record) = first_of(Category::Prewarning) {
        Signal::Raise(TransitionKind::Prewarning, record)
    } else if let Some(record) = first_of(Category::AllClear) {
        Signal::Clear(Some(record))
    } else {
        Signal::Ignore
    }
}

/// Compute the next status and events for `target_area` from a snapshot
///
/// At most one event is produced per snapshot. Records for other areas and
/// records with unrecognized categories never change the status.
pub fn transition(
    status: AreaStatus,
    target_area: &str,
    snapshot: &[AlertRecord],
    observed_at: DateTime<Utc>,
) -> Transition {
    let matching: Vec<&AlertRecord> = snapshot.iter().filter(|r| r.area == target_area).collect();

    for record in matching.iter().filter(|r| !r.category.is_recognized()) {
        info!(
            "Ignoring unknown alert category {} for {}: {}",
            record.category.code(),
            record.area,
            record.title
        );
    }

    let (kind, source) = match classify(&matching) {
        Signal::Raise(kind, record) if kind.resulting_status() != status => (kind, Some(record)),
        Signal::Clear(source) if status != AreaStatus::Clear => (TransitionKind::AllClear, source),
        Signal::Raise(..) | Signal::Clear(_) | Signal::Ignore => {
            return Transition::unchanged(status)
        }
    };

    Transition {
        next: kind.resulting_status(),
        events: vec![TransitionEvent {
            kind,
            area: target_area.to_string(),
            source: source.cloned(),
            observed_at,
        }],
    }
}

/// Owns the alert status of one monitored area
#[derive(Debug, Clone)]
pub struct StateTracker {
    target_area: String,
    status: AreaStatus,
    last_change: Option<DateTime<Utc>>,
}

impl StateTracker {
    /// Create a tracker in the clear state
    pub fn new(target_area: impl Into<String>) -> Self {
        Self {
            target_area: target_area.into(),
            status: AreaStatus::Clear,
            last_change: None,
        }
    }

    /// Apply a snapshot and return the events to publish
    pub fn observe(&mut self, snapshot: &[AlertRecord], observed_at: DateTime<Utc>) -> Vec<TransitionEvent> {
        let Transition { next, events } = transition(self.status, &self.target_area, snapshot, observed_at);

        if next != self.status {
            info!("Alert state changed: {} -> {}", self.status, next);
            self.status = next;
            self.last_change = Some(observed_at);
        } else if next == AreaStatus::Clear {
            debug!("There are no alerts in the target area, everything is good.");
        } else if let Some(since) = self.last_change() {
            debug!("Alert still ongoing in {}: {} since {}", self.target_area, next, since);
        }

        events
    }

    /// Current status
    pub fn status(&self) -> AreaStatus {
        self.status
    }

    /// Monitored area
    pub fn target_area(&self) -> &str {
        &self.target_area
    }

    /// Time of the last status change
    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        self.last_change
    }
}
