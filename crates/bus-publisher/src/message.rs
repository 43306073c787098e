//! Outbound message payload

use alerting::{TransitionEvent, TransitionKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PublishError;

const SYNTHESIZED_TITLE: &str = "No active alerts";

/// JSON payload published for a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub area: String,
    pub kind: TransitionKind,
    pub observed_at: DateTime<Utc>,
    /// Feed timestamp of the source record
    pub alert_time: Option<NaiveDateTime>,
    /// Feed category code of the source record
    pub category: Option<i64>,
    pub title: String,
    pub message: String,
}

impl EventMessage {
    /// Build the payload for an event
    pub fn from_event(event: &TransitionEvent) -> Self {
        let (title, alert_time, category) = match &event.source {
            Some(record) => (record.title.clone(), record.timestamp, Some(record.category.code())),
            None => (SYNTHESIZED_TITLE.to_string(), None, None),
        };

        let message = match (event.kind, event.source.is_some()) {
            (TransitionKind::Prewarning, _) => "Pre-warning alert - Take shelter immediately",
            (TransitionKind::Active, _) => "ACTIVE RED ALERT - TAKE SHELTER NOW",
            (TransitionKind::AllClear, true) => "All clear - Threat has ended",
            (TransitionKind::AllClear, false) => "All clear - No active threats",
        };

        Self {
            area: event.area.clone(),
            kind: event.kind,
            observed_at: event.observed_at,
            alert_time,
            category,
            title,
            message: message.to_string(),
        }
    }

    /// Serialize to JSON, keeping non-ASCII area names readable
    pub fn to_json(&self) -> Result<String, PublishError> {
        serde_json::to_string(self).map_err(|e| PublishError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_feed::{AlertRecord, Category};
    use chrono::TimeZone;

    fn observed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 14, 0, 42, 15).unwrap()
    }

    #[test]
    fn test_synthesized_all_clear() {
        let event = TransitionEvent {
            kind: TransitionKind::AllClear,
            area: "רחובות".to_string(),
            source: None,
            observed_at: observed_at(),
        };

        let message = EventMessage::from_event(&event);
        assert_eq!(message.title, "No active alerts");
        assert_eq!(message.message, "All clear - No active threats");
        assert!(message.alert_time.is_none());
        assert!(message.category.is_none());
    }

    #[test]
    fn test_feed_driven_event() {
        let timestamp = AlertRecord::parse_alert_date("2024-04-14 03:42:13").unwrap();
        let record = AlertRecord::new("רחובות", Category::Active, "ירי רקטות וטילים").with_timestamp(timestamp);
        let event = TransitionEvent {
            kind: TransitionKind::Active,
            area: "רחובות".to_string(),
            source: Some(record),
            observed_at: observed_at(),
        };

        let message = EventMessage::from_event(&event);
        assert_eq!(message.title, "ירי רקטות וטילים");
        assert_eq!(message.category, Some(1));
        assert_eq!(message.alert_time, Some(timestamp));
    }

    #[test]
    fn test_json_shape() {
        let event = TransitionEvent {
            kind: TransitionKind::AllClear,
            area: "רחובות".to_string(),
            source: None,
            observed_at: observed_at(),
        };

        let json = EventMessage::from_event(&event).to_json().unwrap();
        assert!(json.contains("\"area\":\"רחובות\""));
        assert!(json.contains("\"kind\":\"allclear\""));
        assert!(json.contains("\"observed_at\":\"2024-04-14T00:42:15Z\""));
    }
}
