//! Event Publishing
//!
//! Delivers area transition events to the message bus:
//! - one topic per transition kind
//! - JSON payloads built from [`alerting::TransitionEvent`]
//! - MQTT transport via rumqttc
//!
//! Delivery is at-most-once from the monitor's point of view: a failed
//! publish is reported to the caller and never retried here.

mod message;
mod mqtt;

use alerting::{TransitionEvent, TransitionKind};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use message::EventMessage;
pub use mqtt::{MqttConfig, MqttPublisher};

/// Publish error types
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Publish timed out after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Message bus the monitor publishes to
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a payload on a topic
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Destination topic for each transition kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub prewarning: String,
    pub active: String,
    pub all_clear: String,
}

impl Topics {
    /// Topic for a transition kind
    pub fn topic_for(&self, kind: TransitionKind) -> &str {
        match kind {
            TransitionKind::Prewarning => &self.prewarning,
            TransitionKind::Active => &self.active,
            TransitionKind::AllClear => &self.all_clear,
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            prewarning: "redalert/prewarning".to_string(),
            active: "redalert/active".to_string(),
            all_clear: "redalert/allclear".to_string(),
        }
    }
}

/// Serialize an event and publish it on the topic for its kind
pub async fn publish_event<P>(
    publisher: &P,
    topics: &Topics,
    event: &TransitionEvent,
) -> Result<(), PublishError>
where
    P: EventPublisher + ?Sized,
{
    let topic = topics.topic_for(event.kind);
    let payload = EventMessage::from_event(event).to_json()?;

    publisher.publish(topic, payload.clone().into_bytes()).await?;

    info!("Published to {}: {}", topic, payload);
    Ok(())
}
