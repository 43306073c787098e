//! MQTT transport

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{EventPublisher, PublishError};

/// Requests buffered between the client handle and the event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Delay before polling the event loop again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// MQTT connection configuration
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker host name or address
    pub broker_host: String,
    /// Broker port
    pub broker_port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// Username, when the broker requires authentication
    pub username: Option<String>,
    /// Password, when the broker requires authentication
    pub password: Option<String>,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Upper bound on a single publish call
    pub publish_timeout: Duration,
    /// Retain published messages on the broker
    pub retain: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "192.168.0.44".to_string(),
            broker_port: 1883,
            client_id: "red_alert_monitor".to_string(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(60),
            publish_timeout: Duration::from_secs(10),
            retain: true,
        }
    }
}

/// Publishes events to an MQTT broker
pub struct MqttPublisher {
    config: MqttConfig,
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttPublisher {
    /// Create the client and start the background event loop
    ///
    /// The broker connection is established (and re-established) by the
    /// event loop, so this succeeds even while the broker is unreachable.
    pub async fn connect(config: MqttConfig) -> Result<Self, PublishError> {
        let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(config.keep_alive);

        match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                options.set_credentials(username, password);
            }
            (None, None) => {}
            _ => {
                return Err(PublishError::Connection(
                    "MQTT username and password must be set together".to_string(),
                ))
            }
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let event_loop = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            info!("Successfully connected to MQTT broker");
                        } else {
                            error!("Failed to connect to MQTT broker with code {:?}", ack.code);
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("Disconnected from MQTT broker");
                    }
                    Ok(Event::Incoming(incoming)) => {
                        debug!("MQTT incoming: {:?}", incoming);
                    }
                    Err(e) => {
                        error!("MQTT error: {}", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                    _ => {}
                }
            }
        });

        info!(
            "Connecting to MQTT broker at {}:{}",
            config.broker_host, config.broker_port
        );

        Ok(Self {
            config,
            client,
            event_loop,
        })
    }

    /// Broker address as `host:port`
    pub fn broker(&self) -> String {
        format!("{}:{}", self.config.broker_host, self.config.broker_port)
    }

    /// Disconnect from the broker and stop the event loop
    pub async fn disconnect(self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("MQTT disconnect failed: {}", e);
        }
        self.event_loop.abort();
        info!("Disconnected from MQTT broker {}", self.broker());
    }
}

#[async_trait]
impl EventPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let timeout = self.config.publish_timeout;

        tokio::time::timeout(
            timeout,
            self.client
                .publish(topic, QoS::AtLeastOnce, self.config.retain, payload),
        )
        .await
        .map_err(|_| PublishError::Timeout(timeout.as_millis() as u64))?
        .map_err(|e| PublishError::Publish(e.to_string()))
    }
}
