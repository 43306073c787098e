//! Monitor configuration
//!
//! Every setting comes from an environment variable of the same name in
//! upper case (`POLL_INTERVAL`, `MQTT_BROKER`, ...) and falls back to a
//! default when unset or empty.

use alert_feed::{FetcherConfig, DEFAULT_ALERTS_URL};
use bus_publisher::{MqttConfig, Topics};
use config::{Config, Environment};
use poll_scheduler::SchedulerConfig;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TARGET_AREA: &str = "רחובות";

/// Configuration errors, all fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value could not be read or has the wrong type
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value was read but is not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Alert feed URL
    pub alerts_url: String,
    /// Poll interval (seconds)
    pub poll_interval: u64,
    /// Feed request and publish timeout (seconds)
    pub request_timeout: u64,
    /// Area to monitor, matched exactly against feed area names
    pub target_area: String,
    /// MQTT broker host
    pub mqtt_broker: String,
    /// MQTT broker port
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub topic_prewarning: String,
    pub topic_active: String,
    pub topic_allclear: String,
    /// Append-only log file
    pub log_file: String,
}

impl MonitorConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    /// Load from an explicit environment source
    pub fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("alerts_url", DEFAULT_ALERTS_URL)?
            .set_default("poll_interval", 5_i64)?
            .set_default("request_timeout", 10_i64)?
            .set_default("target_area", DEFAULT_TARGET_AREA)?
            .set_default("mqtt_broker", "192.168.0.44")?
            .set_default("mqtt_port", 1883_i64)?
            .set_default("mqtt_client_id", "red_alert_monitor")?
            .set_default("topic_prewarning", "redalert/prewarning")?
            .set_default("topic_active", "redalert/active")?
            .set_default("topic_allclear", "redalert/allclear")?
            .set_default("log_file", "red_alert_monitor.log")?
            .add_source(environment.try_parsing(true).ignore_empty(true))
            .build()?;

        let config: MonitorConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval == 0 {
            return Err(ConfigError::Invalid("POLL_INTERVAL must be at least 1 second".to_string()));
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT must be at least 1 second".to_string()));
        }
        if self.target_area.trim().is_empty() {
            return Err(ConfigError::Invalid("TARGET_AREA must not be empty".to_string()));
        }
        if !(self.alerts_url.starts_with("http://") || self.alerts_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "ALERTS_URL must be an http(s) URL, got {}",
                self.alerts_url
            )));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::Invalid("MQTT_PORT must not be 0".to_string()));
        }
        if self.mqtt_username.is_some() != self.mqtt_password.is_some() {
            return Err(ConfigError::Invalid(
                "MQTT_USERNAME and MQTT_PASSWORD must be set together".to_string(),
            ));
        }
        Ok(())
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Feed fetcher settings
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            url: self.alerts_url.clone(),
            timeout: self.request_timeout(),
        }
    }

    /// MQTT publisher settings
    pub fn mqtt_config(&self) -> MqttConfig {
        MqttConfig {
            broker_host: self.mqtt_broker.clone(),
            broker_port: self.mqtt_port,
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            publish_timeout: self.request_timeout(),
            ..MqttConfig::default()
        }
    }

    /// Destination topics
    pub fn topics(&self) -> Topics {
        Topics {
            prewarning: self.topic_prewarning.clone(),
            active: self.topic_active.clone(),
            all_clear: self.topic_allclear.clone(),
        }
    }

    /// Poll loop settings
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.poll_interval),
            fetch_timeout: self.request_timeout(),
        }
    }
}
