//! Red Alert Monitor
//!
//! Polls the civil-defense alert feed and publishes pre-warning, active and
//! all-clear transitions for one area to MQTT.

mod settings;
mod logging;

use alert_feed::HttpFetcher;
use alerting::StateTracker;
use bus_publisher::MqttPublisher;
use poll_scheduler::PollLoop;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use settings::{ConfigError, MonitorConfig};
pub use logging::init_logging;

/// Run the monitor until Ctrl-C or SIGTERM
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(config.fetcher_config())?;
    let publisher = MqttPublisher::connect(config.mqtt_config()).await?;
    let tracker = StateTracker::new(config.target_area.clone());

    let mut poll = PollLoop::new(
        fetcher,
        publisher,
        tracker,
        config.topics(),
        config.scheduler_config(),
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received interrupt signal, shutting down...");
        trigger.cancel();
    });

    poll.run(shutdown).await;

    poll.into_publisher().disconnect().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
