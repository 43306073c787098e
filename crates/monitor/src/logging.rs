//! Logging setup
//!
//! Console output plus an append-only log file. File writes go through a
//! background worker so a slow disk never stalls the poll loop.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize console and file logging
///
/// The default level is INFO; set `RUST_LOG` (e.g. `RUST_LOG=debug`) to
/// change it. The returned guard flushes the file sink when dropped and must
/// be kept alive for the lifetime of the process.
pub fn init_logging(log_file: &str) -> anyhow::Result<WorkerGuard> {
    let (directory, file_name) = split_log_path(log_file)?;
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    let file_appender = tracing_appender::rolling::never(&directory, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    tracing::info!("Logging to {}", directory.join(&file_name).display());

    Ok(guard)
}

/// Split a log file path into its directory (current directory when bare) and file name
fn split_log_path(log_file: &str) -> anyhow::Result<(PathBuf, String)> {
    let path = Path::new(log_file);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("LOG_FILE has no file name: {}", log_file))?
        .to_string();

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((directory, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_file_name() {
        let (directory, file_name) = split_log_path("red_alert_monitor.log").unwrap();
        assert_eq!(directory, PathBuf::from("."));
        assert_eq!(file_name, "red_alert_monitor.log");
    }

    #[test]
    fn test_nested_path() {
        let (directory, file_name) = split_log_path("/var/log/redalert/monitor.log").unwrap();
        assert_eq!(directory, PathBuf::from("/var/log/redalert"));
        assert_eq!(file_name, "monitor.log");
    }

    #[test]
    fn test_directory_only_rejected() {
        assert!(split_log_path("/var/log/..").is_err());
    }
}
