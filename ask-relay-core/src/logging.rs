//! Logging setup

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::schema::LoggingConfig;

/// Prefix of rolled log files (`relay.log.YYYY-MM-DD`)
pub const LOG_FILE_PREFIX: &str = "relay.log";

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level
/// plus per-module overrides
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for (module, level) in &config.overrides {
        match format!("{}={}", module, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => eprintln!("Invalid log directive: {}={}", module, level),
        }
    }
    filter
}

/// Whether JSON output is requested (`LOG_FORMAT` beats the config)
pub fn wants_json(config: &LoggingConfig) -> bool {
    std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| config.format.clone())
        .eq_ignore_ascii_case("json")
}

/// Initialize the logging system.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let filter = build_filter(config);
    let is_json = wants_json(config);

    let file_appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let file_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Err(e) = cleanup_old_logs(Path::new(&config.dir), config.retention_days) {
        eprintln!("Failed to clean up old logs: {}", e);
    }

    guard
}

/// Remove rolled log files older than `days` days. Returns how many were
/// deleted.
pub fn cleanup_old_logs(dir: &Path, days: u64) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let threshold = Duration::from_secs(days.saturating_mul(86_400));
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !path.is_file() || !is_log {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > threshold) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to remove old log file {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cleanup_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert_eq!(cleanup_old_logs(&missing, 7).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_keeps_fresh_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("relay.log.2026-01-01"), "x").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "y").unwrap();

        // files written just now are younger than the cutoff
        assert_eq!(cleanup_old_logs(temp_dir.path(), 1).unwrap(), 0);
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_huge_retention_keeps_everything() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("relay.log.2026-01-01"), "x").unwrap();

        assert_eq!(cleanup_old_logs(temp_dir.path(), u64::MAX).unwrap(), 0);
        assert!(temp_dir.path().join("relay.log.2026-01-01").exists());
    }

    #[test]
    fn test_build_filter_ignores_bad_override() {
        let mut config = LoggingConfig::default();
        config
            .overrides
            .insert("ask_relay_core".to_string(), "debug".to_string());
        config
            .overrides
            .insert("bad module".to_string(), "loud".to_string());

        let filter = build_filter(&config);
        assert!(filter.to_string().contains("ask_relay_core=debug"));
    }
}
