//! Tracing subscriber setup

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level ("trace" .. "error"); `RUST_LOG` takes precedence
    pub level: String,
    /// Write to stderr
    pub console_output: bool,
    /// Also write to this file when set
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_path: None,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Configured level, falling back to INFO when unparsable
    pub fn parse_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }
}

/// Keeps the non-blocking file writer alive
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Install the global subscriber.
///
/// Returns `Ok(None)` without a file layer. A subscriber that is already
/// installed (another test, the host application) is left in place.
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    // One filter per layer; RUST_LOG takes precedence over the configured level
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(config.parse_level().into())
            .from_env_lossy()
    };

    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter())
    });

    let (file_layer, guard) = match &config.file_path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {:?}", path))?;
            let (writer, worker_guard) = tracing_appender::non_blocking(file);

            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(LogGuard { _guard: worker_guard }))
        }
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(guard);
    }

    tracing::info!("Logging initialized at level: {}", config.level);
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(LogConfig::default().parse_level(), LevelFilter::INFO);
        assert_eq!(
            LogConfig::default().with_level("debug").parse_level(),
            LevelFilter::DEBUG
        );
        assert_eq!(
            LogConfig::default().with_level("loud").parse_level(),
            LevelFilter::INFO
        );
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig {
            console_output: false,
            ..Default::default()
        };
        assert!(init(&config).unwrap().is_none());
        assert!(init(&config).unwrap().is_none());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: LogConfig =
            serde_json::from_str(r#"{"level": "warn", "console_output": false}"#).unwrap();
        assert_eq!(config.file_path, None);
        assert_eq!(config.parse_level(), LevelFilter::WARN);
    }
}
