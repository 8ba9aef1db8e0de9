//! Reader configuration via `evtlog.toml`
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Values are checked by [`ReaderConfig::validate`] when a file is loaded
//! and when a session is created from a config.

use evtlog_core::{Error, Result};
use evtlog_executor::{ExecutorConfig, DEFAULT_FAILSAFE_TIMEOUT, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name looked up by front ends.
pub const CONFIG_FILE_NAME: &str = "evtlog.toml";

/// Records fetched per batch unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Fetch timeout meaning "wait until data arrives"
pub const INFINITE_TIMEOUT: u32 = u32::MAX;

/// Reader configuration loaded from `evtlog.toml`.
///
/// # Example
///
/// ```toml
/// # Records fetched per round trip to the log source
/// batch_size = 16
///
/// # Give up on a fetch after this many milliseconds (omit to wait forever)
/// # timeout_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Records fetched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fetch timeout in milliseconds; `None` waits for data indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u32>,
    /// Commands a reader's executor queues before callers block.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long a caller waits on the executor before `ExecutorTimeout`.
    #[serde(default = "default_failsafe_timeout_ms")]
    pub failsafe_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_failsafe_timeout_ms() -> u64 {
    DEFAULT_FAILSAFE_TIMEOUT.as_millis() as u64
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            timeout_ms: None,
            queue_capacity: default_queue_capacity(),
            failsafe_timeout_ms: default_failsafe_timeout_ms(),
        }
    }
}

impl ReaderConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# evtlog reader configuration
#
# Records fetched per round trip to the log source (default: 16)
batch_size = 16

# Fetch timeout in milliseconds. Omit to wait until data arrives,
# which is what tailing a live channel wants.
# timeout_ms = 1000

# Commands a reader queues before callers block (default: 16)
queue_capacity = 16

# How long a caller waits for the query worker before giving up with an
# executor timeout. This guards against a hung worker and is not a fetch
# timeout. (default: 60000)
failsafe_timeout_ms = 60000
"#
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReaderConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read, parsed, or holds
    /// an out-of-range value.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config { reason } => {
                Error::config(format!("{} ({})", reason, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Reject values no reader can work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be at least 1"));
        }
        if self.failsafe_timeout_ms == 0 {
            return Err(Error::config("failsafe_timeout_ms must be at least 1"));
        }
        Ok(())
    }

    /// Fetch timeout as passed to the log source.
    pub fn fetch_timeout_ms(&self) -> u32 {
        self.timeout_ms.unwrap_or(INFINITE_TIMEOUT)
    }

    /// Executor settings for a reader whose worker is called `thread_name`.
    pub fn executor_config(&self, thread_name: impl Into<String>) -> ExecutorConfig {
        ExecutorConfig {
            queue_capacity: self.queue_capacity,
            failsafe_timeout: Duration::from_millis(self.failsafe_timeout_ms),
            thread_name: thread_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ReaderConfig::default();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.timeout_ms, None);
        assert_eq!(config.fetch_timeout_ms(), u32::MAX);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.failsafe_timeout_ms, 60_000);
    }

    #[test]
    fn default_toml_parses_to_default() {
        let config = ReaderConfig::from_toml_str(ReaderConfig::default_toml()).unwrap();
        assert_eq!(config, ReaderConfig::default());
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(
            ReaderConfig::from_toml_str("").unwrap(),
            ReaderConfig::default()
        );
    }

    #[test]
    fn parse_timeout() {
        let config = ReaderConfig::from_toml_str("timeout_ms = 250").unwrap();
        assert_eq!(config.fetch_timeout_ms(), 250);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = ReaderConfig::from_toml_str("batch_size = 0").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn zero_failsafe_rejected() {
        let config = ReaderConfig {
            failsafe_timeout_ms: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ReaderConfig::from_toml_str("batch_size = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn executor_config_conversion() {
        let config = ReaderConfig {
            queue_capacity: 4,
            failsafe_timeout_ms: 1500,
            ..ReaderConfig::default()
        };
        let exec = config.executor_config("evtlog-query-7");
        assert_eq!(exec.queue_capacity, 4);
        assert_eq!(exec.failsafe_timeout, Duration::from_millis(1500));
        assert_eq!(exec.thread_name, "evtlog-query-7");
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        ReaderConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(ReaderConfig::from_file(&path).unwrap(), ReaderConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "batch_size = 64\n").unwrap();

        ReaderConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(ReaderConfig::from_file(&path).unwrap().batch_size, 64);
    }

    #[test]
    fn file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = ReaderConfig {
            batch_size: 2,
            timeout_ms: Some(500),
            queue_capacity: 8,
            failsafe_timeout_ms: 10_000,
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(ReaderConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = ReaderConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
