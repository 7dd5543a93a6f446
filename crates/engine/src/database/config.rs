//! Database configuration via `skytrace.toml`
//!
//! On first open, a default `skytrace.toml` is created in the data
//! directory. To change settings, edit the file and reopen.

use serde::{Deserialize, Serialize};
use skytrace_core::{Error, Result};
use skytrace_durability::DurabilityMode;
use skytrace_storage::{
    IndexSettings, DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_LOCK_TIMEOUT, DEFAULT_TIME_BUCKET_SECS,
};
use std::path::Path;
use std::time::Duration;

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "skytrace.toml";

/// Database configuration loaded from `skytrace.toml`.
///
/// # Example
///
/// ```toml
/// durability = "standard"
/// lock_timeout_ms = 250
/// time_bucket_secs = 3600
/// cancel_check_interval = 1024
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkytraceConfig {
    /// Durability mode: `"standard"` or `"always"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Bounded wait for a contended index segment, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Width of one time-index segment, in seconds.
    #[serde(default = "default_time_bucket_secs")]
    pub time_bucket_secs: i64,
    /// Index entries scanned between cancellation checks.
    #[serde(default = "default_cancel_check_interval")]
    pub cancel_check_interval: usize,
}

fn default_durability_str() -> String {
    "standard".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

fn default_time_bucket_secs() -> i64 {
    DEFAULT_TIME_BUCKET_SECS
}

fn default_cancel_check_interval() -> usize {
    DEFAULT_CANCEL_CHECK_INTERVAL
}

impl Default for SkytraceConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            lock_timeout_ms: default_lock_timeout_ms(),
            time_bucket_secs: default_time_bucket_secs(),
            cancel_check_interval: default_cancel_check_interval(),
        }
    }
}

impl SkytraceConfig {
    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the string is not `"standard"` or `"always"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => Ok(DurabilityMode::default()),
            "always" => Ok(DurabilityMode::Strict),
            other => Err(Error::InvalidConfig(format!(
                "invalid durability mode '{}' in {}. Expected \"standard\" or \"always\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Index tunables derived from this config.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero timeout, a non-positive bucket
    /// width, or a zero cancellation interval.
    pub fn index_settings(&self) -> Result<IndexSettings> {
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.time_bucket_secs <= 0 {
            return Err(Error::InvalidConfig(format!(
                "time_bucket_secs must be positive, got {}",
                self.time_bucket_secs
            )));
        }
        if self.cancel_check_interval == 0 {
            return Err(Error::InvalidConfig(
                "cancel_check_interval must be greater than zero".to_string(),
            ));
        }
        Ok(IndexSettings {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            time_bucket_secs: self.time_bucket_secs,
            cancel_check_interval: self.cancel_check_interval,
        })
    }

    /// Check every field
    pub fn validate(&self) -> Result<()> {
        self.durability_mode()?;
        self.index_settings()?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Skytrace database configuration
#
# Durability mode: "standard" (default) or "always"
#   "standard" = fsync every 100ms or 1000 writes, may lose the last batch on crash
#   "always"   = fsync every write
durability = "standard"

# Maximum wait (ms) for a contended index segment before a write or query
# fails with a retryable timeout.
lock_timeout_ms = 250

# Width (seconds) of one time-index segment.
time_bucket_secs = 3600

# Index entries scanned between cancellation checks on long queries.
cancel_check_interval = 1024
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::StorageFailure(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: SkytraceConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::StorageFailure(format!(
                    "failed to write default config file '{}': {}",
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
            .map_err(|e| Error::Serialization(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::StorageFailure(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
