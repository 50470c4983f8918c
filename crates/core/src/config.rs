//! Router configuration via `shardwrite.toml`
//!
//! Child-batch thresholds and the stale-routing retry budget are environment
//! tunable. A missing file means defaults; a present file is parsed and
//! validated eagerly so a bad value fails at startup, not mid-batch.

use crate::error::{Error, Result};
use crate::limits::BatchLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "shardwrite.toml";

/// Default number of consecutive non-progressing rounds tolerated
pub const DEFAULT_MAX_ROUNDS_WITHOUT_PROGRESS: usize = 5;

/// Router configuration loaded from `shardwrite.toml`.
///
/// # Example
///
/// ```toml
/// max_write_batch_size = 100000
/// max_batch_bytes = 16777216
/// max_rounds_without_progress = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Maximum operations per child batch.
    #[serde(default = "default_max_write_batch_size")]
    pub max_write_batch_size: usize,
    /// Maximum estimated payload bytes per child batch.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
    /// Framing bytes charged per operation.
    #[serde(default = "default_per_op_overhead_bytes")]
    pub per_op_overhead_bytes: usize,
    /// Statement-id bytes charged per operation under a retryable-write session.
    #[serde(default = "default_retryable_write_overhead_bytes")]
    pub retryable_write_overhead_bytes: usize,
    /// Consecutive stale rounds without progress before giving up.
    #[serde(default = "default_max_rounds_without_progress")]
    pub max_rounds_without_progress: usize,
}

fn default_max_write_batch_size() -> usize {
    BatchLimits::default().max_write_batch_size
}

fn default_max_batch_bytes() -> usize {
    BatchLimits::default().max_batch_bytes
}

fn default_per_op_overhead_bytes() -> usize {
    BatchLimits::default().per_op_overhead_bytes
}

fn default_retryable_write_overhead_bytes() -> usize {
    BatchLimits::default().retryable_write_overhead_bytes
}

fn default_max_rounds_without_progress() -> usize {
    DEFAULT_MAX_ROUNDS_WITHOUT_PROGRESS
}

impl Default for RouterConfig {
    fn default() -> Self {
        let limits = BatchLimits::default();
        Self {
            max_write_batch_size: limits.max_write_batch_size,
            max_batch_bytes: limits.max_batch_bytes,
            per_op_overhead_bytes: limits.per_op_overhead_bytes,
            retryable_write_overhead_bytes: limits.retryable_write_overhead_bytes,
            max_rounds_without_progress: DEFAULT_MAX_ROUNDS_WITHOUT_PROGRESS,
        }
    }
}

impl RouterConfig {
    /// Child-batch limits described by this config
    pub fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_write_batch_size: self.max_write_batch_size,
            max_batch_bytes: self.max_batch_bytes,
            per_op_overhead_bytes: self.per_op_overhead_bytes,
            retryable_write_overhead_bytes: self.retryable_write_overhead_bytes,
        }
    }

    /// Config with the given limits and default retry budget
    pub fn with_limits(limits: BatchLimits) -> Self {
        Self {
            max_write_batch_size: limits.max_write_batch_size,
            max_batch_bytes: limits.max_batch_bytes,
            per_op_overhead_bytes: limits.per_op_overhead_bytes,
            retryable_write_overhead_bytes: limits.retryable_write_overhead_bytes,
            ..Self::default()
        }
    }

    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a limit is zero.
    pub fn validate(&self) -> Result<()> {
        self.limits().validate()
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Shardwrite router configuration
#
# Maximum number of write operations sent to one shard in one child batch.
max_write_batch_size = 100000

# Maximum estimated payload (bytes) of one child batch (default: 16MB).
max_batch_bytes = 16777216

# Framing bytes charged per operation when packing child batches.
per_op_overhead_bytes = 2

# Extra bytes charged per operation when the batch is a retryable write.
retryable_write_overhead_bytes = 8

# Consecutive stale-routing rounds without progress before the remaining
# operations fail with NoProgressMade.
max_rounds_without_progress = 5
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a value is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RouterConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse router config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            Error::Config(format!("Config file '{}': {}", path.display(), e))
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
