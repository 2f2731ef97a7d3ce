// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator configuration
//!
//! Defaults match a single session server: ten workers, match locks that go
//! stale after 10s and are swept after 30s, and a cleanup pass every 10s.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one `Coordinator` instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Size of the task worker pool
    pub max_workers: usize,
    /// Age after which a match lock holder may be displaced by a waiter
    #[serde(with = "humantime_serde")]
    pub stale_threshold: Duration,
    /// Age after which the supervisor removes a match lock outright
    #[serde(with = "humantime_serde")]
    pub match_lock_ttl: Duration,
    /// How often the cleanup supervisor sweeps
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
    /// How often a queued match lock waiter re-checks the holder's age
    #[serde(with = "humantime_serde")]
    pub reclaim_poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            stale_threshold: Duration::from_secs(10),
            match_lock_ttl: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(10),
            reclaim_poll_interval: Duration::from_millis(250),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn with_match_lock_ttl(mut self, ttl: Duration) -> Self {
        self.match_lock_ttl = ttl;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_reclaim_poll_interval(mut self, interval: Duration) -> Self {
        self.reclaim_poll_interval = interval;
        self
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if self.stale_threshold.is_zero() {
            return Err(ConfigError::Invalid("stale_threshold must be non-zero".into()));
        }
        if self.match_lock_ttl <= self.stale_threshold {
            return Err(ConfigError::Invalid(format!(
                "match_lock_ttl ({:?}) must exceed stale_threshold ({:?})",
                self.match_lock_ttl, self.stale_threshold
            )));
        }
        if self.cleanup_interval.is_zero() || self.reclaim_poll_interval.is_zero() {
            return Err(ConfigError::Invalid("intervals must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
