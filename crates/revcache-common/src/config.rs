//! Configuration types for the revision cache
//!
//! This module defines configuration structures used by the cache and the
//! tools built on it. Every section falls back to its defaults when omitted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of recently-accessed revisions cached when no capacity is configured
pub const DEFAULT_REVISION_CACHE_CAPACITY: u32 = 5000;

/// Root configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Revision cache configuration
    #[serde(default)]
    pub cache: RevisionCacheConfig,
    /// Hit/miss statistics configuration
    #[serde(default)]
    pub stats: StatsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::configuration(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }
}

/// Revision cache configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionCacheConfig {
    /// Maximum number of cached revisions (0 = default)
    #[serde(default)]
    pub capacity: u32,
}

impl RevisionCacheConfig {
    /// Capacity with 0 resolved to [`DEFAULT_REVISION_CACHE_CAPACITY`]
    #[must_use]
    pub fn resolved_capacity(&self) -> u32 {
        resolve_capacity(self.capacity)
    }
}

/// Resolve a configured capacity, mapping 0 to the default
#[must_use]
pub const fn resolve_capacity(capacity: u32) -> u32 {
    if capacity == 0 {
        DEFAULT_REVISION_CACHE_CAPACITY
    } else {
        capacity
    }
}

/// Hit/miss statistics configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Record hits and misses at all
    #[serde(default = "default_stats_enabled")]
    pub enabled: bool,
    /// Counter incremented on a cache hit
    #[serde(default = "default_hits_counter")]
    pub hits_counter: String,
    /// Counter incremented on a cache miss
    #[serde(default = "default_misses_counter")]
    pub misses_counter: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_stats_enabled(),
            hits_counter: default_hits_counter(),
            misses_counter: default_misses_counter(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_stats_enabled() -> bool {
    true
}

fn default_hits_counter() -> String {
    "revision_cache_hits".to_string()
}

fn default_misses_counter() -> String {
    "revision_cache_misses".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
