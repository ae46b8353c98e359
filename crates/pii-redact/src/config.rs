//! Configuration types for the redaction engine.
//!
//! This module defines configuration structures for the stream processor,
//! pattern cache, and memory monitor. The embedding server owns config-file
//! and CLI parsing; these types are plain values it fills in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RedactError, Result};
use crate::types::Sensitivity;

/// Default streaming threshold (8 KiB). Inputs at or below this size take
/// the single-pass path.
pub const DEFAULT_STREAMING_THRESHOLD: usize = 8 * 1024;

/// Default nominal chunk size (4 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Default trailing overlap between chunks (256 bytes).
///
/// Must stay at or above the longest expected pattern match so boundary
/// matches are never lost.
pub const DEFAULT_OVERLAP: usize = 256;

/// Default worker-pool size for chunked matching.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default maximum number of cached compiled patterns.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 100;

/// Default entry count at which a cleanup pass is triggered.
pub const DEFAULT_CACHE_CLEANUP_THRESHOLD: usize = 120;

/// Default maximum age of a cache entry (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Default memory warning threshold in MB.
pub const DEFAULT_MEMORY_WARNING_MB: u64 = 512;

/// Default memory critical threshold in MB.
pub const DEFAULT_MEMORY_CRITICAL_MB: u64 = 1024;

/// Default memory sampling interval (5 seconds).
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of snapshots retained in the monitor history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 120;

/// Configuration for the stream processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Inputs larger than this (bytes) use the chunked path.
    pub streaming_threshold: usize,
    /// Nominal chunk size in bytes.
    pub chunk_size: usize,
    /// Trailing overlap in bytes.
    pub overlap: usize,
    /// Maximum chunks matched concurrently.
    pub concurrency: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            streaming_threshold: DEFAULT_STREAMING_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl StreamConfig {
    /// Create a new stream configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the streaming threshold in bytes.
    #[must_use]
    pub const fn with_streaming_threshold(mut self, bytes: usize) -> Self {
        self.streaming_threshold = bytes;
        self
    }

    /// Set the nominal chunk size in bytes.
    #[must_use]
    pub const fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the trailing overlap in bytes.
    #[must_use]
    pub const fn with_overlap(mut self, bytes: usize) -> Self {
        self.overlap = bytes;
        self
    }

    /// Set the worker-pool size.
    #[must_use]
    pub const fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers;
        self
    }
}

/// Configuration for the pattern cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries retained after a cleanup pass.
    pub max_size: usize,
    /// Entry count at which a cleanup pass runs. Must exceed `max_size`.
    pub cleanup_threshold: usize,
    /// Entries older than this are purged regardless of score.
    pub max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CACHE_MAX_SIZE,
            cleanup_threshold: DEFAULT_CACHE_CLEANUP_THRESHOLD,
            max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum cache size.
    #[must_use]
    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the cleanup threshold.
    #[must_use]
    pub const fn with_cleanup_threshold(mut self, threshold: usize) -> Self {
        self.cleanup_threshold = threshold;
        self
    }

    /// Set the maximum entry age.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

/// Configuration for the memory monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Warning threshold in MB of used process memory.
    pub warning_mb: u64,
    /// Critical threshold in MB of used process memory.
    pub critical_mb: u64,
    /// Sampling interval for the background loop.
    pub interval: Duration,
    /// Number of snapshots retained in history.
    pub history_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            warning_mb: DEFAULT_MEMORY_WARNING_MB,
            critical_mb: DEFAULT_MEMORY_CRITICAL_MB,
            interval: DEFAULT_MONITOR_INTERVAL,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl MemoryConfig {
    /// Create a new memory configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the warning threshold in MB.
    #[must_use]
    pub const fn with_warning_mb(mut self, mb: u64) -> Self {
        self.warning_mb = mb;
        self
    }

    /// Set the critical threshold in MB.
    #[must_use]
    pub const fn with_critical_mb(mut self, mb: u64) -> Self {
        self.critical_mb = mb;
        self
    }

    /// Set the sampling interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the history capacity.
    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stream processor configuration.
    pub stream: StreamConfig,
    /// Pattern cache configuration.
    pub cache: CacheConfig,
    /// Memory monitor configuration.
    pub memory: MemoryConfig,
    /// Default sensitivity for detection passes.
    pub sensitivity: Sensitivity,
}

impl EngineConfig {
    /// Create a new engine configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream configuration.
    #[must_use]
    pub const fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Set the cache configuration.
    #[must_use]
    pub const fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the memory configuration.
    #[must_use]
    pub const fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Set the default sensitivity.
    #[must_use]
    pub const fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Validate the configuration.
    ///
    /// This is the only place the engine rejects a call before any
    /// processing starts.
    pub fn validate(&self) -> Result<()> {
        if self.stream.chunk_size == 0 {
            return Err(RedactError::config("chunk_size must be non-zero"));
        }
        if self.stream.overlap >= self.stream.chunk_size {
            return Err(RedactError::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.stream.overlap, self.stream.chunk_size
            )));
        }
        if self.stream.concurrency == 0 {
            return Err(RedactError::config("concurrency must be non-zero"));
        }
        if self.cache.max_size == 0 {
            return Err(RedactError::config("cache max_size must be non-zero"));
        }
        if self.cache.cleanup_threshold <= self.cache.max_size {
            return Err(RedactError::config(format!(
                "cache cleanup_threshold ({}) must exceed max_size ({})",
                self.cache.cleanup_threshold, self.cache.max_size
            )));
        }
        if self.memory.critical_mb <= self.memory.warning_mb {
            return Err(RedactError::config(format!(
                "memory critical_mb ({}) must exceed warning_mb ({})",
                self.memory.critical_mb, self.memory.warning_mb
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let config = EngineConfig::new()
            .with_stream(
                StreamConfig::new()
                    .with_chunk_size(1024)
                    .with_overlap(128)
                    .with_concurrency(2)
                    .with_streaming_threshold(2048),
            )
            .with_sensitivity(Sensitivity::High);

        assert_eq!(config.stream.chunk_size, 1024);
        assert_eq!(config.stream.overlap, 128);
        assert_eq!(config.sensitivity, Sensitivity::High);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_overlap_ge_chunk_size() {
        let config = EngineConfig::new()
            .with_stream(StreamConfig::new().with_chunk_size(256).with_overlap(256));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = EngineConfig::new().with_stream(StreamConfig::new().with_concurrency(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cleanup_threshold_below_max_size() {
        let config = EngineConfig::new().with_cache(
            CacheConfig::new()
                .with_max_size(100)
                .with_cleanup_threshold(100),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_memory_thresholds() {
        let config = EngineConfig::new().with_memory(
            MemoryConfig::new()
                .with_warning_mb(1024)
                .with_critical_mb(512),
        );
        assert!(config.validate().is_err());
    }
}
