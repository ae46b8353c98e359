//! Compiled-pattern cache.
//!
//! This module provides the single owner of all compiled matchers. Callers
//! share `Arc<Regex>` handles; inserts and evictions serialize through a
//! write lock while hits only take the read lock. Eviction combines a
//! recency/frequency score with a hard maximum entry age.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{RedactError, Result};
use crate::types::PatternSpec;

/// Half-life style decay constant for the eviction score, in seconds.
const SCORE_DECAY_SECS: f64 = 300.0;

/// A cached compiled pattern.
struct CacheEntry {
    regex: Arc<Regex>,
    /// Times this entry has been returned.
    access_count: AtomicU64,
    /// Seconds since the cache epoch at last access.
    last_access_secs: AtomicU64,
    /// Seconds since the cache epoch at insertion.
    inserted_secs: u64,
}

impl CacheEntry {
    /// Recency/frequency score. Lower scores evict first.
    fn score(&self, now_secs: u64) -> f64 {
        let count = self.access_count.load(Ordering::Relaxed) as f64;
        let idle = now_secs.saturating_sub(self.last_access_secs.load(Ordering::Relaxed)) as f64;
        count * (-idle / SCORE_DECAY_SECS).exp()
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Current number of cached patterns.
    pub size: usize,
    /// Maximum size after a cleanup pass.
    pub max_size: usize,
    /// Most-accessed patterns, descending, at most five.
    pub top_accessed: Vec<(String, u64)>,
    /// Total cache hits.
    pub hits: u64,
    /// Total cache misses.
    pub misses: u64,
}

impl CacheStats {
    /// Hit ratio estimate (1.0 when no accesses have been made).
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            1.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A cache for compiled detection patterns.
///
/// Eviction runs once the entry count reaches the configured cleanup
/// threshold: entries older than `max_age` are purged outright, then the
/// lowest-scoring entries are removed until the size bound holds.
pub struct PatternCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
    /// Cache epoch; entry timestamps are seconds since this instant.
    epoch: Instant,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PatternCache {
    /// Create a new cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(config.max_size)),
            config,
            epoch: Instant::now(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    fn now_secs(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }

    /// Get or compile the matcher for a pattern spec.
    ///
    /// A hit refreshes the entry's access count and last-access time. A
    /// compile failure is returned to the caller and never cached.
    pub fn get(&self, spec: &PatternSpec) -> Result<Arc<Regex>> {
        self.get_source(&spec.cache_key())
    }

    /// Get or compile a matcher from a raw pattern source.
    pub fn get_source(&self, source: &str) -> Result<Arc<Regex>> {
        let now = self.now_secs();

        // Read path first. Lock poisoning is recovered from since the cache
        // is an optimization, not a correctness boundary.
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(entry) = entries.get(source) {
                entry.access_count.fetch_add(1, Ordering::Relaxed);
                entry.last_access_secs.store(now, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.regex));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);

        let regex = Regex::new(source).map_err(|source_err| RedactError::PatternCompilation {
            pattern: source.to_string(),
            source: source_err,
        })?;
        let regex = Arc::new(regex);

        {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            // Double-check after acquiring the write lock (another caller
            // may have inserted the same pattern).
            if let Some(entry) = entries.get(source) {
                entry.access_count.fetch_add(1, Ordering::Relaxed);
                entry.last_access_secs.store(now, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.regex));
            }

            entries.insert(
                source.to_string(),
                CacheEntry {
                    regex: Arc::clone(&regex),
                    access_count: AtomicU64::new(1),
                    last_access_secs: AtomicU64::new(now),
                    inserted_secs: now,
                },
            );

            if entries.len() >= self.config.cleanup_threshold {
                self.evict_locked(&mut entries, now);
            }
        }

        Ok(regex)
    }

    /// Get or compile matchers for many specs at once.
    ///
    /// Compile failures are logged per-pattern and skipped so the rest of a
    /// category still runs; the returned map is keyed by cache key.
    #[must_use]
    pub fn get_many(&self, specs: &[PatternSpec]) -> HashMap<String, Arc<Regex>> {
        let mut matchers = HashMap::with_capacity(specs.len());
        for spec in specs {
            let key = spec.cache_key();
            match self.get_source(&key) {
                Ok(regex) => {
                    matchers.insert(key, regex);
                }
                Err(err) => {
                    warn!(pattern = %spec.pattern, category = ?spec.category, error = %err,
                        "skipping pattern that failed to compile");
                }
            }
        }
        matchers
    }

    /// Warm the cache with the given specs.
    ///
    /// Returns the number of patterns now resident.
    pub fn preload(&self, specs: &[PatternSpec]) -> usize {
        let loaded = self.get_many(specs).len();
        debug!(requested = specs.len(), loaded, "pattern cache preloaded");
        loaded
    }

    /// Check if a pattern source is cached.
    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.contains_key(source)
    }

    /// Current number of cached patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all cached patterns.
    pub fn clear(&self) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.clear();
    }

    /// Run an eviction pass immediately, regardless of entry count.
    ///
    /// Used as the best-effort cleanup action under memory pressure.
    /// Returns the number of entries removed.
    pub fn evict_now(&self) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = entries.len();
        self.evict_locked(&mut entries, self.now_secs());
        before - entries.len()
    }

    /// Eviction with the write lock held: purge over-age entries, then drop
    /// the lowest-scoring entries until the size bound holds.
    fn evict_locked(&self, entries: &mut HashMap<String, CacheEntry>, now_secs: u64) {
        let max_age_secs = self.config.max_age.as_secs();
        entries.retain(|_, entry| now_secs.saturating_sub(entry.inserted_secs) <= max_age_secs);

        if entries.len() <= self.config.max_size {
            return;
        }

        let mut scored: Vec<(String, f64)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.score(now_secs)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let excess = entries.len() - self.config.max_size;
        for (key, _) in scored.into_iter().take(excess) {
            entries.remove(&key);
        }

        debug!(size = entries.len(), max = self.config.max_size, "pattern cache eviction pass");
    }

    /// Get a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut top: Vec<(String, u64)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.access_count.load(Ordering::Relaxed)))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1));
        top.truncate(5);

        CacheStats {
            size: entries.len(),
            max_size: self.config.max_size,
            top_accessed: top,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCache")
            .field("size", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
