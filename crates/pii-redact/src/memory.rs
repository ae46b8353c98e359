//! Memory monitoring and pressure advisories.
//!
//! A background loop samples system memory on a fixed interval, appends to
//! a bounded history ring, and notifies registered callbacks when usage
//! crosses the warning or critical threshold. The ring is mutated only by
//! the loop and by synchronous quick checks routed through the same lock.
//! On platforms without memory introspection every reading degrades to
//! zero rather than failing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;

/// Number of recent snapshots considered by trend analysis.
const TREND_WINDOW: usize = 5;

/// Relative tolerance band within which usage counts as stable.
const TREND_TOLERANCE: f64 = 0.10;

/// Growth rate above which a leak investigation is recommended, MB/minute.
const LEAK_GROWTH_MB_PER_MIN: f64 = 10.0;

/// A point-in-time memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Used system memory in MB.
    pub used_mb: u64,
    /// Total system memory in MB.
    pub total_mb: u64,
    /// Available system memory in MB.
    pub available_mb: u64,
    /// Coarse estimate of engine-tracked live objects.
    pub active_objects: usize,
    /// Cached compiled-pattern count at sampling time.
    pub cache_entries: usize,
}

impl MemorySnapshot {
    /// A zeroed snapshot for platforms without memory introspection.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            timestamp_ms: now_ms(),
            used_mb: 0,
            total_mb: 0,
            available_mb: 0,
            active_objects: 0,
            cache_entries: 0,
        }
    }
}

/// Threshold breach severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryEventKind {
    /// Usage crossed the warning threshold.
    Warning,
    /// Usage crossed the critical threshold.
    Critical,
}

/// A threshold breach notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEvent {
    /// Breach severity.
    pub kind: MemoryEventKind,
    /// The snapshot that triggered the event.
    pub snapshot: MemorySnapshot,
}

/// Usage trend over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTrend {
    /// Usage is growing beyond the tolerance band.
    Increasing,
    /// Usage is shrinking beyond the tolerance band.
    Decreasing,
    /// Usage is within the tolerance band.
    Stable,
    /// Not enough history to tell.
    Unknown,
}

/// Layered recommendation derived from current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRecommendation {
    /// Usage is above critical: reclaim now.
    UrgentCleanup,
    /// Usage is above warning: reclaim soon.
    ModerateCleanup,
    /// Sustained growth: look for leaks.
    InvestigateLeaks,
    /// Nothing cached while under pressure: enable caching.
    AddCaching,
    /// Too little history: start monitoring.
    StartMonitoring,
}

/// Result of trend analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryAnalysis {
    /// Usage trend over the recent window.
    pub trend: MemoryTrend,
    /// Growth rate in MB per minute over the window.
    pub growth_mb_per_min: f64,
    /// Latest snapshot, when any exists.
    pub current: Option<MemorySnapshot>,
    /// Recommendations, most urgent first.
    pub recommendations: Vec<MemoryRecommendation>,
}

/// Result of an immediate memory check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickCheckReport {
    /// The snapshot taken.
    pub snapshot: MemorySnapshot,
    /// Best-effort actions taken, human-readable.
    pub actions: Vec<String>,
    /// Usage is above the warning threshold.
    pub needs_optimization: bool,
}

/// Callback invoked on threshold breaches.
pub type MemoryCallback = Arc<dyn Fn(MemoryEvent) + Send + Sync>;

/// Best-effort cleanup hook; returns a count of reclaimed items.
pub type CleanupHook = Arc<dyn Fn() -> usize + Send + Sync>;

struct MonitorState {
    history: VecDeque<MemorySnapshot>,
    system: System,
}

/// The memory monitor.
pub struct MemoryMonitor {
    config: MemoryConfig,
    state: Arc<Mutex<MonitorState>>,
    callbacks: Arc<RwLock<Vec<MemoryCallback>>>,
    cleanup: RwLock<Option<CleanupHook>>,
    cache_probe: RwLock<Option<Arc<dyn Fn() -> usize + Send + Sync>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryMonitor {
    /// Create a monitor with the given configuration.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        let history_capacity = config.history_capacity;
        Self {
            config,
            state: Arc::new(Mutex::new(MonitorState {
                history: VecDeque::with_capacity(history_capacity),
                system: System::new(),
            })),
            callbacks: Arc::new(RwLock::new(Vec::new())),
            cleanup: RwLock::new(None),
            cache_probe: RwLock::new(None),
            handle: Mutex::new(None),
        }
    }

    /// The monitor configuration.
    #[must_use]
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Wire the best-effort cleanup action run on critical quick checks.
    pub fn set_cleanup_hook(&self, hook: CleanupHook) {
        *self
            .cleanup
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(hook);
    }

    /// Wire the probe reporting cached-pattern counts into snapshots.
    pub fn set_cache_probe(&self, probe: Arc<dyn Fn() -> usize + Send + Sync>) {
        *self
            .cache_probe
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(probe);
    }

    /// Register a threshold callback.
    pub fn on_threshold(&self, callback: MemoryCallback) {
        self.callbacks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(callback);
    }

    /// Start the background sampling loop.
    ///
    /// A no-op when already running. The optional callback is registered
    /// before the first sample.
    pub fn start(&self, callback: Option<MemoryCallback>) {
        if let Some(callback) = callback {
            self.on_threshold(callback);
        }

        let mut handle = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("memory monitor already running");
            return;
        }

        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let callbacks = Arc::clone(&self.callbacks);
        let cache_probe = self
            .cache_probe
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let event = {
                    let mut state = state
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    let snapshot = sample(
                        &mut state.system,
                        cache_probe.as_deref(),
                        callbacks_len(&callbacks),
                    );
                    push_bounded(&mut state.history, snapshot, config.history_capacity);
                    breach(&config, snapshot)
                };
                if let Some(event) = event {
                    notify(&callbacks, event);
                }
            }
        }));
        info!(interval_secs = self.config.interval.as_secs(), "memory monitoring started");
    }

    /// Stop the background loop.
    pub fn stop(&self) {
        let mut handle = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = handle.take() {
            handle.abort();
            info!("memory monitoring stopped");
        }
    }

    /// Whether the background loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Take a fresh snapshot without touching the history.
    #[must_use]
    pub fn current_snapshot(&self) -> MemorySnapshot {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let probe = self
            .cache_probe
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        sample(
            &mut state.system,
            probe.as_deref(),
            callbacks_len(&self.callbacks),
        )
    }

    /// The most recent snapshots, oldest first, at most `limit`.
    #[must_use]
    pub fn history(&self, limit: Option<usize>) -> Vec<MemorySnapshot> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let limit = limit.unwrap_or(state.history.len());
        state
            .history
            .iter()
            .rev()
            .take(limit)
            .rev()
            .copied()
            .collect()
    }

    /// Sample immediately, record it, and react to pressure.
    ///
    /// Above critical the wired cleanup hook runs and its outcome is
    /// reported; above warning `needs_optimization` is set without acting.
    #[must_use]
    pub fn quick_check(&self) -> QuickCheckReport {
        let snapshot = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let probe = self
                .cache_probe
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone();
            let snapshot = sample(
                &mut state.system,
                probe.as_deref(),
                callbacks_len(&self.callbacks),
            );
            push_bounded(&mut state.history, snapshot, self.config.history_capacity);
            snapshot
        };

        let mut actions = Vec::new();
        if snapshot.used_mb >= self.config.critical_mb {
            warn!(used_mb = snapshot.used_mb, "memory above critical threshold");
            let hook = self
                .cleanup
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone();
            if let Some(hook) = hook {
                let reclaimed = hook();
                actions.push(format!("cache cleanup reclaimed {reclaimed} entries"));
            } else {
                actions.push("no cleanup hook wired".to_string());
            }
        }

        QuickCheckReport {
            snapshot,
            actions,
            needs_optimization: snapshot.used_mb >= self.config.warning_mb,
        }
    }

    /// Analyze the recent history for trend and recommendations.
    #[must_use]
    pub fn analyze(&self) -> MemoryAnalysis {
        let history = {
            let state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.history.iter().copied().collect::<Vec<_>>()
        };

        let window: Vec<MemorySnapshot> = history
            .iter()
            .rev()
            .take(TREND_WINDOW)
            .rev()
            .copied()
            .collect();
        let current = window.last().copied();

        let (trend, growth_mb_per_min) = match (window.first(), window.last()) {
            (Some(first), Some(last)) if window.len() >= 2 => {
                let trend = compare_with_tolerance(first.used_mb, last.used_mb);
                let minutes =
                    (last.timestamp_ms.saturating_sub(first.timestamp_ms)) as f64 / 60_000.0;
                let delta = last.used_mb as f64 - first.used_mb as f64;
                let growth = if minutes > 0.0 { delta / minutes } else { 0.0 };
                (trend, growth)
            }
            _ => (MemoryTrend::Unknown, 0.0),
        };

        let mut recommendations = Vec::new();
        if let Some(current) = current {
            if current.used_mb >= self.config.critical_mb {
                recommendations.push(MemoryRecommendation::UrgentCleanup);
            } else if current.used_mb >= self.config.warning_mb {
                recommendations.push(MemoryRecommendation::ModerateCleanup);
            }
            if trend == MemoryTrend::Increasing && growth_mb_per_min > LEAK_GROWTH_MB_PER_MIN {
                recommendations.push(MemoryRecommendation::InvestigateLeaks);
            }
            if current.cache_entries == 0 && current.used_mb >= self.config.warning_mb {
                recommendations.push(MemoryRecommendation::AddCaching);
            }
        }
        if trend == MemoryTrend::Unknown {
            recommendations.push(MemoryRecommendation::StartMonitoring);
        }

        MemoryAnalysis {
            trend,
            growth_mb_per_min,
            current,
            recommendations,
        }
    }

    #[cfg(test)]
    fn push_snapshot(&self, snapshot: MemorySnapshot) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        push_bounded(&mut state.history, snapshot, self.config.history_capacity);
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn callbacks_len(callbacks: &RwLock<Vec<MemoryCallback>>) -> usize {
    callbacks
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .len()
}

/// Take one reading. Platforms reporting no total memory yield a zeroed
/// snapshot instead of an error.
fn sample(
    system: &mut System,
    cache_probe: Option<&(dyn Fn() -> usize + Send + Sync)>,
    active_objects: usize,
) -> MemorySnapshot {
    system.refresh_memory();
    let total = system.total_memory();
    if total == 0 {
        return MemorySnapshot {
            active_objects,
            cache_entries: cache_probe.map_or(0, |probe| probe()),
            ..MemorySnapshot::zeroed()
        };
    }

    const MB: u64 = 1024 * 1024;
    MemorySnapshot {
        timestamp_ms: now_ms(),
        used_mb: system.used_memory() / MB,
        total_mb: total / MB,
        available_mb: system.available_memory() / MB,
        active_objects,
        cache_entries: cache_probe.map_or(0, |probe| probe()),
    }
}

fn push_bounded(history: &mut VecDeque<MemorySnapshot>, snapshot: MemorySnapshot, capacity: usize) {
    while history.len() >= capacity.max(1) {
        history.pop_front();
    }
    history.push_back(snapshot);
}

fn breach(config: &MemoryConfig, snapshot: MemorySnapshot) -> Option<MemoryEvent> {
    if snapshot.used_mb >= config.critical_mb {
        Some(MemoryEvent {
            kind: MemoryEventKind::Critical,
            snapshot,
        })
    } else if snapshot.used_mb >= config.warning_mb {
        Some(MemoryEvent {
            kind: MemoryEventKind::Warning,
            snapshot,
        })
    } else {
        None
    }
}

/// Notify every callback asynchronously so a slow consumer cannot stall
/// the sampling loop.
fn notify(callbacks: &RwLock<Vec<MemoryCallback>>, event: MemoryEvent) {
    let callbacks = callbacks
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();
    for callback in callbacks {
        let event = event.clone();
        tokio::spawn(async move {
            callback(event);
        });
    }
}

fn compare_with_tolerance(first_mb: u64, last_mb: u64) -> MemoryTrend {
    let first = first_mb as f64;
    let last = last_mb as f64;
    if first == 0.0 {
        return if last > 0.0 {
            MemoryTrend::Increasing
        } else {
            MemoryTrend::Stable
        };
    }
    let ratio = last / first;
    if ratio > 1.0 + TREND_TOLERANCE {
        MemoryTrend::Increasing
    } else if ratio < 1.0 - TREND_TOLERANCE {
        MemoryTrend::Decreasing
    } else {
        MemoryTrend::Stable
    }
}
