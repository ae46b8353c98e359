//! Integration tests for the memory monitor surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pii_redact::{
    EngineConfig, MemoryConfig, MemoryMonitor, MemoryTrend, RedactionService,
};

fn fast_config() -> MemoryConfig {
    MemoryConfig::new()
        .with_interval(Duration::from_millis(10))
        .with_history_capacity(16)
}

#[tokio::test]
async fn background_loop_populates_history() {
    let monitor = MemoryMonitor::new(fast_config());
    monitor.start(None);

    tokio::time::sleep(Duration::from_millis(60)).await;
    monitor.stop();

    let history = monitor.history(None);
    assert!(!history.is_empty());
    assert!(history.len() <= 16);
    // Timestamps never regress.
    assert!(
        history
            .windows(2)
            .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms)
    );
}

#[tokio::test]
async fn stop_is_idempotent_and_restartable() {
    let monitor = MemoryMonitor::new(fast_config());
    monitor.start(None);
    assert!(monitor.is_running());

    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());

    monitor.start(None);
    assert!(monitor.is_running());
    monitor.stop();
}

#[tokio::test]
async fn quick_check_reports_snapshot_and_flag() {
    let monitor = MemoryMonitor::new(fast_config());
    let report = monitor.quick_check();

    assert_eq!(
        report.needs_optimization,
        report.snapshot.used_mb >= monitor.config().warning_mb
    );
    assert_eq!(monitor.history(None).len(), 1);
}

#[tokio::test]
async fn analyze_without_history_suggests_monitoring() {
    let monitor = MemoryMonitor::new(fast_config());
    let analysis = monitor.analyze();
    assert_eq!(analysis.trend, MemoryTrend::Unknown);
    assert!(analysis.current.is_none());
}

#[tokio::test]
async fn service_wires_cache_cleanup_into_pressure_path() {
    // Thresholds of zero make every sample critical on any host.
    let config = EngineConfig::new().with_memory(
        MemoryConfig::new()
            .with_warning_mb(0)
            .with_critical_mb(1)
            .with_interval(Duration::from_millis(10)),
    );
    let service = RedactionService::new(config).unwrap();

    // Populate the cache, then let the pressure path reclaim it.
    let loaded = service.preload_categories(&[pii_redact::Category::Email]);
    assert!(loaded >= 1);

    let report = service.quick_check();
    if report.snapshot.used_mb >= 1 {
        assert!(report.actions.iter().any(|a| a.contains("cache cleanup")));
    }
}

#[tokio::test]
async fn threshold_callback_receives_events() {
    let monitor = MemoryMonitor::new(
        fast_config().with_warning_mb(0).with_critical_mb(1),
    );
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    monitor.start(Some(Arc::new(move |_event| {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    tokio::time::sleep(Duration::from_millis(80)).await;
    monitor.stop();
    // Give spawned notifications a moment to land.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(seen.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn service_snapshot_includes_cache_estimate() {
    let service = RedactionService::with_defaults();
    service.preload_categories(&[pii_redact::Category::Email, pii_redact::Category::Ssn]);

    let snapshot = service.current_snapshot();
    assert!(snapshot.cache_entries >= 3);
}
