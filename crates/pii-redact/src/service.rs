//! The redaction service.
//!
//! Orchestrates the pattern cache, detection library, stream processor,
//! policy engine and memory monitor into the two operations the tool layer
//! calls: [`RedactionService::detect_pii`] and [`RedactionService::redact_pii`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cache::{CacheStats, PatternCache};
use crate::config::EngineConfig;
use crate::detect::PatternLibrary;
use crate::detect::patterns::DomainWhitelist;
use crate::error::{RedactError, Result};
use crate::memory::{
    MemoryAnalysis, MemoryCallback, MemoryMonitor, MemorySnapshot, QuickCheckReport,
};
use crate::policy::{PolicyEngine, PolicyReport, RedactionContext, RedactionPolicy, RedactionResult};
use crate::stream::StreamProcessor;
use crate::types::{
    AuditContext, Category, DetectionMetadata, DetectionResult, PatternSpec, Sensitivity,
};

/// The streaming PII detection and redaction engine.
///
/// One service instance is shared by the embedding server; all internal
/// state (compiled patterns, memory history) is owned by single logical
/// serializers, so `&self` methods are safe to call concurrently.
pub struct RedactionService {
    config: EngineConfig,
    cache: Arc<PatternCache>,
    library: PatternLibrary,
    stream: StreamProcessor,
    policy_engine: PolicyEngine,
    monitor: Arc<MemoryMonitor>,
}

impl RedactionService {
    /// Create a service from a validated configuration.
    ///
    /// This is the only point that rejects bad configuration; every later
    /// call degrades instead of failing.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(PatternCache::new(config.cache.clone()));
        let library = PatternLibrary::new(Arc::clone(&cache));
        let stream = StreamProcessor::new(config.stream.clone(), Arc::clone(&cache));
        let policy_engine = PolicyEngine::new(library.whitelist().clone());
        let monitor = Arc::new(MemoryMonitor::new(config.memory.clone()));

        // Under pressure the only engine-owned memory worth reclaiming is
        // the compiled-pattern cache.
        let cleanup_cache = Arc::clone(&cache);
        monitor.set_cleanup_hook(Arc::new(move || cleanup_cache.evict_now()));
        let probe_cache = Arc::clone(&cache);
        monitor.set_cache_probe(Arc::new(move || probe_cache.len()));

        Ok(Self {
            config,
            cache,
            library,
            stream,
            policy_engine,
            monitor,
        })
    }

    /// Create a service with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default()).expect("default configuration is valid")
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Detect PII in text under a policy.
    ///
    /// Inputs above the streaming threshold go through the chunked path;
    /// a streaming failure is logged and transparently retried single-pass.
    pub async fn detect_pii(
        &self,
        text: &str,
        policy: &RedactionPolicy,
        preserve_domain_terms: bool,
    ) -> DetectionResult {
        let use_streaming = self.stream.is_streaming_size(text.len());
        self.detect_pii_with(text, policy, preserve_domain_terms, use_streaming)
            .await
    }

    /// Detect PII with an explicit streaming decision.
    pub async fn detect_pii_with(
        &self,
        text: &str,
        policy: &RedactionPolicy,
        preserve_domain_terms: bool,
        use_streaming: bool,
    ) -> DetectionResult {
        let mut result = if use_streaming {
            match self.detect_streaming(text, policy, preserve_domain_terms).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, "streaming detection failed; retrying single-pass");
                    self.detect_single_pass(text, policy, preserve_domain_terms)
                }
            }
        } else {
            self.detect_single_pass(text, policy, preserve_domain_terms)
        };

        // Policies can extend the whitelist beyond the curated terms; that
        // filtering applies post-detection on both paths.
        if preserve_domain_terms && !policy.whitelist_terms.is_empty() {
            let mut extension = DomainWhitelist::empty();
            extension.extend(policy.whitelist_terms.iter().map(String::as_str));
            result
                .detections
                .retain(|d| !extension.contains(&d.text));
            result.categories = distinct_categories(&result);
        }

        result
    }

    /// Redact PII from text under a policy.
    ///
    /// Runs an advisory memory check, detects, applies the policy, and
    /// logs a structured summary correlated by the audit context.
    pub async fn redact_pii(
        &self,
        text: &str,
        policy: &RedactionPolicy,
        preserve_domain_terms: bool,
        context: &RedactionContext,
        audit: &AuditContext,
    ) -> RedactionResult {
        let started = Instant::now();

        // Advisory only: pressure never blocks a redaction request.
        let check = self.monitor.quick_check();
        if check.needs_optimization {
            debug!(
                used_mb = check.snapshot.used_mb,
                actions = check.actions.len(),
                "memory pressure noted before redaction"
            );
        }

        let detection = self.detect_pii(text, policy, preserve_domain_terms).await;
        let mut result =
            self.policy_engine
                .apply(text, &detection.detections, policy, context);

        // Inputs that went through the chunked path are rewritten chunk by
        // chunk from an exact-text replacement map, so every occurrence of
        // a detected string is covered without holding splice offsets for
        // the whole document.
        if detection.metadata.streaming && result.is_redacted() {
            let replacements: std::collections::HashMap<String, String> = result
                .redactions
                .iter()
                .map(|r| (r.detection.text.clone(), r.redacted.clone()))
                .collect();
            result.redacted = self.stream.replace_streaming(text, &replacements);
        }

        info!(
            request_id = audit.request_id.as_deref().unwrap_or("-"),
            session_id = audit.session_id.as_deref().unwrap_or("-"),
            detections = detection.len(),
            redactions = result.redactions.len(),
            categories = ?detection.categories,
            streaming = detection.metadata.streaming,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pii redaction complete"
        );
        result
    }

    /// Validate a policy against this engine.
    #[must_use]
    pub fn validate_policy(&self, policy: &RedactionPolicy) -> PolicyReport {
        self.policy_engine.validate(policy)
    }

    /// Register a custom detection pattern.
    ///
    /// The spec is checked before registration; a malformed spec is the
    /// caller's configuration mistake and is reported, not logged away.
    pub fn register_pattern(&mut self, spec: PatternSpec) -> Result<()> {
        if spec.pattern.is_empty() {
            return Err(RedactError::validation("pattern must not be empty"));
        }
        if !(0.0..=1.0).contains(&spec.confidence) {
            return Err(RedactError::validation(format!(
                "pattern confidence {} outside [0, 1]",
                spec.confidence
            )));
        }
        self.cache.get(&spec)?;
        self.library.register(spec);
        Ok(())
    }

    /// Add terms to the domain whitelist.
    pub fn extend_whitelist<I, S>(&mut self, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.library.extend_whitelist(terms);
        self.policy_engine = PolicyEngine::new(self.library.whitelist().clone());
    }

    /// Case/whitespace-normalized domain-term membership check.
    #[must_use]
    pub fn is_domain_term(&self, text: &str) -> bool {
        self.library.is_domain_term(text)
    }

    // ------------------------------------------------------------------
    // Cache surface
    // ------------------------------------------------------------------

    /// Get or compile one pattern through the shared cache.
    pub fn pattern(&self, spec: &PatternSpec) -> Result<Arc<regex::Regex>> {
        self.cache.get(spec)
    }

    /// Get or compile many patterns; failures are logged and skipped.
    #[must_use]
    pub fn patterns(
        &self,
        specs: &[PatternSpec],
    ) -> std::collections::HashMap<String, Arc<regex::Regex>> {
        self.cache.get_many(specs)
    }

    /// Warm the cache; returns the number of patterns resident.
    pub fn preload(&self, specs: &[PatternSpec]) -> usize {
        self.cache.preload(specs)
    }

    /// Preload every built-in pattern for the given categories.
    pub fn preload_categories(&self, categories: &[Category]) -> usize {
        self.cache.preload(&self.library.specs_for(categories))
    }

    /// Clear the pattern cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Pattern cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ------------------------------------------------------------------
    // Memory monitor surface
    // ------------------------------------------------------------------

    /// Start background memory monitoring.
    pub fn start_monitoring(&self, callback: Option<MemoryCallback>) {
        self.monitor.start(callback);
    }

    /// Stop background memory monitoring.
    pub fn stop_monitoring(&self) {
        self.monitor.stop();
    }

    /// A fresh memory snapshot.
    #[must_use]
    pub fn current_snapshot(&self) -> MemorySnapshot {
        self.monitor.current_snapshot()
    }

    /// Recent memory snapshots, oldest first.
    #[must_use]
    pub fn memory_history(&self, limit: Option<usize>) -> Vec<MemorySnapshot> {
        self.monitor.history(limit)
    }

    /// Trend analysis over the recent history.
    #[must_use]
    pub fn analyze_memory(&self) -> MemoryAnalysis {
        self.monitor.analyze()
    }

    /// Immediate memory check with best-effort cleanup above critical.
    #[must_use]
    pub fn quick_check(&self) -> QuickCheckReport {
        self.monitor.quick_check()
    }

    // ------------------------------------------------------------------

    fn detect_single_pass(
        &self,
        text: &str,
        policy: &RedactionPolicy,
        preserve_domain_terms: bool,
    ) -> DetectionResult {
        self.library.detect(
            text,
            Some(&policy.enabled_categories),
            policy.sensitivity,
            preserve_domain_terms,
        )
    }

    async fn detect_streaming(
        &self,
        text: &str,
        policy: &RedactionPolicy,
        preserve_domain_terms: bool,
    ) -> Result<DetectionResult> {
        let started = Instant::now();
        let specs = self.library.specs_for(&policy.enabled_categories);
        let matches = self.stream.process(text, &specs).await?;
        let detections = self.library.detections_from_stream(
            text,
            &matches,
            policy.sensitivity,
            preserve_domain_terms,
        );

        let mut result = DetectionResult {
            text_len: text.len(),
            categories: Vec::new(),
            detections,
            sensitivity: policy.sensitivity,
            preserve_domain_terms,
            metadata: DetectionMetadata {
                elapsed_ms: started.elapsed().as_millis() as u64,
                patterns_run: specs.len(),
                streaming: true,
            },
        };
        result.categories = distinct_categories(&result);
        Ok(result)
    }
}

impl std::fmt::Debug for RedactionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedactionService")
            .field("config", &self.config)
            .field("cache_size", &self.cache.len())
            .finish()
    }
}

/// Quick check whether text contains any PII at default sensitivity.
#[must_use]
pub fn contains_pii(text: &str) -> bool {
    let cache = Arc::new(PatternCache::with_defaults());
    let library = PatternLibrary::new(cache);
    !library
        .detect(text, None, Sensitivity::Medium, true)
        .is_empty()
}

/// Quick redaction with the default policy and context.
#[must_use]
pub fn redact_text(text: &str) -> String {
    let cache = Arc::new(PatternCache::with_defaults());
    let library = PatternLibrary::new(cache);
    let policy = RedactionPolicy::default();
    let detection = library.detect(
        text,
        Some(&policy.enabled_categories),
        policy.sensitivity,
        policy.preserve_domain_terms,
    );
    let engine = PolicyEngine::new(library.whitelist().clone());
    engine
        .apply(text, &detection.detections, &policy, &RedactionContext::new())
        .redacted
}

fn distinct_categories(result: &DetectionResult) -> Vec<Category> {
    let mut categories: Vec<Category> = result.detections.iter().map(|d| d.category).collect();
    categories.sort_unstable();
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::policy::RedactionStrategy;

    fn service() -> RedactionService {
        RedactionService::with_defaults()
    }

    #[tokio::test]
    async fn detect_small_input_single_pass() {
        let service = service();
        let result = service
            .detect_pii("reach me at jane@corp.com", &RedactionPolicy::default(), false)
            .await;
        assert_eq!(result.len(), 1);
        assert!(!result.metadata.streaming);
    }

    #[tokio::test]
    async fn detect_large_input_uses_streaming() {
        let config = EngineConfig::new().with_stream(
            StreamConfig::new()
                .with_streaming_threshold(64)
                .with_chunk_size(128)
                .with_overlap(64),
        );
        let service = RedactionService::new(config).unwrap();
        let text = format!("{} jane@corp.com {}", "x".repeat(200), "y".repeat(200));

        let result = service
            .detect_pii(&text, &RedactionPolicy::default(), false)
            .await;
        assert_eq!(result.len(), 1);
        assert!(result.metadata.streaming);
        assert_eq!(result.detections[0].start, 201);
    }

    #[tokio::test]
    async fn redact_example_from_tool_layer() {
        let service = service();
        let policy = RedactionPolicy::default();
        let context = RedactionContext::new().with_strategy(RedactionStrategy::Replace);

        let result = service
            .redact_pii(
                "Contact me at jane.doe@corp.com or 555-123-4567",
                &policy,
                true,
                &context,
                &AuditContext::with_request_id("req-1"),
            )
            .await;
        assert_eq!(result.redacted, "Contact me at [EMAIL] or [PHONE]");
    }

    #[tokio::test]
    async fn policy_whitelist_terms_filter_post_detection() {
        let service = service();
        let policy = RedactionPolicy::default()
            .with_whitelist_terms(["ops@corp.com"]);

        let result = service
            .detect_pii("mail ops@corp.com or jane@corp.com", &policy, true)
            .await;
        assert_eq!(result.len(), 1);
        assert_eq!(result.detections[0].text, "jane@corp.com");
    }

    #[tokio::test]
    async fn custom_pattern_through_service() {
        let mut service = service();
        service
            .register_pattern(PatternSpec::new(r"CASE-\d{5}", Category::Custom, 0.9))
            .unwrap();
        let result = service
            .detect_pii("see CASE-12345", &RedactionPolicy::default(), false)
            .await;
        assert_eq!(result.by_category(Category::Custom).count(), 1);
    }

    #[test]
    fn cache_surface_round_trip() {
        let service = service();
        let spec = PatternSpec::new(r"\d{4}", Category::Id, 0.8);
        assert!(service.pattern(&spec).is_ok());
        assert!(service.cache_stats().size >= 1);

        let loaded = service.preload_categories(&[Category::Email, Category::Phone]);
        assert!(loaded >= 2);

        service.clear_cache();
        assert_eq!(service.cache_stats().size, 0);
    }

    #[test]
    fn quick_helpers() {
        assert!(contains_pii("my ssn is 123-45-6789"));
        assert!(!contains_pii("nothing sensitive"));

        let redacted = redact_text("mail jane@corp.com");
        assert!(!redacted.contains("jane@corp.com"));
    }

    #[test]
    fn malformed_custom_pattern_rejected() {
        let mut service = service();
        assert!(
            service
                .register_pattern(PatternSpec::new("", Category::Custom, 0.9))
                .is_err()
        );
        assert!(
            service
                .register_pattern(PatternSpec::new(r"ok\d", Category::Custom, 1.5))
                .is_err()
        );
        assert!(
            service
                .register_pattern(PatternSpec::new(r"[bad", Category::Custom, 0.9))
                .is_err()
        );
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let config = EngineConfig::new()
            .with_stream(StreamConfig::new().with_chunk_size(0));
        assert!(RedactionService::new(config).is_err());
    }
}
