//! The detection pattern library.
//!
//! Runs per-category pattern sets against text via the shared pattern
//! cache, scores matches, applies the sensitivity dial and the domain-term
//! whitelist, and merges overlapping matches within a category.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::cache::PatternCache;
use crate::detect::checks::{luhn_check, ssn_range_valid};
use crate::detect::patterns::{DomainWhitelist, builtin_patterns};
use crate::stream::StreamMatch;
use crate::types::{
    Category, Detection, DetectionMetadata, DetectionResult, PatternSpec, Sensitivity, Severity,
};

/// Confidence weight for matches that start mid-token.
const INTERIOR_POSITION_WEIGHT: f32 = 0.85;

/// The detection pattern library.
pub struct PatternLibrary {
    patterns: HashMap<Category, Vec<PatternSpec>>,
    /// Cache key -> owning spec, for mapping streaming matches back.
    by_key: HashMap<String, PatternSpec>,
    whitelist: DomainWhitelist,
    cache: Arc<PatternCache>,
}

impl PatternLibrary {
    /// Create a library with the built-in pattern sets.
    #[must_use]
    pub fn new(cache: Arc<PatternCache>) -> Self {
        let mut library = Self {
            patterns: HashMap::new(),
            by_key: HashMap::new(),
            whitelist: DomainWhitelist::new(),
            cache,
        };
        for category in Category::ALL {
            for spec in builtin_patterns(category) {
                library.register(spec);
            }
        }
        library
    }

    /// Register a pattern at runtime.
    ///
    /// Typically used for [`Category::Custom`] rules supplied by the
    /// embedding server.
    pub fn register(&mut self, spec: PatternSpec) {
        self.by_key.insert(spec.cache_key(), spec.clone());
        self.patterns.entry(spec.category).or_default().push(spec);
    }

    /// Patterns registered for a category.
    #[must_use]
    pub fn patterns_for(&self, category: Category) -> &[PatternSpec] {
        self.patterns.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Cloned specs for a set of categories, in category order.
    #[must_use]
    pub fn specs_for(&self, categories: &[Category]) -> Vec<PatternSpec> {
        categories
            .iter()
            .flat_map(|c| self.patterns_for(*c).iter().cloned())
            .collect()
    }

    /// Look up the spec owning a cache key.
    #[must_use]
    pub fn spec_for_key(&self, key: &str) -> Option<&PatternSpec> {
        self.by_key.get(key)
    }

    /// The domain-term whitelist.
    #[must_use]
    pub fn whitelist(&self) -> &DomainWhitelist {
        &self.whitelist
    }

    /// Add terms to the domain whitelist.
    pub fn extend_whitelist<I, S>(&mut self, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.whitelist.extend(terms);
    }

    /// Case/whitespace-normalized whitelist membership check.
    #[must_use]
    pub fn is_domain_term(&self, text: &str) -> bool {
        self.whitelist.contains(text)
    }

    /// The shared pattern cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<PatternCache> {
        &self.cache
    }

    /// Detect PII in `text` (single-pass path).
    ///
    /// `categories` of `None` enables every category. Matches below the
    /// sensitivity threshold are dropped, whitelisted domain terms are
    /// dropped when `preserve_domain_terms` is set, and overlapping matches
    /// within a category collapse to the highest-confidence span.
    #[must_use]
    pub fn detect(
        &self,
        text: &str,
        categories: Option<&[Category]>,
        sensitivity: Sensitivity,
        preserve_domain_terms: bool,
    ) -> DetectionResult {
        let started = Instant::now();
        let enabled = categories.unwrap_or(&Category::ALL);

        let mut detections = Vec::new();
        let mut patterns_run = 0;

        for &category in enabled {
            let mut category_matches = Vec::new();
            for spec in self.patterns_for(category) {
                let regex = match self.cache.get(spec) {
                    Ok(regex) => regex,
                    Err(err) => {
                        // One bad pattern must not take the category down.
                        warn!(category = ?category, error = %err, "pattern skipped");
                        continue;
                    }
                };
                patterns_run += 1;

                for m in regex.find_iter(text) {
                    if m.as_str().is_empty() {
                        continue;
                    }
                    if let Some(detection) =
                        self.build_detection(text, spec, m.start(), m.end(), sensitivity)
                        && !(preserve_domain_terms && self.whitelist.contains(&detection.text))
                    {
                        category_matches.push(detection);
                    }
                }
            }
            merge_category_matches(text, &mut category_matches);
            detections.extend(category_matches);
        }

        detections.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

        let mut categories_found: Vec<Category> =
            detections.iter().map(|d| d.category).collect();
        categories_found.sort_unstable();
        categories_found.dedup();

        DetectionResult {
            text_len: text.len(),
            detections,
            categories: categories_found,
            sensitivity,
            preserve_domain_terms,
            metadata: DetectionMetadata {
                elapsed_ms: started.elapsed().as_millis() as u64,
                patterns_run,
                streaming: false,
            },
        }
    }

    /// Map raw streaming matches back to categorized detections.
    ///
    /// Matches whose pattern is unknown to the library are dropped with a
    /// warning; the rest go through the same scoring, whitelist filtering
    /// and per-category merge as the single-pass path.
    #[must_use]
    pub fn detections_from_stream(
        &self,
        text: &str,
        matches: &[StreamMatch],
        sensitivity: Sensitivity,
        preserve_domain_terms: bool,
    ) -> Vec<Detection> {
        let mut by_category: HashMap<Category, Vec<Detection>> = HashMap::new();

        for m in matches {
            let Some(spec) = self.spec_for_key(&m.pattern) else {
                warn!(pattern = %m.pattern, "streaming match for unknown pattern dropped");
                continue;
            };
            if let Some(detection) = self.build_detection(text, spec, m.start, m.end, sensitivity)
                && !(preserve_domain_terms && self.whitelist.contains(&detection.text))
            {
                by_category.entry(spec.category).or_default().push(detection);
            }
        }

        let mut detections = Vec::new();
        for category in Category::ALL {
            if let Some(mut category_matches) = by_category.remove(&category) {
                merge_category_matches(text, &mut category_matches);
                detections.extend(category_matches);
            }
        }
        detections.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
        detections
    }

    /// Score one raw match and build a [`Detection`], or `None` when it
    /// falls below the sensitivity threshold.
    fn build_detection(
        &self,
        text: &str,
        spec: &PatternSpec,
        start: usize,
        end: usize,
        sensitivity: Sensitivity,
    ) -> Option<Detection> {
        let matched = &text[start..end];
        let mut metadata = HashMap::new();

        let position = position_weight(text, start);
        let mut confidence =
            position * spec.confidence * spec.category.base_confidence() * sensitivity.factor();

        // Format validators refine high-risk categories.
        match spec.category {
            Category::CreditCard => {
                if luhn_check(matched) {
                    confidence = confidence.max(0.9);
                    metadata.insert("luhn".to_string(), "valid".to_string());
                } else {
                    confidence *= 0.45;
                    metadata.insert("luhn".to_string(), "failed".to_string());
                }
            }
            Category::Ssn => {
                if !ssn_range_valid(matched) {
                    confidence *= 0.5;
                    metadata.insert("ssn_range".to_string(), "invalid".to_string());
                }
            }
            _ => {}
        }

        let confidence = confidence.clamp(0.0, 1.0);
        if confidence < sensitivity.threshold() {
            return None;
        }

        Some(Detection {
            category: spec.category,
            text: matched.to_string(),
            start,
            end,
            pattern: spec.cache_key(),
            confidence,
            severity: Severity::from_confidence(spec.category, confidence),
            metadata,
        })
    }
}

impl std::fmt::Debug for PatternLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternLibrary")
            .field("pattern_count", &self.by_key.len())
            .field("whitelist_terms", &self.whitelist.len())
            .finish()
    }
}

/// Weight for where a match sits in its surroundings: matches that begin at
/// a token boundary are trusted more than matches starting mid-token.
fn position_weight(text: &str, start: usize) -> f32 {
    if start == 0 {
        return 1.0;
    }
    let preceded_by_word = text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric());
    if preceded_by_word {
        INTERIOR_POSITION_WEIGHT
    } else {
        1.0
    }
}

/// Collapse strictly-overlapping matches within one category, keeping the
/// highest confidence and expanding the span to cover both.
fn merge_category_matches(text: &str, matches: &mut Vec<Detection>) {
    if matches.len() < 2 {
        return;
    }
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut merged: Vec<Detection> = Vec::with_capacity(matches.len());
    for detection in matches.drain(..) {
        match merged.last_mut() {
            Some(last) if detection.start < last.end => {
                last.end = last.end.max(detection.end);
                last.start = last.start.min(detection.start);
                last.confidence = last.confidence.max(detection.confidence);
                last.text = text[last.start..last.end].to_string();
                last.severity = Severity::from_confidence(last.category, last.confidence);
                last.metadata
                    .insert("merged".to_string(), "true".to_string());
            }
            _ => merged.push(detection),
        }
    }
    *matches = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn library() -> PatternLibrary {
        PatternLibrary::new(Arc::new(PatternCache::new(CacheConfig::default())))
    }

    #[test]
    fn detects_email() {
        let lib = library();
        let result = lib.detect(
            "Contact me at jane@corp.com",
            None,
            Sensitivity::Medium,
            false,
        );
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].category, Category::Email);
        assert_eq!(result.detections[0].text, "jane@corp.com");
        assert_eq!(result.categories, vec![Category::Email]);
    }

    #[test]
    fn detects_ssn_with_critical_severity() {
        let lib = library();
        let result = lib.detect("SSN: 123-45-6789", None, Sensitivity::Medium, false);
        let ssn = result
            .by_category(Category::Ssn)
            .next()
            .expect("ssn detected");
        assert!(ssn.confidence > 0.8);
        assert_eq!(ssn.severity, Severity::Critical);
    }

    #[test]
    fn luhn_failure_lowers_credit_card_confidence() {
        let lib = library();
        let valid = lib.detect("4111-1111-1111-1111", None, Sensitivity::Strict, false);
        let invalid = lib.detect("1234-5678-9012-3456", None, Sensitivity::Strict, false);

        let valid_conf = valid
            .by_category(Category::CreditCard)
            .next()
            .map(|d| d.confidence)
            .expect("valid card detected");
        assert!(valid_conf >= 0.9);

        // The Luhn-failing number still matches the pattern but at a
        // fraction of the confidence.
        if let Some(d) = invalid.by_category(Category::CreditCard).next() {
            assert!(d.confidence < valid_conf);
            assert_eq!(d.metadata.get("luhn").map(String::as_str), Some("failed"));
        }
    }

    #[test]
    fn sensitivity_gates_low_confidence_matches() {
        let lib = library();
        // A bare date only reaches ~0.42 confidence; medium drops it,
        // strict keeps it.
        let text = "met on 12/04/1987 at the office";
        let medium = lib.detect(text, None, Sensitivity::Medium, false);
        let strict = lib.detect(text, None, Sensitivity::Strict, false);
        assert!(medium.by_category(Category::DateOfBirth).next().is_none());
        assert!(strict.by_category(Category::DateOfBirth).next().is_some());
    }

    #[test]
    fn whitelist_preserves_domain_terms() {
        let lib = library();
        let text = "Write to support@example.com or jane@corp.com";
        let preserved = lib.detect(text, None, Sensitivity::Medium, true);
        let not_preserved = lib.detect(text, None, Sensitivity::Medium, false);

        assert_eq!(preserved.by_category(Category::Email).count(), 1);
        assert_eq!(not_preserved.by_category(Category::Email).count(), 2);
    }

    #[test]
    fn category_filter_restricts_detection() {
        let lib = library();
        let text = "jane@corp.com / 123-45-6789";
        let result = lib.detect(text, Some(&[Category::Email]), Sensitivity::Medium, false);
        assert_eq!(result.categories, vec![Category::Email]);
    }

    #[test]
    fn overlapping_matches_merge_within_category() {
        let lib = library();
        // Both SSN patterns (bare and contextual) hit this text.
        let result = lib.detect("ssn: 123-45-6789", None, Sensitivity::Medium, false);
        let ssns: Vec<_> = result.by_category(Category::Ssn).collect();
        assert_eq!(ssns.len(), 1);
        for pair in result.detections.windows(2) {
            if pair[0].category == pair[1].category {
                assert!(pair[0].end <= pair[1].start);
            }
        }
    }

    #[test]
    fn detections_are_sorted_and_in_bounds() {
        let lib = library();
        let text = "a@b.co then 555-123-4567 then MRN: 1234567";
        let result = lib.detect(text, None, Sensitivity::High, false);
        assert!(!result.is_empty());
        let mut prev = 0;
        for d in &result.detections {
            assert!(d.start >= prev || d.start == prev);
            assert!(d.start <= d.end && d.end <= text.len());
            assert!((0.0..=1.0).contains(&d.confidence));
            prev = d.start;
        }
    }

    #[test]
    fn custom_pattern_registration() {
        let mut lib = library();
        lib.register(
            PatternSpec::new(r"BADGE-\d{4}", Category::Custom, 0.9)
                .with_description("Badge number"),
        );
        let result = lib.detect("holder of BADGE-1234", None, Sensitivity::Medium, false);
        assert_eq!(result.by_category(Category::Custom).count(), 1);
    }

    #[test]
    fn domain_term_lookup() {
        let mut lib = library();
        assert!(lib.is_domain_term("USER@EXAMPLE.COM"));
        lib.extend_whitelist(["widget-id"]);
        assert!(lib.is_domain_term("Widget-ID"));
    }
}
