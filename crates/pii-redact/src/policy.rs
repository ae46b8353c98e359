//! Policy-driven redaction.
//!
//! A [`RedactionPolicy`] decides which detections are eligible and which
//! strategy transforms each category; the [`PolicyEngine`] gates and
//! splices. Splicing runs right to left over an immutable snapshot of the
//! original text so earlier offsets stay valid; a span invalidated by a
//! prior splice is skipped with a warning, never a failure.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::detect::patterns::DomainWhitelist;
use crate::types::{Category, Detection, Sensitivity, Severity};

/// Default number of leading characters preserved by partial masking.
pub const DEFAULT_PRESERVE_START: usize = 2;

/// Default number of trailing characters preserved by partial masking.
pub const DEFAULT_PRESERVE_END: usize = 2;

/// Default mask character.
pub const DEFAULT_MASK_CHAR: char = '*';

/// How a detected span is transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionStrategy {
    /// Replace with the category's placeholder token.
    Replace,
    /// Mask every character.
    Mask,
    /// Replace with a short deterministic fingerprint.
    Hash,
    /// Preserve the ends, mask the middle.
    Partial,
    /// Replace with a length-revealing token.
    Tokenize,
    /// Alternate or probabilistically mask characters.
    Fuzzy,
    /// Remove the span entirely.
    Remove,
}

/// Per-category redaction rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Strategy applied to this category.
    pub strategy: RedactionStrategy,
    /// Minimum confidence a detection needs to be redacted.
    pub confidence_threshold: f32,
    /// Minimum severity a detection needs to be redacted.
    pub minimum_severity: Severity,
}

impl CategoryRule {
    /// Create a rule.
    #[must_use]
    pub const fn new(
        strategy: RedactionStrategy,
        confidence_threshold: f32,
        minimum_severity: Severity,
    ) -> Self {
        Self {
            strategy,
            confidence_threshold,
            minimum_severity,
        }
    }
}

/// Per-category redaction policy.
///
/// May be swapped per call; individual rules may be replaced at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionPolicy {
    /// Rules per category.
    pub rules: HashMap<Category, CategoryRule>,
    /// Categories this policy redacts.
    pub enabled_categories: Vec<Category>,
    /// Extra whitelist terms beyond the curated set.
    pub whitelist_terms: Vec<String>,
    /// Preserve whitelisted domain terms.
    pub preserve_domain_terms: bool,
    /// Sensitivity detection runs at under this policy.
    pub sensitivity: Sensitivity,
}

impl Default for RedactionPolicy {
    /// The default policy: strong strategies at high thresholds for
    /// high-risk categories, partial masking for medium-risk ones,
    /// placeholder replacement with domain-term preservation elsewhere.
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            Category::Ssn,
            CategoryRule::new(RedactionStrategy::Hash, 0.8, Severity::High),
        );
        rules.insert(
            Category::CreditCard,
            CategoryRule::new(RedactionStrategy::Hash, 0.8, Severity::High),
        );
        rules.insert(
            Category::Financial,
            CategoryRule::new(RedactionStrategy::Replace, 0.8, Severity::High),
        );
        rules.insert(
            Category::Medical,
            CategoryRule::new(RedactionStrategy::Replace, 0.8, Severity::High),
        );
        rules.insert(
            Category::Phone,
            CategoryRule::new(RedactionStrategy::Partial, 0.6, Severity::Medium),
        );
        rules.insert(
            Category::Address,
            CategoryRule::new(RedactionStrategy::Partial, 0.6, Severity::Low),
        );
        rules.insert(
            Category::DateOfBirth,
            CategoryRule::new(RedactionStrategy::Partial, 0.6, Severity::Medium),
        );
        rules.insert(
            Category::Email,
            CategoryRule::new(RedactionStrategy::Replace, 0.6, Severity::Medium),
        );
        rules.insert(
            Category::Id,
            CategoryRule::new(RedactionStrategy::Replace, 0.5, Severity::Low),
        );
        rules.insert(
            Category::Custom,
            CategoryRule::new(RedactionStrategy::Replace, 0.5, Severity::Low),
        );
        rules.insert(
            Category::DomainSpecific,
            CategoryRule::new(RedactionStrategy::Replace, 0.5, Severity::Low),
        );

        Self {
            rules,
            enabled_categories: Category::ALL.to_vec(),
            whitelist_terms: Vec::new(),
            preserve_domain_terms: true,
            sensitivity: Sensitivity::Medium,
        }
    }
}

impl RedactionPolicy {
    /// Create the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The rule for a category, if configured.
    #[must_use]
    pub fn rule_for(&self, category: Category) -> Option<&CategoryRule> {
        self.rules.get(&category)
    }

    /// Replace the rule for one category.
    #[must_use]
    pub fn with_rule(mut self, category: Category, rule: CategoryRule) -> Self {
        self.rules.insert(category, rule);
        self
    }

    /// Apply one strategy to every configured category.
    #[must_use]
    pub fn with_strategy_for_all(mut self, strategy: RedactionStrategy) -> Self {
        for rule in self.rules.values_mut() {
            rule.strategy = strategy;
        }
        self
    }

    /// Restrict the enabled categories.
    #[must_use]
    pub fn with_enabled_categories(mut self, categories: Vec<Category>) -> Self {
        self.enabled_categories = categories;
        self
    }

    /// Set domain-term preservation.
    #[must_use]
    pub fn with_preserve_domain_terms(mut self, preserve: bool) -> Self {
        self.preserve_domain_terms = preserve;
        self
    }

    /// Set the sensitivity.
    #[must_use]
    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Add whitelist terms.
    #[must_use]
    pub fn with_whitelist_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist_terms.extend(terms.into_iter().map(Into::into));
        self
    }

    /// Whether a category is enabled under this policy.
    #[must_use]
    pub fn is_enabled(&self, category: Category) -> bool {
        self.enabled_categories.contains(&category)
    }
}

/// Per-call redaction overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionContext {
    /// Replacement text override for the replace strategy.
    pub replacement: Option<String>,
    /// Mask character.
    pub mask_char: char,
    /// Leading characters preserved by partial masking.
    pub preserve_start: usize,
    /// Trailing characters preserved by partial masking.
    pub preserve_end: usize,
    /// Probability a character is masked by the fuzzy strategy; zero means
    /// deterministic alternation.
    pub fuzziness: f32,
    /// Strategy override applied to every category.
    pub strategy_override: Option<RedactionStrategy>,
    /// Free-form metadata carried into the result.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Default for RedactionContext {
    fn default() -> Self {
        Self {
            replacement: None,
            mask_char: DEFAULT_MASK_CHAR,
            preserve_start: DEFAULT_PRESERVE_START,
            preserve_end: DEFAULT_PRESERVE_END,
            fuzziness: 0.0,
            strategy_override: None,
            metadata: HashMap::new(),
        }
    }
}

impl RedactionContext {
    /// Create a default context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the strategy for every category.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: RedactionStrategy) -> Self {
        self.strategy_override = Some(strategy);
        self
    }

    /// Set the replacement text.
    #[must_use]
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    /// Set the mask character.
    #[must_use]
    pub const fn with_mask_char(mut self, mask_char: char) -> Self {
        self.mask_char = mask_char;
        self
    }

    /// Set the preserved leading/trailing character counts.
    #[must_use]
    pub const fn with_preserve(mut self, start: usize, end: usize) -> Self {
        self.preserve_start = start;
        self.preserve_end = end;
        self
    }

    /// Set the fuzziness level.
    #[must_use]
    pub const fn with_fuzziness(mut self, fuzziness: f32) -> Self {
        self.fuzziness = fuzziness;
        self
    }
}

/// One applied redaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redaction {
    /// The originating detection.
    pub detection: Detection,
    /// The text the span was replaced with.
    pub redacted: String,
    /// The strategy that produced it.
    pub strategy: RedactionStrategy,
    /// The rule that gated it.
    pub rule: CategoryRule,
}

/// Derived statistics for a redaction pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionStats {
    /// Character-count change from original to redacted text.
    pub char_delta: i64,
    /// Redactions per category.
    pub by_category: HashMap<Category, usize>,
    /// Redactions per strategy.
    pub by_strategy: HashMap<RedactionStrategy, usize>,
}

/// Aggregate result of a redaction pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionResult {
    /// The original text.
    pub original: String,
    /// The redacted text.
    pub redacted: String,
    /// Every applied redaction, in ascending span order.
    pub redactions: Vec<Redaction>,
    /// The per-call context used.
    pub context: RedactionContext,
    /// Derived statistics.
    pub stats: RedactionStats,
}

impl RedactionResult {
    /// Whether any redaction was applied.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        !self.redactions.is_empty()
    }
}

/// Validation report for a policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyReport {
    /// Whether the policy is usable.
    pub is_valid: bool,
    /// Problems that make the policy unusable.
    pub errors: Vec<String>,
    /// Problems worth fixing.
    pub warnings: Vec<String>,
}

/// Gates detections against a policy and splices redactions.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    whitelist: DomainWhitelist,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(DomainWhitelist::new())
    }
}

impl PolicyEngine {
    /// Create an engine with the given base whitelist.
    #[must_use]
    pub fn new(whitelist: DomainWhitelist) -> Self {
        Self { whitelist }
    }

    /// Decide whether a detection is redacted under a policy.
    #[must_use]
    pub fn should_redact(
        &self,
        detection: &Detection,
        policy: &RedactionPolicy,
        whitelist: &DomainWhitelist,
    ) -> bool {
        if !policy.is_enabled(detection.category) {
            return false;
        }
        let Some(rule) = policy.rule_for(detection.category) else {
            warn!(category = ?detection.category, "no rule for category; detection left as-is");
            return false;
        };
        if detection.confidence < rule.confidence_threshold {
            return false;
        }
        if detection.severity.priority() < rule.minimum_severity.priority() {
            return false;
        }
        if policy.preserve_domain_terms && whitelist.contains(&detection.text) {
            return false;
        }
        true
    }

    /// Apply eligible redactions to the text.
    ///
    /// Eligible detections are spliced in descending start order so earlier
    /// offsets stay valid. A span that no longer matches the working copy
    /// is skipped with a warning.
    #[must_use]
    pub fn apply(
        &self,
        text: &str,
        detections: &[Detection],
        policy: &RedactionPolicy,
        context: &RedactionContext,
    ) -> RedactionResult {
        let whitelist = self.effective_whitelist(policy);

        let mut eligible: Vec<&Detection> = detections
            .iter()
            .filter(|d| self.should_redact(d, policy, &whitelist))
            .collect();
        eligible.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

        let mut working = text.to_string();
        let mut redactions = Vec::new();

        for detection in eligible {
            if let Some(err) = stale_span(&working, detection) {
                warn!(
                    category = ?detection.category,
                    error = %err,
                    "stale detection span skipped during splice"
                );
                continue;
            }

            // Rule presence was part of eligibility.
            let Some(rule) = policy.rule_for(detection.category) else {
                continue;
            };
            let strategy = context.strategy_override.unwrap_or(rule.strategy);
            let redacted = transform(detection, strategy, context);
            working.replace_range(detection.start..detection.end, &redacted);
            redactions.push(Redaction {
                detection: detection.clone(),
                redacted,
                strategy,
                rule: *rule,
            });
        }

        // Splicing ran right to left; report the audit trail in text order.
        redactions.reverse();

        let stats = derive_stats(text, &working, &redactions);
        RedactionResult {
            original: text.to_string(),
            redacted: working,
            redactions,
            context: context.clone(),
            stats,
        }
    }

    /// Validate a policy.
    #[must_use]
    pub fn validate(&self, policy: &RedactionPolicy) -> PolicyReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for &category in &policy.enabled_categories {
            match policy.rule_for(category) {
                None => errors.push(format!("enabled category {category:?} has no rule")),
                Some(rule) => {
                    if !(0.0..=1.0).contains(&rule.confidence_threshold) {
                        errors.push(format!(
                            "rule for {category:?} has confidence threshold {} outside [0, 1]",
                            rule.confidence_threshold
                        ));
                    }
                }
            }
        }

        if policy.enabled_categories.is_empty() {
            warnings.push("no categories are enabled".to_string());
        }

        // Over-concentration on one strategy makes output monotone and is
        // usually an authoring mistake.
        let total = policy.rules.len();
        if total >= 4 {
            let mut counts: HashMap<RedactionStrategy, usize> = HashMap::new();
            for rule in policy.rules.values() {
                *counts.entry(rule.strategy).or_default() += 1;
            }
            for (strategy, count) in counts {
                if count * 100 >= total * 90 {
                    warnings.push(format!(
                        "strategy {strategy:?} is used by {count} of {total} rules"
                    ));
                }
            }
        }

        if !policy.preserve_domain_terms && policy.whitelist_terms.is_empty() {
            warnings.push(
                "domain-term preservation is off and the policy adds no whitelist terms"
                    .to_string(),
            );
        }

        PolicyReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// The base whitelist extended with the policy's own terms.
    fn effective_whitelist(&self, policy: &RedactionPolicy) -> DomainWhitelist {
        if policy.whitelist_terms.is_empty() {
            return self.whitelist.clone();
        }
        let mut whitelist = self.whitelist.clone();
        whitelist.extend(policy.whitelist_terms.iter().map(String::as_str));
        whitelist
    }
}

/// Check a detection span against the current working copy.
///
/// Returns the out-of-bounds error to log when the span no longer fits or
/// no longer holds the detected text.
fn stale_span(working: &str, detection: &Detection) -> Option<crate::error::RedactError> {
    let out_of_bounds = detection.end > working.len()
        || !working.is_char_boundary(detection.start)
        || !working.is_char_boundary(detection.end);
    if out_of_bounds || working[detection.start..detection.end] != detection.text {
        return Some(crate::error::RedactError::OutOfBounds {
            start: detection.start,
            end: detection.end,
            len: working.len(),
        });
    }
    None
}

/// Apply one strategy to a detection's text.
fn transform(detection: &Detection, strategy: RedactionStrategy, context: &RedactionContext) -> String {
    let text = detection.text.as_str();
    match strategy {
        RedactionStrategy::Replace => context
            .replacement
            .clone()
            .unwrap_or_else(|| detection.category.placeholder().to_string()),
        RedactionStrategy::Mask => context
            .mask_char
            .to_string()
            .repeat(text.chars().count()),
        RedactionStrategy::Hash => {
            let digest = blake3::hash(text.as_bytes());
            format!("[HASH:{}]", &digest.to_hex()[..8])
        }
        RedactionStrategy::Partial => partial_mask(
            text,
            context.mask_char,
            context.preserve_start,
            context.preserve_end,
        ),
        RedactionStrategy::Tokenize => format!("[TOKEN_{}CHARS]", text.chars().count()),
        RedactionStrategy::Fuzzy => fuzzy_mask(text, context.mask_char, context.fuzziness),
        RedactionStrategy::Remove => String::new(),
    }
}

/// Preserve the ends and mask the middle; full mask when the text is too
/// short to preserve both ends.
fn partial_mask(text: &str, mask_char: char, preserve_start: usize, preserve_end: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= preserve_start + preserve_end {
        return mask_char.to_string().repeat(chars.len());
    }

    let hidden = chars.len() - preserve_start - preserve_end;
    format!(
        "{}{}{}",
        chars[..preserve_start].iter().collect::<String>(),
        mask_char.to_string().repeat(hidden),
        chars[chars.len() - preserve_end..].iter().collect::<String>()
    )
}

/// Alternate preserved and masked characters, or mask each character with
/// probability `fuzziness` when it is non-zero.
fn fuzzy_mask(text: &str, mask_char: char, fuzziness: f32) -> String {
    if fuzziness > 0.0 {
        let mut rng = rand::rng();
        text.chars()
            .map(|c| {
                if rng.random::<f32>() < fuzziness {
                    mask_char
                } else {
                    c
                }
            })
            .collect()
    } else {
        text.chars()
            .enumerate()
            .map(|(i, c)| if i % 2 == 0 { c } else { mask_char })
            .collect()
    }
}

fn derive_stats(original: &str, redacted: &str, redactions: &[Redaction]) -> RedactionStats {
    let mut by_category: HashMap<Category, usize> = HashMap::new();
    let mut by_strategy: HashMap<RedactionStrategy, usize> = HashMap::new();
    for redaction in redactions {
        *by_category.entry(redaction.detection.category).or_default() += 1;
        *by_strategy.entry(redaction.strategy).or_default() += 1;
    }
    RedactionStats {
        char_delta: redacted.chars().count() as i64 - original.chars().count() as i64,
        by_category,
        by_strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn detection(
        category: Category,
        text: &str,
        start: usize,
        confidence: f32,
    ) -> Detection {
        Detection {
            category,
            text: text.to_string(),
            start,
            end: start + text.len(),
            pattern: "test".to_string(),
            confidence,
            severity: Severity::from_confidence(category, confidence),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn gating_respects_confidence_threshold() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default();
        let whitelist = DomainWhitelist::new();

        let weak = detection(Category::Email, "a@b.co", 0, 0.3);
        let strong = detection(Category::Email, "a@b.co", 0, 0.9);

        assert!(!engine.should_redact(&weak, &policy, &whitelist));
        assert!(engine.should_redact(&strong, &policy, &whitelist));
    }

    #[test]
    fn gating_respects_minimum_severity() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default()
            .with_rule(
                Category::Email,
                CategoryRule::new(RedactionStrategy::Replace, 0.1, Severity::Critical),
            );
        let whitelist = DomainWhitelist::new();

        // High severity but not critical: email is not high-risk.
        let d = detection(Category::Email, "a@b.co", 0, 0.9);
        assert!(!engine.should_redact(&d, &policy, &whitelist));
    }

    #[test]
    fn gating_preserves_whitelisted_terms() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default();
        let whitelist = DomainWhitelist::new();

        let d = detection(Category::Email, "user@example.com", 0, 0.95);
        assert!(!engine.should_redact(&d, &policy, &whitelist));

        let off = policy.with_preserve_domain_terms(false);
        assert!(engine.should_redact(&d, &off, &whitelist));
    }

    #[test]
    fn gating_skips_disabled_categories() {
        let engine = PolicyEngine::default();
        let policy =
            RedactionPolicy::default().with_enabled_categories(vec![Category::Ssn]);
        let whitelist = DomainWhitelist::new();

        let d = detection(Category::Email, "a@b.co", 0, 0.95);
        assert!(!engine.should_redact(&d, &policy, &whitelist));
    }

    #[test]
    fn apply_replaces_right_to_left() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default().with_strategy_for_all(RedactionStrategy::Replace);
        let text = "mail a@b.co and c@d.org today";
        let detections = vec![
            detection(Category::Email, "a@b.co", 5, 0.9),
            detection(Category::Email, "c@d.org", 16, 0.9),
        ];

        let result = engine.apply(text, &detections, &policy, &RedactionContext::new());
        assert_eq!(result.redacted, "mail [EMAIL] and [EMAIL] today");
        assert_eq!(result.redactions.len(), 2);
        // Audit trail comes back in text order.
        assert!(result.redactions[0].detection.start < result.redactions[1].detection.start);
    }

    #[test]
    fn stale_span_skipped_not_fatal() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default().with_strategy_for_all(RedactionStrategy::Replace);
        let text = "short";
        // Span points beyond the text.
        let stale = detection(Category::Email, "a@b.co", 40, 0.9);

        let result = engine.apply(text, &[stale], &policy, &RedactionContext::new());
        assert_eq!(result.redacted, "short");
        assert!(result.redactions.is_empty());
    }

    #[test]
    fn mismatched_span_content_skipped() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default().with_strategy_for_all(RedactionStrategy::Replace);
        let text = "mail x@y.zz today";
        let mut d = detection(Category::Email, "a@b.co", 5, 0.9);
        d.end = 11;

        let result = engine.apply(text, &[d], &policy, &RedactionContext::new());
        assert!(result.redactions.is_empty());
    }

    #[test]
    fn mask_strategy() {
        let d = detection(Category::Phone, "555-123-4567", 0, 0.9);
        let out = transform(&d, RedactionStrategy::Mask, &RedactionContext::new());
        assert_eq!(out, "************");
    }

    #[test]
    fn hash_strategy_is_deterministic_and_short() {
        let d = detection(Category::Ssn, "123-45-6789", 0, 0.9);
        let a = transform(&d, RedactionStrategy::Hash, &RedactionContext::new());
        let b = transform(&d, RedactionStrategy::Hash, &RedactionContext::new());
        assert_eq!(a, b);
        assert!(a.starts_with("[HASH:"));
        assert_eq!(a.len(), "[HASH:]".len() + 8);

        let other = detection(Category::Ssn, "987-65-4321", 0, 0.9);
        assert_ne!(a, transform(&other, RedactionStrategy::Hash, &RedactionContext::new()));
    }

    #[test]
    fn partial_strategy_preserves_ends() {
        let d = detection(Category::Phone, "555-123-4567", 0, 0.9);
        let out = transform(&d, RedactionStrategy::Partial, &RedactionContext::new());
        assert_eq!(out, "55********67");
    }

    #[test]
    fn partial_strategy_falls_back_to_full_mask() {
        let d = detection(Category::Phone, "555", 0, 0.9);
        let out = transform(&d, RedactionStrategy::Partial, &RedactionContext::new());
        assert_eq!(out, "***");
    }

    #[test]
    fn tokenize_strategy_reports_length() {
        let d = detection(Category::Email, "a@b.co", 0, 0.9);
        let out = transform(&d, RedactionStrategy::Tokenize, &RedactionContext::new());
        assert_eq!(out, "[TOKEN_6CHARS]");
    }

    #[test]
    fn fuzzy_strategy_alternates_without_fuzziness() {
        let d = detection(Category::Email, "abcdef", 0, 0.9);
        let out = transform(&d, RedactionStrategy::Fuzzy, &RedactionContext::new());
        assert_eq!(out, "a*c*e*");
    }

    #[test]
    fn fuzzy_strategy_full_fuzziness_masks_everything() {
        let d = detection(Category::Email, "abcdef", 0, 0.9);
        let ctx = RedactionContext::new().with_fuzziness(1.0);
        let out = transform(&d, RedactionStrategy::Fuzzy, &ctx);
        assert_eq!(out, "******");
    }

    #[test]
    fn remove_strategy_deletes_span() {
        let d = detection(Category::Email, "a@b.co", 0, 0.9);
        let out = transform(&d, RedactionStrategy::Remove, &RedactionContext::new());
        assert!(out.is_empty());
    }

    #[test]
    fn context_strategy_override_wins() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default();
        let text = "mail a@b.co now";
        let detections = vec![detection(Category::Email, "a@b.co", 5, 0.9)];
        let ctx = RedactionContext::new().with_strategy(RedactionStrategy::Tokenize);

        let result = engine.apply(text, &detections, &policy, &ctx);
        assert_eq!(result.redacted, "mail [TOKEN_6CHARS] now");
        assert_eq!(result.redactions[0].strategy, RedactionStrategy::Tokenize);
    }

    #[test]
    fn stats_breakdowns() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default().with_strategy_for_all(RedactionStrategy::Remove);
        let text = "a@b.co and c@d.org";
        let detections = vec![
            detection(Category::Email, "a@b.co", 0, 0.9),
            detection(Category::Email, "c@d.org", 11, 0.9),
        ];

        let result = engine.apply(text, &detections, &policy, &RedactionContext::new());
        assert_eq!(result.stats.by_category.get(&Category::Email), Some(&2));
        assert_eq!(
            result.stats.by_strategy.get(&RedactionStrategy::Remove),
            Some(&2)
        );
        assert!(result.stats.char_delta < 0);
    }

    #[test]
    fn validate_flags_missing_rule() {
        let engine = PolicyEngine::default();
        let mut policy = RedactionPolicy::default();
        policy.rules.remove(&Category::Email);

        let report = engine.validate(&policy);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("Email")));
    }

    #[test]
    fn validate_warns_on_strategy_concentration() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default().with_strategy_for_all(RedactionStrategy::Mask);

        let report = engine.validate(&policy);
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("Mask")));
    }

    #[test]
    fn validate_warns_on_missing_preservation() {
        let engine = PolicyEngine::default();
        let policy = RedactionPolicy::default().with_preserve_domain_terms(false);

        let report = engine.validate(&policy);
        assert!(report.warnings.iter().any(|w| w.contains("preservation")));
    }

    #[test]
    fn policy_round_trips_json() {
        let policy = RedactionPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        let back: RedactionPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, back);
    }
}
