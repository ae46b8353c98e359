//! Core types for pii-redact.
//!
//! This module defines the data model shared across the engine: PII
//! categories, detection results, sensitivity levels, and the audit
//! context threaded through from the embedding tool layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A category of personally identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// Social Security Number.
    Ssn,
    /// Credit card number.
    CreditCard,
    /// Street address.
    Address,
    /// Date of birth.
    DateOfBirth,
    /// Generic identifier (employee id, account id).
    Id,
    /// Financial identifier (IBAN, routing number, account number).
    Financial,
    /// Medical identifier (MRN, NPI).
    Medical,
    /// User-registered custom pattern.
    Custom,
    /// Domain-specific term that superficially resembles PII.
    DomainSpecific,
}

impl Category {
    /// All categories, in detection order.
    pub const ALL: [Self; 11] = [
        Self::Email,
        Self::Phone,
        Self::Ssn,
        Self::CreditCard,
        Self::Address,
        Self::DateOfBirth,
        Self::Id,
        Self::Financial,
        Self::Medical,
        Self::Custom,
        Self::DomainSpecific,
    ];

    /// Relative priority of this category (higher = more sensitive).
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Ssn | Self::CreditCard => 10,
            Self::Financial | Self::Medical => 9,
            Self::Email => 7,
            Self::Phone | Self::DateOfBirth => 6,
            Self::Address | Self::Id => 5,
            Self::Custom => 4,
            Self::DomainSpecific => 3,
        }
    }

    /// Get the default replacement token for this category.
    #[must_use]
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::Email => "[EMAIL]",
            Self::Phone => "[PHONE]",
            Self::Ssn => "[SSN]",
            Self::CreditCard => "[CREDIT_CARD]",
            Self::Address => "[ADDRESS]",
            Self::DateOfBirth => "[DOB]",
            Self::Id => "[ID]",
            Self::Financial => "[FINANCIAL]",
            Self::Medical => "[MEDICAL]",
            Self::Custom => "[CUSTOM]",
            Self::DomainSpecific => "[DOMAIN]",
        }
    }

    /// Get a human-readable description of this category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Email => "Email address",
            Self::Phone => "Phone number",
            Self::Ssn => "Social Security Number",
            Self::CreditCard => "Credit card number",
            Self::Address => "Street address",
            Self::DateOfBirth => "Date of birth",
            Self::Id => "Generic identifier",
            Self::Financial => "Financial identifier",
            Self::Medical => "Medical identifier",
            Self::Custom => "Custom pattern",
            Self::DomainSpecific => "Domain-specific term",
        }
    }

    /// Whether exposure of this category carries elevated risk.
    ///
    /// High-risk categories escalate to [`Severity::Critical`] at high
    /// confidence and default to the strongest redaction strategies.
    #[must_use]
    pub const fn is_high_risk(&self) -> bool {
        matches!(
            self,
            Self::Ssn | Self::CreditCard | Self::Financial | Self::Medical
        )
    }

    /// Base confidence weight applied to every match in this category.
    #[must_use]
    pub const fn base_confidence(&self) -> f32 {
        match self {
            Self::Email | Self::Ssn | Self::CreditCard => 0.95,
            Self::Financial | Self::Medical => 0.9,
            Self::Phone | Self::DateOfBirth => 0.85,
            Self::Address | Self::Id | Self::Custom => 0.8,
            Self::DomainSpecific => 0.7,
        }
    }
}

/// Severity of a detection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Low risk.
    #[default]
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
    /// Critical risk.
    Critical,
}

impl Severity {
    /// Numeric priority of this severity (higher = more severe).
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// Map a category and confidence to a severity.
    ///
    /// High-risk categories at confidence above 0.8 are critical; otherwise
    /// confidence alone decides.
    #[must_use]
    pub fn from_confidence(category: Category, confidence: f32) -> Self {
        if category.is_high_risk() && confidence > 0.8 {
            Self::Critical
        } else if confidence > 0.8 {
            Self::High
        } else if confidence > 0.6 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Detection sensitivity level.
///
/// Higher sensitivity catches more: it lowers the confidence threshold a
/// candidate match must clear and mildly boosts computed confidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// Only keep high-confidence matches.
    Low,
    /// Balanced detection.
    #[default]
    Medium,
    /// Catch more, at the cost of false positives.
    High,
    /// Catch nearly everything the patterns can match.
    Strict,
}

impl Sensitivity {
    /// Minimum confidence a match must reach to be kept.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        match self {
            Self::Low => 0.75,
            Self::Medium => 0.5,
            Self::High => 0.35,
            Self::Strict => 0.2,
        }
    }

    /// Multiplier applied to computed confidence (result clamped to 1.0).
    #[must_use]
    pub const fn factor(&self) -> f32 {
        match self {
            Self::Low => 0.9,
            Self::Medium => 1.0,
            Self::High => 1.1,
            Self::Strict => 1.2,
        }
    }
}

/// Options controlling how a pattern is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Match case-insensitively.
    pub case_insensitive: bool,
    /// `^` and `$` match line boundaries.
    pub multi_line: bool,
}

impl MatchOptions {
    /// Case-insensitive matching.
    #[must_use]
    pub const fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
            multi_line: false,
        }
    }

    /// Render the inline flag prefix for these options.
    ///
    /// The flagged source doubles as the cache key, so the same pattern with
    /// different options occupies distinct cache entries.
    #[must_use]
    pub fn flag_prefix(&self) -> &'static str {
        match (self.case_insensitive, self.multi_line) {
            (true, true) => "(?im)",
            (true, false) => "(?i)",
            (false, true) => "(?m)",
            (false, false) => "",
        }
    }
}

/// A detection rule: one pattern owned by a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    /// The regex pattern source.
    pub pattern: String,
    /// Compile options.
    pub options: MatchOptions,
    /// The category this pattern detects.
    pub category: Category,
    /// Base confidence for matches of this pattern (0.0 - 1.0).
    pub confidence: f32,
    /// Description of what this pattern detects.
    pub description: String,
}

impl PatternSpec {
    /// Create a new pattern spec.
    pub fn new(pattern: impl Into<String>, category: Category, confidence: f32) -> Self {
        Self {
            pattern: pattern.into(),
            options: MatchOptions::default(),
            category,
            confidence,
            description: String::new(),
        }
    }

    /// Set compile options.
    #[must_use]
    pub const fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The pattern source with inline flags applied.
    ///
    /// This is the key under which the compiled matcher is cached.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}{}", self.options.flag_prefix(), self.pattern)
    }
}

/// One detected PII match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Category of PII detected.
    pub category: Category,
    /// The matched text.
    pub text: String,
    /// Start byte offset in the original text.
    pub start: usize,
    /// End byte offset in the original text.
    pub end: usize,
    /// Source pattern that produced this match.
    pub pattern: String,
    /// Confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Severity of the detection.
    pub severity: Severity,
    /// Extra metadata (validator outcomes, merge notes).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Detection {
    /// Get the byte length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether this detection's span overlaps or touches another's.
    #[must_use]
    pub const fn overlaps_or_touches(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Timing and coverage metadata for a detection pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionMetadata {
    /// Wall-clock duration of the pass in milliseconds.
    pub elapsed_ms: u64,
    /// Number of patterns run.
    pub patterns_run: usize,
    /// Whether the chunked streaming path was used.
    pub streaming: bool,
}

/// Aggregate result of a detection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Byte length of the original text.
    pub text_len: usize,
    /// All detections, sorted by start offset.
    pub detections: Vec<Detection>,
    /// Distinct categories found, sorted.
    pub categories: Vec<Category>,
    /// Sensitivity the pass ran at.
    pub sensitivity: Sensitivity,
    /// Whether domain terms were preserved.
    pub preserve_domain_terms: bool,
    /// Timing and coverage metadata.
    pub metadata: DetectionMetadata,
}

impl DetectionResult {
    /// Check whether anything was detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Number of detections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Detections belonging to one category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Detection> {
        self.detections
            .iter()
            .filter(move |d| d.category == category)
    }
}

/// Opaque correlation identifiers threaded through from the tool layer.
///
/// The engine never interprets these; they only appear in structured logs
/// and result metadata so the embedding server can correlate audit trails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
    /// Request identifier.
    pub request_id: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// User identifier.
    pub user_id: Option<String>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl AuditContext {
    /// Create a context with a request id.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_accessors() {
        for category in Category::ALL {
            assert!(!category.placeholder().is_empty());
            assert!(!category.description().is_empty());
            assert!(category.priority() > 0);
            assert!(category.base_confidence() > 0.0 && category.base_confidence() <= 1.0);
        }
    }

    #[test]
    fn high_risk_categories() {
        assert!(Category::Ssn.is_high_risk());
        assert!(Category::CreditCard.is_high_risk());
        assert!(Category::Financial.is_high_risk());
        assert!(Category::Medical.is_high_risk());
        assert!(!Category::Email.is_high_risk());
    }

    #[test]
    fn severity_mapping() {
        assert_eq!(
            Severity::from_confidence(Category::Ssn, 0.9),
            Severity::Critical
        );
        assert_eq!(
            Severity::from_confidence(Category::Email, 0.9),
            Severity::High
        );
        assert_eq!(
            Severity::from_confidence(Category::Email, 0.7),
            Severity::Medium
        );
        assert_eq!(
            Severity::from_confidence(Category::Email, 0.5),
            Severity::Low
        );
    }

    #[test]
    fn sensitivity_is_monotonic() {
        // Higher sensitivity always means a lower acceptance threshold.
        assert!(Sensitivity::Low.threshold() > Sensitivity::Medium.threshold());
        assert!(Sensitivity::Medium.threshold() > Sensitivity::High.threshold());
        assert!(Sensitivity::High.threshold() > Sensitivity::Strict.threshold());

        assert!(Sensitivity::Low.factor() < Sensitivity::Strict.factor());
    }

    #[test]
    fn match_options_cache_key() {
        let spec = PatternSpec::new(r"\d+", Category::Id, 0.8)
            .with_options(MatchOptions::case_insensitive());
        assert_eq!(spec.cache_key(), r"(?i)\d+");

        let plain = PatternSpec::new(r"\d+", Category::Id, 0.8);
        assert_eq!(plain.cache_key(), r"\d+");
    }

    #[test]
    fn detection_span_helpers() {
        let detection = Detection {
            category: Category::Email,
            text: "a@b.co".to_string(),
            start: 10,
            end: 16,
            pattern: "email".to_string(),
            confidence: 0.9,
            severity: Severity::High,
            metadata: HashMap::new(),
        };
        assert_eq!(detection.len(), 6);
        assert!(!detection.is_empty());

        let touching = Detection {
            start: 16,
            end: 20,
            ..detection.clone()
        };
        assert!(detection.overlaps_or_touches(&touching));

        let apart = Detection {
            start: 17,
            end: 20,
            ..detection.clone()
        };
        assert!(!detection.overlaps_or_touches(&apart));
    }

    #[test]
    fn policy_types_round_trip_json() {
        let result = DetectionResult {
            text_len: 10,
            detections: Vec::new(),
            categories: vec![Category::Email],
            sensitivity: Sensitivity::Medium,
            preserve_domain_terms: true,
            metadata: DetectionMetadata::default(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: DetectionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.categories, vec![Category::Email]);
    }
}
