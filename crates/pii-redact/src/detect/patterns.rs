//! Built-in detection pattern sets and the domain-term whitelist.
//!
//! Pattern strings live here uncompiled; the shared [`crate::cache::PatternCache`]
//! owns compilation. Each category carries a handful of rules at differing
//! base confidences so context-anchored variants outrank bare ones.

use std::collections::HashSet;

use crate::types::{Category, MatchOptions, PatternSpec};

/// Built-in pattern set for one category.
#[must_use]
pub fn builtin_patterns(category: Category) -> Vec<PatternSpec> {
    match category {
        Category::Email => vec![
            PatternSpec::new(
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
                Category::Email,
                0.95,
            )
            .with_description("Email address"),
        ],
        Category::Phone => vec![
            PatternSpec::new(
                r"\b(?:\+?1[-. ]?)?(?:\([0-9]{3}\)|[0-9]{3})[-. ]?[0-9]{3}[-. ]?[0-9]{4}\b",
                Category::Phone,
                0.8,
            )
            .with_description("North American phone number"),
            PatternSpec::new(r"\+[1-9]\d{1,2}[-. ]?\d{4,12}\b", Category::Phone, 0.7)
                .with_description("International phone number"),
        ],
        Category::Ssn => vec![
            PatternSpec::new(r"\b\d{3}-\d{2}-\d{4}\b", Category::Ssn, 0.9)
                .with_description("Social Security Number"),
            PatternSpec::new(
                r"(?:ssn|social security)(?:\s*(?:no|num|number|#))?\s*[:=]?\s*\d{3}-?\d{2}-?\d{4}\b",
                Category::Ssn,
                0.95,
            )
            .with_options(MatchOptions::case_insensitive())
            .with_description("SSN with contextual keyword"),
        ],
        Category::CreditCard => vec![
            PatternSpec::new(r"\b(?:\d{4}[- ]?){3}\d{4}\b", Category::CreditCard, 0.85)
                .with_description("Payment card number"),
        ],
        Category::Address => vec![
            PatternSpec::new(
                r"\b\d{1,5}\s+[A-Za-z0-9. ]{2,30}\s+(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|place|pl|way)\b",
                Category::Address,
                0.75,
            )
            .with_options(MatchOptions::case_insensitive())
            .with_description("Street address"),
        ],
        Category::DateOfBirth => vec![
            PatternSpec::new(
                r"\b(?:dob|date of birth|born(?:\s+on)?)\s*[:=]?\s*\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b",
                Category::DateOfBirth,
                0.9,
            )
            .with_options(MatchOptions::case_insensitive())
            .with_description("Date of birth with contextual keyword"),
            PatternSpec::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{4}\b", Category::DateOfBirth, 0.5)
                .with_description("Bare calendar date"),
        ],
        Category::Id => vec![
            PatternSpec::new(r"\b(?:EMP|E)[-#]\d{5,8}\b", Category::Id, 0.85)
                .with_description("Employee identifier"),
            PatternSpec::new(
                r"\b(?:user|account|member)[-_ ]?id\s*[:=]?\s*[A-Za-z0-9-]{4,20}\b",
                Category::Id,
                0.75,
            )
            .with_options(MatchOptions::case_insensitive())
            .with_description("Generic account identifier"),
        ],
        Category::Financial => vec![
            PatternSpec::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b", Category::Financial, 0.8)
                .with_description("International Bank Account Number"),
            PatternSpec::new(
                r"\brouting\s*(?:no|num|number|#)?\s*[:=]?\s*\d{9}\b",
                Category::Financial,
                0.85,
            )
            .with_options(MatchOptions::case_insensitive())
            .with_description("US bank routing number"),
            PatternSpec::new(
                r"\baccount\s*(?:no|num|number|#)?\s*[:=]?\s*\d{8,17}\b",
                Category::Financial,
                0.85,
            )
            .with_options(MatchOptions::case_insensitive())
            .with_description("Bank account number"),
        ],
        Category::Medical => vec![
            PatternSpec::new(r"\bMRN[-:]?\s*\d{6,10}\b", Category::Medical, 0.85)
                .with_description("Medical Record Number"),
            PatternSpec::new(r"\bnpi[-:]?\s*\d{10}\b", Category::Medical, 0.85)
                .with_options(MatchOptions::case_insensitive())
                .with_description("National Provider Identifier"),
        ],
        // Custom patterns are registered at runtime.
        Category::Custom => Vec::new(),
        Category::DomainSpecific => vec![
            PatternSpec::new(
                r"\b(?:PROJ|PRJ|TICKET|ISSUE)[-#][A-Z0-9]{2,10}\b",
                Category::DomainSpecific,
                0.7,
            )
            .with_description("Internal tracker reference"),
        ],
    }
}

/// Curated whitelist of domain vocabulary that superficially resembles PII.
///
/// Documentation and test fixtures are full of placeholder addresses and
/// numbers; redacting them only damages readability.
const DOMAIN_TERMS: &[&str] = &[
    "user@example.com",
    "admin@example.com",
    "support@example.com",
    "no-reply@example.com",
    "noreply@example.com",
    "jane.doe@example.com",
    "john.doe@example.com",
    "test@test.com",
    "555-555-5555",
    "555-0100",
    "000-00-0000",
    "4111-1111-1111-1111",
    "4111 1111 1111 1111",
    "123 main street",
    "localhost",
];

/// Membership check for domain vocabulary exempt from redaction.
#[derive(Debug, Clone)]
pub struct DomainWhitelist {
    terms: HashSet<String>,
}

impl Default for DomainWhitelist {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainWhitelist {
    /// Create a whitelist with the curated built-in terms.
    #[must_use]
    pub fn new() -> Self {
        Self {
            terms: DOMAIN_TERMS.iter().map(|t| normalize(t)).collect(),
        }
    }

    /// Create an empty whitelist.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            terms: HashSet::new(),
        }
    }

    /// Add extra terms (e.g. from a policy).
    pub fn extend<I, S>(&mut self, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.terms.extend(terms.into_iter().map(|t| normalize(t.as_ref())));
    }

    /// Case- and whitespace-normalized membership check.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.terms.contains(&normalize(text))
    }

    /// Number of whitelisted terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the whitelist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Lowercase and collapse runs of whitespace to single spaces.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
