//! pii-redact: Streaming PII detection and redaction engine
//!
//! This crate provides pattern-based detection of personally identifiable
//! information and policy-driven redaction, designed to run embedded inside
//! a tool-invocation server. It has no wire format and performs no I/O of
//! its own.
//!
//! # Features
//!
//! - **Compiled-pattern cache** with recency/frequency eviction
//! - **Category-based detection** with confidence scoring, a sensitivity
//!   dial, and a domain-term whitelist
//! - **Chunked streaming** with bounded-concurrency matching for large
//!   inputs, seam-safe via trailing overlap
//! - **Policy-driven redaction** with per-category strategies (replace,
//!   mask, hash, partial, tokenize, fuzzy, remove) and a full audit trail
//! - **Memory monitoring** with trend analysis and threshold callbacks
//!
//! # Example
//!
//! ```no_run
//! use pii_redact::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = RedactionService::with_defaults();
//!     let result = service
//!         .redact_pii(
//!             "Contact me at jane@corp.com",
//!             &RedactionPolicy::default(),
//!             true,
//!             &RedactionContext::new(),
//!             &AuditContext::default(),
//!         )
//!         .await;
//!     assert!(!result.redacted.contains("jane@corp.com"));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod detect;
pub mod error;
pub mod memory;
pub mod policy;
pub mod prelude;
pub mod service;
pub mod stream;
pub mod types;

pub use cache::{CacheStats, PatternCache};
pub use config::{CacheConfig, EngineConfig, MemoryConfig, StreamConfig};
pub use detect::{DomainWhitelist, PatternLibrary, builtin_patterns};
pub use error::{RedactError, Result};
pub use memory::{
    MemoryAnalysis, MemoryEvent, MemoryEventKind, MemoryMonitor, MemoryRecommendation,
    MemorySnapshot, MemoryTrend, QuickCheckReport,
};
pub use policy::{
    CategoryRule, PolicyEngine, PolicyReport, Redaction, RedactionContext, RedactionPolicy,
    RedactionResult, RedactionStats, RedactionStrategy,
};
pub use service::{RedactionService, contains_pii, redact_text};
pub use stream::{StreamMatch, StreamProcessor, TextChunk};
pub use types::{
    AuditContext, Category, Detection, DetectionMetadata, DetectionResult, MatchOptions,
    PatternSpec, Sensitivity, Severity,
};
