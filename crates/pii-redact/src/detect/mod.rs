//! Category-based PII detection.
//!
//! This module provides the detection pattern library: built-in per-category
//! pattern sets, format validators used as confidence refinements, and the
//! [`PatternLibrary`] that runs them through the shared pattern cache.

pub mod checks;
pub mod library;
pub mod patterns;

pub use library::PatternLibrary;
pub use patterns::{DomainWhitelist, builtin_patterns};
