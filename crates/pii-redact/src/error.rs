//! Error types for pii-redact.
//!
//! This module defines all error types used throughout the engine.
//! A single bad pattern never takes down a whole detection pass: compile
//! failures are surfaced per-pattern, streaming failures are retried on the
//! single-pass path by the service, and stale spans are skipped during
//! splicing. Only genuinely invalid configuration is returned to the caller
//! before any processing starts.

use thiserror::Error;

/// The main error type for pii-redact operations.
#[derive(Debug, Error)]
pub enum RedactError {
    /// A detection pattern failed to compile.
    #[error("failed to compile pattern '{pattern}': {source}")]
    PatternCompilation {
        /// The pattern string that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A policy or category configuration is malformed.
    #[error("validation error: {message}")]
    Validation {
        /// Description of what failed validation.
        message: String,
    },

    /// A chunk-level failure inside the streaming path.
    ///
    /// Callers catch this and fall back to single-pass processing.
    #[error("streaming processing error: {message}")]
    Streaming {
        /// Description of the chunk-level failure.
        message: String,
    },

    /// A detection span no longer fits the text being spliced.
    #[error("detection span {start}..{end} is out of bounds for text of length {len}")]
    OutOfBounds {
        /// Span start offset.
        start: usize,
        /// Span end offset.
        end: usize,
        /// Length of the text the span was applied to.
        len: usize,
    },

    /// Invalid engine configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl RedactError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a streaming error.
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Convenience result type for pii-redact operations.
pub type Result<T> = std::result::Result<T, RedactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RedactError::OutOfBounds {
            start: 10,
            end: 20,
            len: 15,
        };
        assert!(err.to_string().contains("10..20"));
        assert!(err.to_string().contains("15"));
    }

    #[test]
    fn pattern_compilation_source() {
        let source = regex::Regex::new("[invalid").unwrap_err();
        let err = RedactError::PatternCompilation {
            pattern: "[invalid".to_string(),
            source,
        };
        assert!(err.to_string().contains("[invalid"));
    }

    #[test]
    fn constructors() {
        assert!(matches!(
            RedactError::validation("bad"),
            RedactError::Validation { .. }
        ));
        assert!(matches!(
            RedactError::streaming("bad"),
            RedactError::Streaming { .. }
        ));
        assert!(matches!(
            RedactError::config("bad"),
            RedactError::Config { .. }
        ));
    }
}
