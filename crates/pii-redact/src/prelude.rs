//! Convenient re-exports for common usage.
//!
//! ```
//! use pii_redact::prelude::*;
//! ```

pub use crate::config::EngineConfig;
pub use crate::error::{RedactError, Result};
pub use crate::policy::{RedactionContext, RedactionPolicy, RedactionStrategy};
pub use crate::service::RedactionService;
pub use crate::types::{AuditContext, Category, Sensitivity, Severity};
