//! # anvil-foundation
//!
//! Foundation layer for Anvil:
//! - Error: the framework-wide error taxonomy
//! - Audit: structured grant/deny logging for sandbox decisions
//! - Config: trusted security configuration consumed by the tool layer

pub mod audit;
pub mod config;
pub mod error;

// ============================================================================
// Error
// ============================================================================
pub use error::{Cause, Error, Result};

// ============================================================================
// Audit
// ============================================================================
pub use audit::{AuditAction, AuditDecision, AuditEntry};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    default_allowed_commands, default_denied_commands, SecurityConfig, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_MAX_OUTPUT_SIZE,
};
