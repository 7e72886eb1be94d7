//! Audit logging for sandbox decisions and tool executions
//!
//! Every granted or denied sandbox decision can be recorded as a structured
//! [`AuditEntry`] and emitted through `tracing`. Persistence is the
//! subscriber's concern; this module only shapes and emits the events.
//!
//! ## Usage
//!
//! ```ignore
//! use anvil_foundation::audit::{AuditAction, AuditDecision, AuditEntry};
//!
//! AuditEntry::new(AuditAction::PathAccess, AuditDecision::Granted, "/work/src/main.rs")
//!     .with_detail("within /work")
//!     .emit();
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What kind of operation was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Filesystem path access check
    PathAccess,
    /// Command execution check
    CommandExecution,
    /// Tool execution through the registry
    ToolExecution,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PathAccess => "path_access",
            AuditAction::CommandExecution => "command_execution",
            AuditAction::ToolExecution => "tool_execution",
        }
    }
}

/// Outcome of the check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Granted,
    Denied,
}

impl AuditDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditDecision::Granted => "granted",
            AuditDecision::Denied => "denied",
        }
    }
}

/// A single audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the decision was made
    pub timestamp: DateTime<Utc>,

    /// Operation category
    pub action: AuditAction,

    /// Granted or denied
    pub decision: AuditDecision,

    /// The path, command, or tool the decision concerned
    pub resource: String,

    /// Free-form context (matched rule, reason for denial, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        decision: AuditDecision,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            decision,
            resource: resource.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Emit the entry through `tracing`. Denials log at `warn`, grants at `info`.
    pub fn emit(&self) {
        let detail = self.detail.as_deref().unwrap_or("");
        match self.decision {
            AuditDecision::Granted => info!(
                target: "anvil::audit",
                action = self.action.as_str(),
                decision = self.decision.as_str(),
                resource = %self.resource,
                detail = %detail,
                "audit"
            ),
            AuditDecision::Denied => warn!(
                target: "anvil::audit",
                action = self.action.as_str(),
                decision = self.decision.as_str(),
                resource = %self.resource,
                detail = %detail,
                "audit"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_roundtrip() {
        let entry = AuditEntry::new(
            AuditAction::CommandExecution,
            AuditDecision::Denied,
            "rm -rf /",
        )
        .with_detail("attempt to delete root filesystem");

        let json = serde_json::to_string(&entry).unwrap();
        let back: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, AuditAction::CommandExecution);
        assert_eq!(back.decision, AuditDecision::Denied);
        assert_eq!(back.resource, "rm -rf /");
    }

    #[test]
    fn test_detail_omitted_when_absent() {
        let entry = AuditEntry::new(AuditAction::PathAccess, AuditDecision::Granted, "/work");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("detail"));
    }
}
