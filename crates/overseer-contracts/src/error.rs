//! Runtime error types for the OVERSEER pipeline.
//!
//! All fallible operations return `OverseerResult<T>`. Approval denials and
//! schema violations are deliberately absent: the first is a terminal mission
//! status, the second a failed `ToolResult`.

use thiserror::Error;

/// The unified error type for the OVERSEER crates.
#[derive(Debug, Error)]
pub enum OverseerError {
    /// The active planner could not produce a next step.
    #[error("planning failed: {reason}")]
    PlanningFailed { reason: String },

    /// The runtime detected an illegal transition, e.g. a call to a tool
    /// outside the mission's allow-list.
    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    /// A tool with this name is already registered.
    #[error("tool '{name}' is already registered")]
    DuplicateTool { name: String },

    /// No tool with this name is registered.
    #[error("tool '{name}' is not registered")]
    ToolNotFound { name: String },

    /// The tool's handler faulted. Distinct from a tool that ran and failed.
    #[error("tool '{tool}' could not be invoked: {reason}")]
    ToolInvocationFailed { tool: String, reason: String },

    /// A schema document itself is unusable.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// A goal tree failed structural validation.
    #[error("plan validation failed: {reason}")]
    PlanValidation { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A persistence-layer read or write failed.
    #[error("storage error: {reason}")]
    StorageError { reason: String },

    /// The audit sink could not persist a record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// The deployment queue rejected or lost an operation.
    #[error("queue error: {reason}")]
    QueueError { reason: String },
}

impl OverseerError {
    pub fn planning(reason: impl Into<String>) -> Self {
        OverseerError::PlanningFailed {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        OverseerError::ConfigError {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        OverseerError::StorageError {
            reason: reason.into(),
        }
    }

    /// True for faults raised by the tool layer rather than the tool itself.
    pub fn is_tool_fault(&self) -> bool {
        matches!(
            self,
            OverseerError::ToolNotFound { .. } | OverseerError::ToolInvocationFailed { .. }
        )
    }
}

/// Convenience alias used throughout the OVERSEER crates.
pub type OverseerResult<T> = Result<T, OverseerError>;
