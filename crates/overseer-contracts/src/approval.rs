//! Approval decision and audit record types.
//!
//! The safety validator produces one `ApprovalDecision` per requested call and
//! hands an `ApprovalRecord` to the audit sink for every decision it makes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{thought::ToolCall, tool::RiskLevel};

/// How an approval request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
    /// Nobody answered in time. Treated as a rejection.
    Timeout,
}

impl ApprovalStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }
}

/// The verdict on one requested tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub reason: String,
    pub risk: RiskLevel,
    pub status: ApprovalStatus,
    /// Who or what made the decision ("policy:safe", "operator", "auto", ...).
    pub approved_by: String,
}

impl ApprovalDecision {
    pub fn approve(risk: RiskLevel, reason: impl Into<String>, by: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: reason.into(),
            risk,
            status: ApprovalStatus::Approved,
            approved_by: by.into(),
        }
    }

    pub fn reject(risk: RiskLevel, reason: impl Into<String>, by: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            risk,
            status: ApprovalStatus::Rejected,
            approved_by: by.into(),
        }
    }

    pub fn timeout(risk: RiskLevel, reason: impl Into<String>, by: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            risk,
            status: ApprovalStatus::Timeout,
            approved_by: by.into(),
        }
    }
}

/// One line of the approval audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub tool_name: String,
    pub tool_args: Map<String, Value>,
    pub status: ApprovalStatus,
    pub reason: String,
    pub approved_by: String,
    pub timestamp: DateTime<Utc>,
}

impl ApprovalRecord {
    /// Build the audit record for `decision` on `call`, stamped now.
    pub fn from_decision(call: &ToolCall, decision: &ApprovalDecision) -> Self {
        Self {
            tool_name: call.tool.clone(),
            tool_args: call.arguments.clone(),
            status: decision.status,
            reason: decision.reason.clone(),
            approved_by: decision.approved_by.clone(),
            timestamp: Utc::now(),
        }
    }
}
