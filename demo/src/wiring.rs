//! Assembles a runtime from the workspace crates.

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;

use overseer_contracts::error::OverseerResult;
use overseer_core::{
    traits::{AuditSink, Evaluator, ToolExecutor},
    AgentRuntime,
};
use overseer_policy::{ApprovalGate, RiskPolicy, SafetyValidator};

/// Who answers approval requests for non-safe tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Approver {
    /// No callback: every non-safe call is denied.
    None,
    /// Ask on the terminal.
    Prompt,
    /// Approve everything.
    Auto,
}

impl Approver {
    pub fn gate(self) -> Option<ApprovalGate> {
        match self {
            Approver::None => None,
            Approver::Prompt => Some(ApprovalGate::stdio()),
            Approver::Auto => Some(ApprovalGate::auto_approve()),
        }
    }
}

pub fn load_policy(path: Option<&Path>) -> OverseerResult<RiskPolicy> {
    match path {
        Some(path) => RiskPolicy::from_file(path),
        None => Ok(RiskPolicy::empty()),
    }
}

pub fn build_runtime(
    tools: Arc<dyn ToolExecutor>,
    policy: RiskPolicy,
    gate: Option<ApprovalGate>,
    audit: Arc<dyn AuditSink>,
    evaluator: Box<dyn Evaluator>,
) -> AgentRuntime {
    let mut validator = SafetyValidator::new(audit).with_policy(policy);
    if let Some(gate) = gate {
        validator = validator.with_callback(gate);
    }
    AgentRuntime::new(tools, Box::new(validator), evaluator)
}
