//! Core trait definitions for the OVERSEER execution loop.
//!
//! These traits define every seam the runtime talks through:
//!
//! - `Planner`          — untrusted strategy (may be backed by a model)
//! - `ToolExecutor`     — validates and invokes registered tools
//! - `ActionGate`       — trusted gate, consulted before any tool runs
//! - `ApprovalCallback` — pluggable human/policy decision for risky calls
//! - `AuditSink`        — trusted, append-only record of every decision
//! - `Evaluator`        — renders the final verdict on a run
//!
//! The runtime only ever holds trait objects and never inspects concrete
//! types behind them.

use overseer_contracts::{
    approval::{ApprovalDecision, ApprovalRecord},
    error::OverseerResult,
    execution::{AgentState, AgentStep, ExecutionContext, TokenUsage},
    mission::Mission,
    thought::{Thought, ToolCall},
    tool::{RiskLevel, ToolResult, ToolSpec},
};

/// A planning strategy: given the current state, decide the next step.
///
/// Planners may keep internal state (a queue of scripted steps, a running
/// token count), hence `&mut self`. A planner instance serves one mission run.
pub trait Planner: Send {
    /// Produce the next `Thought`.
    ///
    /// An `Err` is a planning fault and terminates the mission as failed.
    fn plan_next(&mut self, state: &AgentState) -> OverseerResult<Thought>;

    /// Tokens consumed so far, for planners backed by a completion service.
    fn usage(&self) -> Option<TokenUsage> {
        None
    }
}

/// The tool layer as seen by the runtime.
pub trait ToolExecutor: Send + Sync {
    /// Validate `call.arguments` and, only if valid, invoke the handler.
    ///
    /// Schema violations come back as `Ok` with a failed `ToolResult`.
    /// `Err` means the tool could not be invoked at all.
    fn execute(&self, call: &ToolCall, context: &mut ExecutionContext) -> OverseerResult<ToolResult>;

    /// The declared risk of a registered tool, or `None` if unknown.
    fn risk_level(&self, name: &str) -> Option<RiskLevel>;

    /// Every registered tool as a presentation spec, sorted by name.
    fn specs(&self) -> Vec<ToolSpec>;
}

/// Everything an approver needs to decide on one call.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalRequest<'a> {
    pub call: &'a ToolCall,
    pub mission: &'a Mission,
    pub context: &'a ExecutionContext,
    /// Effective risk for this call.
    pub risk: RiskLevel,
}

/// The gate consulted before every tool execution.
///
/// Implementations must be deterministic for `safe` calls and fail closed
/// when they cannot reach a decision.
pub trait ActionGate: Send + Sync {
    /// Decide whether the call may run. `request.risk` is the tool's
    /// declared risk; the gate may override it.
    ///
    /// `Err` is reserved for infrastructure faults (e.g. the audit sink
    /// failed); a denial is an `Ok` decision with `approved = false`.
    fn approve(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision>;
}

/// A pluggable approver for non-safe calls.
pub trait ApprovalCallback: Send + Sync {
    fn decide(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision>;
}

/// The approval audit trail.
///
/// Every decision produces exactly one record. Records are never modified
/// or removed once appended.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &ApprovalRecord) -> OverseerResult<()>;
}

/// Why the evaluator is being consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationTrigger {
    /// The planner emitted a finish thought with this summary.
    Finished { summary: String },
    /// The loop ran out of steps before the planner finished.
    BudgetExhausted,
}

/// An evaluator's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub success: bool,
    pub reason: String,
}

impl Evaluation {
    pub fn success(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            reason: reason.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
        }
    }
}

/// Decides whether a run actually met its mission's success criteria.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        mission: &Mission,
        context: &ExecutionContext,
        steps: &[AgentStep],
        trigger: &EvaluationTrigger,
    ) -> OverseerResult<Evaluation>;
}
