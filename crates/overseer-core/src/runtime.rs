//! The OVERSEER runtime: the bounded plan → approve → execute → record loop.
//!
//! The runtime enforces the execution model for one mission:
//!
//!   Planner → allow-list → ActionGate → ToolExecutor → history → Evaluator
//!
//! The safety invariant is structural: `ToolExecutor::execute()` is only
//! reachable after `ActionGate::approve()` returned an approved decision.
//! Nothing runs concurrently; each step fully resolves before the next one
//! is planned.

use std::sync::Arc;

use tracing::{debug, info, warn};

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::{AgentState, AgentStep, ExecutionContext, MissionOutcome, MissionStatus},
    mission::{Mission, DEFAULT_IMPLICIT_TOOLS},
    thought::Thought,
    tool::{RiskLevel, ToolResult},
};

use crate::traits::{
    ActionGate, ApprovalRequest, EvaluationTrigger, Evaluator, Planner, ToolExecutor,
};

/// A run that ended in `Err`, with the steps executed before the fault.
#[derive(Debug)]
pub struct RunFault {
    pub error: OverseerError,
    pub steps: Vec<AgentStep>,
}

impl RunFault {
    /// The fault as a failed outcome that keeps the partial history.
    pub fn into_outcome(self) -> MissionOutcome {
        MissionOutcome::new(MissionStatus::Failed, self.steps, self.error.to_string())
    }
}

/// Drives mission runs against a fixed set of trusted components.
///
/// One runtime can serve many missions in sequence; the planner is supplied
/// per run because planners carry per-mission state.
pub struct AgentRuntime {
    tools: Arc<dyn ToolExecutor>,
    gate: Box<dyn ActionGate>,
    evaluator: Box<dyn Evaluator>,
    implicit_tools: Vec<String>,
}

impl AgentRuntime {
    pub fn new(
        tools: Arc<dyn ToolExecutor>,
        gate: Box<dyn ActionGate>,
        evaluator: Box<dyn Evaluator>,
    ) -> Self {
        Self {
            tools,
            gate,
            evaluator,
            implicit_tools: DEFAULT_IMPLICIT_TOOLS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the set of tools allowed regardless of a mission's allow-list.
    pub fn with_implicit_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implicit_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn tools(&self) -> &Arc<dyn ToolExecutor> {
        &self.tools
    }

    pub fn implicit_tools(&self) -> &[String] {
        &self.implicit_tools
    }

    /// Run `mission` to completion.
    ///
    /// # Loop
    ///
    /// 1. Ask the planner for a `Thought`; a planning fault ends the run as failed
    /// 2. `Finish` → ask the evaluator and terminate accordingly
    /// 3. `Action` outside the allow-list → protocol violation (`Err`)
    /// 4. Ask the gate; a denial records a failed step and ends the run as blocked
    /// 5. Execute the call, append the step, go to 1
    /// 6. Step budget exhausted → the evaluator alone decides success
    ///
    /// # Errors
    ///
    /// Returns `Err` for protocol violations and for gate infrastructure
    /// faults (an approval that cannot be audited cannot proceed). Planning
    /// faults, denials and failed tools are all valid `MissionOutcome`s.
    pub fn run(
        &self,
        mission: &Mission,
        context: ExecutionContext,
        planner: &mut dyn Planner,
    ) -> OverseerResult<MissionOutcome> {
        self.run_traced(mission, context, planner)
            .map_err(|fault| fault.error)
    }

    /// Like [`run`](Self::run), but a fault keeps the steps that already
    /// executed. Tools before the fault may have had side effects.
    pub fn run_traced(
        &self,
        mission: &Mission,
        context: ExecutionContext,
        planner: &mut dyn Planner,
    ) -> Result<MissionOutcome, RunFault> {
        let mut state = AgentState::new(mission.clone(), context);
        self.drive(mission, &mut state, planner)
            .map_err(|error| RunFault {
                error,
                steps: std::mem::take(&mut state.steps),
            })
    }

    fn drive(
        &self,
        mission: &Mission,
        state: &mut AgentState,
        planner: &mut dyn Planner,
    ) -> OverseerResult<MissionOutcome> {
        info!(
            mission_id = %mission.id,
            max_steps = mission.max_steps,
            "mission run starting"
        );

        for iteration in 0..mission.max_steps {
            // ── Step 1: Ask the planner ──────────────────────────────────────
            let thought = match planner.plan_next(state) {
                Ok(thought) => thought,
                Err(e) => {
                    warn!(
                        mission_id = %mission.id,
                        step = iteration,
                        error = %e,
                        "planner faulted, failing mission"
                    );
                    return Ok(MissionOutcome::new(
                        MissionStatus::Failed,
                        std::mem::take(&mut state.steps),
                        e.to_string(),
                    ));
                }
            };

            // ── Step 2: Finish ───────────────────────────────────────────────
            let (content, call) = match thought {
                Thought::Finish { content } => {
                    debug!(mission_id = %mission.id, step = iteration, "planner finished");
                    let trigger = EvaluationTrigger::Finished { summary: content };
                    return Ok(self.conclude(state, &trigger));
                }
                Thought::Action { content, call } => (content, call),
            };

            debug!(
                mission_id = %mission.id,
                step = iteration,
                tool = %call.tool,
                "planner requested tool call"
            );

            // ── Step 3: Allow-list ───────────────────────────────────────────
            if !mission.allows(&call.tool, &self.implicit_tools) {
                warn!(
                    mission_id = %mission.id,
                    tool = %call.tool,
                    "tool outside mission allow-list"
                );
                return Err(OverseerError::ProtocolViolation {
                    reason: format!(
                        "tool '{}' is not allowed for mission '{}'",
                        call.tool, mission.id
                    ),
                });
            }

            // ── Step 4: Approval ─────────────────────────────────────────────
            //
            // Unknown tools are treated as destructive so the gate fails closed.
            let declared = self
                .tools
                .risk_level(&call.tool)
                .unwrap_or(RiskLevel::Destructive);
            let decision = self.gate.approve(&ApprovalRequest {
                call: &call,
                mission,
                context: &state.context,
                risk: declared,
            })?;

            if !decision.approved {
                warn!(
                    mission_id = %mission.id,
                    step = iteration,
                    tool = %call.tool,
                    reason = %decision.reason,
                    "tool call denied, mission blocked"
                );
                state.steps.push(AgentStep {
                    thought: Thought::Action { content, call },
                    result: None,
                });
                return Ok(MissionOutcome::new(
                    MissionStatus::Blocked,
                    std::mem::take(&mut state.steps),
                    decision.reason,
                ));
            }

            // ── Step 5: Execute ──────────────────────────────────────────────
            //
            // Only reachable after an approved decision.
            let result = match self.tools.execute(&call, &mut state.context) {
                Ok(result) => result,
                Err(e) if e.is_tool_fault() => {
                    warn!(
                        mission_id = %mission.id,
                        tool = %call.tool,
                        error = %e,
                        "tool could not be invoked"
                    );
                    ToolResult::failure(format!("tool invocation error: {e}"))
                }
                Err(e) => return Err(e),
            };

            debug!(
                mission_id = %mission.id,
                step = iteration,
                tool = %call.tool,
                success = result.success,
                "tool call completed"
            );

            state.steps.push(AgentStep {
                thought: Thought::Action { content, call },
                result: Some(result),
            });
        }

        // ── Step 6: Budget exhausted ─────────────────────────────────────────
        info!(
            mission_id = %mission.id,
            steps = state.steps.len(),
            "step budget exhausted without finish"
        );
        Ok(self.conclude(state, &EvaluationTrigger::BudgetExhausted))
    }

    /// Ask the evaluator for the final verdict. Evaluator faults fail the run.
    fn conclude(&self, state: &mut AgentState, trigger: &EvaluationTrigger) -> MissionOutcome {
        let verdict =
            self.evaluator
                .evaluate(&state.mission, &state.context, &state.steps, trigger);

        let (status, summary) = match verdict {
            Ok(eval) if eval.success => (MissionStatus::Succeeded, eval.reason),
            Ok(eval) => (MissionStatus::Failed, eval.reason),
            Err(e) => (MissionStatus::Failed, format!("evaluation failed: {e}")),
        };

        info!(
            mission_id = %state.mission.id,
            status = %status,
            steps = state.steps.len(),
            "mission run finished"
        );

        MissionOutcome::new(status, std::mem::take(&mut state.steps), summary)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
