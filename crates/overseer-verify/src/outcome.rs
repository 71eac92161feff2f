//! The default evaluator.

use tracing::debug;

use overseer_contracts::{
    error::OverseerResult,
    execution::{AgentStep, ExecutionContext},
    mission::Mission,
};
use overseer_core::traits::{Evaluation, EvaluationTrigger, Evaluator};

/// Judges a run by its final step.
///
/// - No steps: success only if the planner finished (a plan with nothing to
///   do is complete; a budget spent on nothing is not).
/// - Otherwise: success iff the final step executed and succeeded.
///
/// On success the finish summary, when there is one, becomes the reason.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOutcomeEvaluator;

impl StepOutcomeEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for StepOutcomeEvaluator {
    fn evaluate(
        &self,
        mission: &Mission,
        _context: &ExecutionContext,
        steps: &[AgentStep],
        trigger: &EvaluationTrigger,
    ) -> OverseerResult<Evaluation> {
        let verdict = match (steps.last(), trigger) {
            (None, EvaluationTrigger::Finished { summary }) => Evaluation::success(finish_reason(summary)),
            (None, EvaluationTrigger::BudgetExhausted) => {
                Evaluation::failure("step budget exhausted before any step ran")
            }
            (Some(last), trigger) => {
                let tool = last.tool_name().unwrap_or("<none>");
                match (&last.result, trigger) {
                    (Some(result), EvaluationTrigger::Finished { summary }) if result.success => {
                        Evaluation::success(finish_reason(summary))
                    }
                    (Some(result), EvaluationTrigger::BudgetExhausted) if result.success => {
                        Evaluation::success(format!(
                            "step budget of {} exhausted; final step '{}' succeeded",
                            mission.max_steps, tool
                        ))
                    }
                    (Some(result), _) => Evaluation::failure(format!(
                        "final step '{}' failed: {}",
                        tool,
                        result.error.as_deref().unwrap_or("no error reported")
                    )),
                    (None, _) => {
                        Evaluation::failure(format!("final step '{}' never executed", tool))
                    }
                }
            }
        };

        debug!(
            mission_id = %mission.id,
            success = verdict.success,
            reason = %verdict.reason,
            "step outcome evaluated"
        );
        Ok(verdict)
    }
}

fn finish_reason(summary: &str) -> String {
    if summary.trim().is_empty() {
        "planner finished".to_string()
    } else {
        summary.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use overseer_contracts::{
        execution::{AgentStep, ExecutionContext},
        mission::Mission,
        thought::{Thought, ToolCall},
        tool::ToolResult,
    };
    use overseer_core::traits::{EvaluationTrigger, Evaluator};

    use super::StepOutcomeEvaluator;

    fn step(tool: &str, result: Option<ToolResult>) -> AgentStep {
        AgentStep {
            thought: Thought::action("do it", ToolCall::from_value(tool, json!({}))),
            result,
        }
    }

    fn finished(summary: &str) -> EvaluationTrigger {
        EvaluationTrigger::Finished {
            summary: summary.to_string(),
        }
    }

    fn eval(steps: &[AgentStep], trigger: EvaluationTrigger) -> overseer_core::traits::Evaluation {
        StepOutcomeEvaluator
            .evaluate(&Mission::new("m", "g"), &ExecutionContext::new(), steps, &trigger)
            .unwrap()
    }

    #[test]
    fn test_no_steps() {
        assert!(eval(&[], finished("nothing to do")).success);
        assert_eq!(eval(&[], finished("")).reason, "planner finished");
        assert!(!eval(&[], EvaluationTrigger::BudgetExhausted).success);
    }

    #[test]
    fn test_budget_exhausted_with_successful_final_step() {
        let steps = vec![
            step("fetch", Some(ToolResult::failure("timeout"))),
            step("fetch", Some(ToolResult::ok(json!("page")))),
        ];
        let verdict = eval(&steps, EvaluationTrigger::BudgetExhausted);
        assert!(verdict.success);
        assert!(verdict.reason.contains("fetch"));
    }

    #[test]
    fn test_finish_after_failed_step_fails() {
        let steps = vec![step("publish", Some(ToolResult::failure("403 forbidden")))];
        let verdict = eval(&steps, finished("all done"));
        assert!(!verdict.success);
        assert!(verdict.reason.contains("403 forbidden"));
    }

    #[test]
    fn test_finish_after_success_uses_summary() {
        let steps = vec![step("publish", Some(ToolResult::ok(json!({}))))];
        assert_eq!(eval(&steps, finished("published 3 pages")).reason, "published 3 pages");
    }
}
