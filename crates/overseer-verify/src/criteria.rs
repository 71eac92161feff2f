//! Success-criteria evaluator.
//!
//! `CriteriaEvaluator` requires every entry of `Mission::success_criteria`
//! to be satisfied, on top of the step-outcome condition. A criterion is
//! satisfied by its registered check when one exists; otherwise by a
//! case-insensitive substring match against the rendered outputs of
//! successful steps and the values held in the execution context.
//!
//! Checks are registered by the hosting application, which keeps domain
//! knowledge out of the evaluator itself.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use overseer_contracts::{
    error::OverseerResult,
    execution::{AgentStep, ExecutionContext},
    mission::Mission,
};
use overseer_core::traits::{Evaluation, EvaluationTrigger, Evaluator};

use crate::outcome::StepOutcomeEvaluator;

/// A caller-supplied criterion check.
///
/// Returns `Some(message)` when the criterion is not met, `None` when it is.
pub type CriterionCheck =
    Box<dyn Fn(&ExecutionContext, &[AgentStep]) -> Option<String> + Send + Sync>;

#[derive(Default)]
pub struct CriteriaEvaluator {
    base: StepOutcomeEvaluator,
    checks: HashMap<String, CriterionCheck>,
}

impl CriteriaEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `check` for the criterion with exactly this text.
    /// Registering the same criterion twice replaces the previous check.
    pub fn register_check(&mut self, criterion: impl Into<String>, check: CriterionCheck) {
        self.checks.insert(criterion.into(), check);
    }

    pub fn with_check<F>(mut self, criterion: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ExecutionContext, &[AgentStep]) -> Option<String> + Send + Sync + 'static,
    {
        self.register_check(criterion, Box::new(check));
        self
    }

    /// `None` when `criterion` is met, otherwise why it is not.
    fn unmet(&self, criterion: &str, context: &ExecutionContext, steps: &[AgentStep]) -> Option<String> {
        if let Some(check) = self.checks.get(criterion) {
            return check(context, steps).map(|why| format!("'{}': {}", criterion, why));
        }

        let needle = criterion.to_lowercase();
        let in_steps = steps
            .iter()
            .filter(|s| s.succeeded())
            .filter_map(|s| s.result.as_ref())
            .any(|r| r.render().to_lowercase().contains(&needle));
        let in_context = context
            .inputs
            .values()
            .any(|v| render_value(v).to_lowercase().contains(&needle));

        if in_steps || in_context {
            None
        } else {
            Some(format!("'{}': no evidence in step outputs or context", criterion))
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Evaluator for CriteriaEvaluator {
    fn evaluate(
        &self,
        mission: &Mission,
        context: &ExecutionContext,
        steps: &[AgentStep],
        trigger: &EvaluationTrigger,
    ) -> OverseerResult<Evaluation> {
        let base = self.base.evaluate(mission, context, steps, trigger)?;
        if !base.success {
            return Ok(base);
        }

        let unmet: Vec<String> = mission
            .success_criteria
            .iter()
            .filter_map(|c| {
                debug!(mission_id = %mission.id, criterion = %c, "checking success criterion");
                self.unmet(c, context, steps)
            })
            .collect();

        if unmet.is_empty() {
            return Ok(base);
        }

        warn!(
            mission_id = %mission.id,
            unmet = unmet.len(),
            "success criteria not met"
        );
        Ok(Evaluation::failure(format!(
            "unmet success criteria: {}",
            unmet.join("; ")
        )))
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

    use super::CriteriaEvaluator;

    fn ok_step(tool: &str, output: serde_json::Value) -> AgentStep {
        AgentStep {
            thought: Thought::action("step", ToolCall::from_value(tool, json!({}))),
            result: Some(ToolResult::ok(output)),
        }
    }

    fn finished() -> EvaluationTrigger {
        EvaluationTrigger::Finished {
            summary: "done".to_string(),
        }
    }

    #[test]
    fn test_substring_evidence_in_outputs_and_context() {
        let mission = Mission::new("m", "g").with_success_criteria(["Index Rebuilt", "pr opened"]);
        let steps = vec![ok_step("rebuild", json!("index rebuilt: 42 docs"))];
        let context = ExecutionContext::new().with_input("status", "PR opened as #17");

        let verdict = CriteriaEvaluator::new()
            .evaluate(&mission, &context, &steps, &finished())
            .unwrap();
        assert!(verdict.success, "{}", verdict.reason);
    }

    #[test]
    fn test_unmet_criteria_are_listed() {
        let mission = Mission::new("m", "g").with_success_criteria(["tests pass", "changelog updated"]);
        let steps = vec![ok_step("run_tests", json!("tests pass"))];

        let verdict = CriteriaEvaluator::new()
            .evaluate(&mission, &ExecutionContext::new(), &steps, &finished())
            .unwrap();
        assert!(!verdict.success);
        assert!(verdict.reason.contains("changelog updated"));
        assert!(!verdict.reason.contains("'tests pass'"));
    }

    /// Failed steps are not evidence.
    #[test]
    fn test_failed_output_is_not_evidence() {
        let mission = Mission::new("m", "g").with_success_criteria(["deployed"]);
        let steps = vec![
            AgentStep {
                thought: Thought::action("try", ToolCall::from_value("deploy", json!({}))),
                result: Some(ToolResult::failure("not deployed: quota")),
            },
            ok_step("notify", json!("sent")),
        ];

        let verdict = CriteriaEvaluator::new()
            .evaluate(&mission, &ExecutionContext::new(), &steps, &finished())
            .unwrap();
        assert!(!verdict.success);
    }

    #[test]
    fn test_registered_check_takes_precedence() {
        let mission = Mission::new("m", "g").with_success_criteria(["at least 3 documents"]);
        let evaluator = CriteriaEvaluator::new().with_check("at least 3 documents", |ctx, _| {
            match ctx.get("doc_count").and_then(|v| v.as_u64()) {
                Some(n) if n >= 3 => None,
                Some(n) => Some(format!("only {n} documents")),
                None => Some("doc_count missing".to_string()),
            }
        });
        let steps = vec![ok_step("count", json!("at least 3 documents"))];

        let short = ExecutionContext::new().with_input("doc_count", 2);
        let verdict = evaluator.evaluate(&mission, &short, &steps, &finished()).unwrap();
        assert!(!verdict.success);
        assert!(verdict.reason.contains("only 2 documents"));

        let enough = ExecutionContext::new().with_input("doc_count", 5);
        assert!(evaluator.evaluate(&mission, &enough, &steps, &finished()).unwrap().success);
    }

    #[test]
    fn test_base_condition_still_applies() {
        let mission = Mission::new("m", "g");
        let verdict = CriteriaEvaluator::new()
            .evaluate(&mission, &ExecutionContext::new(), &[], &EvaluationTrigger::BudgetExhausted)
            .unwrap();
        assert!(!verdict.success);
    }
}
