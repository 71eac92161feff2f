//! Deterministic replay of pre-built steps.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use overseer_contracts::{
    error::OverseerResult,
    execution::AgentState,
    thought::{Thought, ToolCall},
};
use overseer_core::traits::Planner;

/// Summary used once a script runs out of steps.
pub const DEFAULT_FINISH: &str = "scripted plan complete";

/// One pre-built step. With a `tool` it becomes an action; without one it
/// finishes the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedStep {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_summary: Option<String>,
}

impl ScriptedStep {
    pub fn action(description: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            description: description.into(),
            tool: Some(tool.into()),
            arguments: match arguments {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            finish_summary: None,
        }
    }

    pub fn finish(summary: impl Into<String>) -> Self {
        let summary = summary.into();
        Self {
            description: summary.clone(),
            tool: None,
            arguments: Map::new(),
            finish_summary: Some(summary),
        }
    }

    fn into_thought(self) -> Thought {
        match self.tool {
            Some(tool) => Thought::action(self.description, ToolCall::new(tool, self.arguments)),
            None => Thought::finish(self.finish_summary.unwrap_or(self.description)),
        }
    }
}

/// Pops one step per call and ignores the state entirely.
#[derive(Debug, Clone)]
pub struct ScriptedPlanner {
    steps: VecDeque<ScriptedStep>,
    default_finish: String,
}

impl ScriptedPlanner {
    pub fn new(steps: impl IntoIterator<Item = ScriptedStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            default_finish: DEFAULT_FINISH.to_string(),
        }
    }

    pub fn with_default_finish(mut self, summary: impl Into<String>) -> Self {
        self.default_finish = summary.into();
        self
    }

    /// Wrap one external session as one opaque tool call.
    pub fn single_session(tool: impl Into<String>, arguments: Value, summary: impl Into<String>) -> Self {
        let tool = tool.into();
        let step = ScriptedStep::action(format!("delegate to {}", tool), tool, arguments);
        Self::new([step]).with_default_finish(summary)
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl Planner for ScriptedPlanner {
    fn plan_next(&mut self, state: &AgentState) -> OverseerResult<Thought> {
        let thought = match self.steps.pop_front() {
            Some(step) => step.into_thought(),
            None => Thought::finish(self.default_finish.clone()),
        };
        debug!(
            mission_id = %state.mission.id,
            kind = thought.kind(),
            remaining = self.steps.len(),
            "scripted step"
        );
        Ok(thought)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use overseer_contracts::{
        execution::{AgentState, ExecutionContext},
        mission::Mission,
        thought::Thought,
    };
    use overseer_core::traits::Planner;

    use super::{ScriptedPlanner, ScriptedStep, DEFAULT_FINISH};

    fn state() -> AgentState {
        AgentState::new(Mission::new("m", "g"), ExecutionContext::new())
    }

    #[test]
    fn test_pops_in_order_then_finishes() {
        let mut planner = ScriptedPlanner::new([
            ScriptedStep::action("list", "list_docs", json!({ "prefix": "a/" })),
            ScriptedStep::action("read", "read_doc", json!({ "path": "a/1.md" })),
        ]);

        let first = planner.plan_next(&state()).unwrap();
        assert_eq!(first.tool_call().unwrap().tool, "list_docs");
        assert_eq!(first.tool_call().unwrap().arguments["prefix"], json!("a/"));
        assert_eq!(planner.plan_next(&state()).unwrap().tool_call().unwrap().tool, "read_doc");

        for _ in 0..2 {
            assert_eq!(planner.plan_next(&state()).unwrap(), Thought::finish(DEFAULT_FINISH));
        }
    }

    #[test]
    fn test_step_without_tool_finishes_with_summary() {
        let mut planner = ScriptedPlanner::new([ScriptedStep {
            description: "wrap up".to_string(),
            tool: None,
            arguments: Default::default(),
            finish_summary: None,
        }]);
        assert_eq!(planner.plan_next(&state()).unwrap(), Thought::finish("wrap up"));

        let mut planner = ScriptedPlanner::new([ScriptedStep::finish("all synced")]);
        assert_eq!(planner.plan_next(&state()).unwrap().content(), "all synced");
    }

    #[test]
    fn test_single_session() {
        let mut planner =
            ScriptedPlanner::single_session("session.run", json!({ "prompt": "fix CI" }), "session ended");

        let action = planner.plan_next(&state()).unwrap();
        assert_eq!(action.tool_call().unwrap().tool, "session.run");
        assert_eq!(planner.plan_next(&state()).unwrap(), Thought::finish("session ended"));
        assert_eq!(planner.remaining(), 0);
    }
}
