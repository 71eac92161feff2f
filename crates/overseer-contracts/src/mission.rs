//! Mission definition types.
//!
//! A `Mission` is the declared unit of work handed to the runtime. It is
//! constructed once (from a definition file or in memory) and never mutated
//! while a run is in progress.

use serde::{Deserialize, Serialize};

/// Tools that are always callable, even under an explicit allow-list.
///
/// These wrap an external session as one opaque tool call, so a mission that
/// restricts its tool set can still hand work to a session runner.
pub const DEFAULT_IMPLICIT_TOOLS: &[&str] = &["session.run"];

fn default_max_steps() -> u32 {
    10
}

/// A declared unit of agent work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    /// Stable identifier. Doubles as the mission type for memory and metrics.
    pub id: String,
    /// Free-text statement of what the agent should achieve.
    pub goal: String,
    /// Upper bound on loop iterations. Always at least 1.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Constraints the planner must respect (presented verbatim to planners).
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Conditions the evaluator checks before declaring success.
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Explicit allow-list. `None` means every registered tool may be called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    /// When true, even `safe` tools go through the approval callback.
    #[serde(default)]
    pub requires_approval: bool,
}

impl Mission {
    /// Build a mission with defaults for everything but id and goal.
    pub fn new(id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            max_steps: default_max_steps(),
            constraints: Vec::new(),
            success_criteria: Vec::new(),
            allowed_tools: None,
            requires_approval: false,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_success_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.success_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constraints<I, S>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// The grouping key used by mission memory and the monitor.
    pub fn mission_type(&self) -> &str {
        &self.id
    }

    /// Return true if `tool` may be called during this mission.
    ///
    /// Without an explicit allow-list every tool is permitted. With one, the
    /// tool must be listed or belong to the `implicit` always-allowed set.
    pub fn allows(&self, tool: &str, implicit: &[String]) -> bool {
        match &self.allowed_tools {
            None => true,
            Some(list) => {
                list.iter().any(|t| t == tool) || implicit.iter().any(|t| t == tool)
            }
        }
    }

    /// Filter `names` down to the tools this mission may call.
    pub fn visible_tools<'a>(&self, names: &'a [String], implicit: &[String]) -> Vec<&'a String> {
        names.iter().filter(|n| self.allows(n, implicit)).collect()
    }
}
