//! Per-run execution state and terminal outcomes.
//!
//! `AgentState` is what a planner sees each iteration. `MissionOutcome` is
//! what the runtime returns once the loop terminates, regardless of which
//! path terminated it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{mission::Mission, thought::Thought, tool::ToolResult};

/// Unique identifier for one persisted mission execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable scratch space for one mission run.
///
/// Tool handlers read and write it between steps. Keys iterate in sorted
/// order, so serialized contexts are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inputs.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.inputs.remove(key)
    }
}

/// One loop iteration's record.
///
/// `result` is absent only when the step never reached execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub thought: Thought,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

impl AgentStep {
    pub fn tool_name(&self) -> Option<&str> {
        self.thought.tool_call().map(|c| c.tool.as_str())
    }

    pub fn succeeded(&self) -> bool {
        self.result.as_ref().map(|r| r.success).unwrap_or(false)
    }
}

/// Planner input: the mission, its context, and the history so far.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub mission: Mission,
    pub context: ExecutionContext,
    /// Append-only within a run.
    pub steps: Vec<AgentStep>,
}

impl AgentState {
    pub fn new(mission: Mission, context: ExecutionContext) -> Self {
        Self {
            mission,
            context,
            steps: Vec::new(),
        }
    }

    pub fn last_step(&self) -> Option<&AgentStep> {
        self.steps.last()
    }
}

/// The lifecycle status of a mission run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Running,
    Succeeded,
    Failed,
    Blocked,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Running => "running",
            MissionStatus::Succeeded => "succeeded",
            MissionStatus::Failed => "failed",
            MissionStatus::Blocked => "blocked",
        }
    }

    /// Parse a persisted status string. Unknown values map to `Failed`.
    pub fn parse(s: &str) -> Self {
        match s {
            "running" => MissionStatus::Running,
            "succeeded" => MissionStatus::Succeeded,
            "blocked" => MissionStatus::Blocked,
            _ => MissionStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MissionStatus::Running)
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final verdict on a mission run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionOutcome {
    pub status: MissionStatus,
    pub steps: Vec<AgentStep>,
    /// Always present and human-readable, whichever path produced the outcome.
    pub summary: String,
}

impl MissionOutcome {
    pub fn new(status: MissionStatus, steps: Vec<AgentStep>, summary: impl Into<String>) -> Self {
        Self {
            status,
            steps,
            summary: summary.into(),
        }
    }

    /// An outcome for a run that faulted before producing any history.
    pub fn failed(summary: impl Into<String>) -> Self {
        Self::new(MissionStatus::Failed, Vec::new(), summary)
    }

    /// Tool names of every action step, in order.
    pub fn tool_sequence(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|s| s.tool_name().map(str::to_string))
            .collect()
    }

    /// Number of steps that reached the tool layer.
    pub fn tool_call_count(&self) -> usize {
        self.steps.iter().filter(|s| s.result.is_some()).count()
    }
}

/// Token consumption reported by model-backed planners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}
