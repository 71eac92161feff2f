//! Goal decomposition planning.
//!
//! A goal is either a leaf carrying one action or a composite carrying
//! ordered subgoals. A validated tree is flattened depth-first into scripted
//! steps; from then on planning is plain replay.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::AgentState,
    thought::Thought,
};
use overseer_core::{loader::read_document, traits::Planner};

use crate::scripted::{ScriptedPlanner, ScriptedStep};

/// Default ceiling on tree depth. The root is at depth 1.
pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<PlannedAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgoals: Vec<Goal>,
}

impl Goal {
    pub fn leaf(description: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            description: description.into(),
            action: Some(PlannedAction {
                tool: tool.into(),
                arguments: match arguments {
                    Value::Object(map) => map,
                    _ => Map::new(),
                },
            }),
            subgoals: Vec::new(),
        }
    }

    pub fn composite(description: impl Into<String>, subgoals: Vec<Goal>) -> Self {
        Self {
            description: description.into(),
            action: None,
            subgoals,
        }
    }

    /// Load a goal tree from a YAML or JSON file.
    pub fn load(path: &Path) -> OverseerResult<Self> {
        read_document(path)
    }
}

/// Non-fatal findings from validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeReport {
    pub warnings: Vec<String>,
}

/// Check a goal tree against the tools that exist and a depth ceiling.
///
/// Fatal: depth beyond `max_depth`, a goal with both an action and subgoals,
/// an action naming a tool outside `available_tools`. A leaf without an
/// action is only a warning.
pub fn validate_goal_tree(
    root: &Goal,
    available_tools: &BTreeSet<String>,
    max_depth: usize,
) -> OverseerResult<TreeReport> {
    let mut report = TreeReport::default();
    validate_goal(root, 1, available_tools, max_depth, &mut report)?;
    for warning in &report.warnings {
        warn!(%warning, "goal tree warning");
    }
    Ok(report)
}

fn validate_goal(
    goal: &Goal,
    depth: usize,
    available_tools: &BTreeSet<String>,
    max_depth: usize,
    report: &mut TreeReport,
) -> OverseerResult<()> {
    if depth > max_depth {
        return Err(OverseerError::PlanValidation {
            reason: format!(
                "goal '{}' sits at depth {}, beyond the maximum of {}",
                goal.description, depth, max_depth
            ),
        });
    }

    match (&goal.action, goal.subgoals.is_empty()) {
        (Some(_), false) => {
            return Err(OverseerError::PlanValidation {
                reason: format!(
                    "goal '{}' has both an action and subgoals",
                    goal.description
                ),
            });
        }
        (Some(action), true) => {
            if !available_tools.contains(&action.tool) {
                return Err(OverseerError::PlanValidation {
                    reason: format!(
                        "goal '{}' references unknown tool '{}'",
                        goal.description, action.tool
                    ),
                });
            }
        }
        (None, true) => report
            .warnings
            .push(format!("leaf goal '{}' has no action", goal.description)),
        (None, false) => {}
    }

    for subgoal in &goal.subgoals {
        validate_goal(subgoal, depth + 1, available_tools, max_depth, report)?;
    }
    Ok(())
}

/// Depth-first flattening of every action in the tree.
fn flatten(goal: &Goal, out: &mut Vec<ScriptedStep>) {
    if let Some(action) = &goal.action {
        out.push(ScriptedStep {
            description: goal.description.clone(),
            tool: Some(action.tool.clone()),
            arguments: action.arguments.clone(),
            finish_summary: None,
        });
    }
    for subgoal in &goal.subgoals {
        flatten(subgoal, out);
    }
}

/// Feedback handed to `revise`, kept for later inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub feedback: String,
    pub proposed: Vec<Goal>,
    pub recorded_at: DateTime<Utc>,
}

/// Replays a validated goal tree.
#[derive(Debug, Clone)]
pub struct GoalTreePlanner {
    root: Goal,
    report: TreeReport,
    inner: ScriptedPlanner,
    revisions: Vec<Revision>,
}

impl GoalTreePlanner {
    /// Validate `root` and build the planner. On a validation error nothing
    /// is constructed.
    pub fn new(root: Goal, available_tools: &BTreeSet<String>, max_depth: usize) -> OverseerResult<Self> {
        let report = validate_goal_tree(&root, available_tools, max_depth)?;

        let mut steps = Vec::new();
        flatten(&root, &mut steps);
        info!(
            goal = %root.description,
            actions = steps.len(),
            warnings = report.warnings.len(),
            "goal tree validated"
        );

        let inner = ScriptedPlanner::new(steps)
            .with_default_finish(format!("all goals completed: {}", root.description));

        Ok(Self {
            root,
            report,
            inner,
            revisions: Vec::new(),
        })
    }

    pub fn from_file(path: &Path, available_tools: &BTreeSet<String>, max_depth: usize) -> OverseerResult<Self> {
        Self::new(Goal::load(path)?, available_tools, max_depth)
    }

    pub fn root(&self) -> &Goal {
        &self.root
    }

    pub fn report(&self) -> &TreeReport {
        &self.report
    }

    /// Record feedback and proposed goals. The tree itself is left as is;
    /// dynamic re-planning is not implemented.
    pub fn revise(&mut self, feedback: impl Into<String>, new_goals: Vec<Goal>) {
        let feedback = feedback.into();
        debug!(%feedback, proposed = new_goals.len(), "goal tree revision recorded");
        self.revisions.push(Revision {
            feedback,
            proposed: new_goals,
            recorded_at: Utc::now(),
        });
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }
}

impl Planner for GoalTreePlanner {
    fn plan_next(&mut self, state: &AgentState) -> OverseerResult<Thought> {
        self.inner.plan_next(state)
    }
}
