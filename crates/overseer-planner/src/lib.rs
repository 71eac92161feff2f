//! # overseer-planner
//!
//! Planning strategies for the OVERSEER runtime. Each implements
//! [`Planner`](overseer_core::traits::Planner):
//!
//! - [`ScriptedPlanner`] replays pre-built steps, optionally loaded from a
//!   [`PlanFile`] with context placeholders.
//! - [`GoalTreePlanner`] validates a goal tree and replays it depth-first.
//! - [`ModelPlanner`] asks a [`CompletionClient`] for each next step.

pub mod goal_tree;
pub mod model;
pub mod plan_file;
pub mod scripted;

pub use goal_tree::{validate_goal_tree, Goal, GoalTreePlanner, PlannedAction, TreeReport, DEFAULT_MAX_DEPTH};
pub use model::{
    ChatMessage, CompletionClient, CompletionRequest, CompletionResponse, FunctionCall, FunctionSpec,
    ModelPlanner,
};
pub use plan_file::PlanFile;
pub use scripted::{ScriptedPlanner, ScriptedStep, DEFAULT_FINISH};
