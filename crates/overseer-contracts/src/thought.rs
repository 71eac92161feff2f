//! Planning decisions.
//!
//! A planner produces exactly one `Thought` per loop iteration. `Action`
//! carries the `ToolCall` by construction, so an action without a call cannot
//! be represented.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A requested tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Registered tool name.
    pub tool: String,
    /// Named arguments, validated against the tool's schema before execution.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }

    /// Build a call from a JSON value. Non-object values yield no arguments.
    pub fn from_value(tool: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(tool, arguments)
    }
}

/// One planning decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Thought {
    /// Invoke a tool.
    Action {
        /// Free-text rationale.
        content: String,
        call: ToolCall,
    },
    /// Stop and hand the history to the evaluator.
    Finish {
        /// Free-text summary of what the planner believes it achieved.
        content: String,
    },
}

impl Thought {
    pub fn action(content: impl Into<String>, call: ToolCall) -> Self {
        Thought::Action {
            content: content.into(),
            call,
        }
    }

    pub fn finish(content: impl Into<String>) -> Self {
        Thought::Finish {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Thought::Action { content, .. } | Thought::Finish { content } => content,
        }
    }

    pub fn tool_call(&self) -> Option<&ToolCall> {
        match self {
            Thought::Action { call, .. } => Some(call),
            Thought::Finish { .. } => None,
        }
    }

    /// Stable discriminant used in persisted step rows ("action" / "finish").
    pub fn kind(&self) -> &'static str {
        match self {
            Thought::Action { .. } => "action",
            Thought::Finish { .. } => "finish",
        }
    }
}
