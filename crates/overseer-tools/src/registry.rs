//! The tool registry.
//!
//! `ToolRegistry` owns every `ToolDefinition` and implements the
//! `ToolExecutor` trait from overseer-core. Execution runs in two phases:
//!
//! 1. **Validation**: the arguments are checked against the tool's JSON
//!    Schema. Violations produce a failed `ToolResult` and the handler is
//!    never called.
//! 2. **Invocation**: the handler runs. A handler `Err` is wrapped into
//!    `OverseerError::ToolInvocationFailed`, so callers can tell "the tool
//!    could not be invoked" apart from "the tool ran and failed".

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::ExecutionContext,
    thought::ToolCall,
    tool::{RiskLevel, ToolResult, ToolSpec},
};
use overseer_core::traits::ToolExecutor;

use crate::schema::ArgumentSchema;

/// The error type a handler may return. Any `Error`, `String` or `&str`
/// converts into it with `?` or `.into()`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler produces on a normal return.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// A plain value, reported as a successful result.
    Value(Value),
    /// A complete result, so a tool can report its own failure.
    Result(ToolResult),
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Value(value)
    }
}

impl From<ToolResult> for HandlerOutput {
    fn from(result: ToolResult) -> Self {
        HandlerOutput::Result(result)
    }
}

/// A registered handler. Receives validated arguments and the run's context.
pub type ToolHandler = Box<
    dyn Fn(&Map<String, Value>, &mut ExecutionContext) -> Result<HandlerOutput, HandlerError>
        + Send
        + Sync,
>;

/// A registrable capability.
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub risk: RiskLevel,
    schema: ArgumentSchema,
    handler: ToolHandler,
}

impl ToolDefinition {
    /// Build a definition. Fails if `parameters` is not a usable schema.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        risk: RiskLevel,
        handler: F,
    ) -> OverseerResult<Self>
    where
        F: Fn(&Map<String, Value>, &mut ExecutionContext) -> Result<HandlerOutput, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Ok(Self {
            name: name.into(),
            description: description.into(),
            risk,
            schema: ArgumentSchema::compile(parameters)?,
            handler: Box::new(handler),
        })
    }

    pub fn parameters(&self) -> &Value {
        self.schema.document()
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.document().clone(),
            risk: self.risk,
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("risk", &self.risk)
            .finish_non_exhaustive()
    }
}

/// Owns tool definitions and dispatches validated calls to their handlers.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition`. Names are unique; a second registration under
    /// the same name is rejected and the first definition is kept.
    pub fn register(&mut self, definition: ToolDefinition) -> OverseerResult<()> {
        if self.tools.contains_key(&definition.name) {
            return Err(OverseerError::DuplicateTool {
                name: definition.name,
            });
        }
        info!(tool = %definition.name, risk = %definition.risk, "tool registered");
        self.tools.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Every definition as a name/description/schema/risk spec, sorted by name.
    pub fn list(&self) -> Vec<ToolSpec> {
        self.tools.values().map(ToolDefinition::spec).collect()
    }

    /// Look up, validate, and invoke.
    pub fn execute(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        context: &mut ExecutionContext,
    ) -> OverseerResult<ToolResult> {
        let definition = self.tools.get(name).ok_or_else(|| OverseerError::ToolNotFound {
            name: name.to_string(),
        })?;

        // ── Phase 1: schema validation ───────────────────────────────────────
        let violations = definition.schema.violations(arguments);
        if !violations.is_empty() {
            let message = format!(
                "invalid arguments for tool '{}': {}",
                name,
                violations.join("; ")
            );
            warn!(tool = %name, %message, "argument validation failed");
            return Ok(ToolResult::failure(message));
        }

        // ── Phase 2: handler invocation ──────────────────────────────────────
        debug!(tool = %name, "invoking tool handler");
        match (definition.handler)(arguments, context) {
            Ok(HandlerOutput::Value(value)) => Ok(ToolResult::ok(value)),
            Ok(HandlerOutput::Result(result)) => Ok(result),
            Err(e) => {
                warn!(tool = %name, error = %e, "tool handler faulted");
                Err(OverseerError::ToolInvocationFailed {
                    tool: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl ToolExecutor for ToolRegistry {
    fn execute(&self, call: &ToolCall, context: &mut ExecutionContext) -> OverseerResult<ToolResult> {
        ToolRegistry::execute(self, &call.tool, &call.arguments, context)
    }

    fn risk_level(&self, name: &str) -> Option<RiskLevel> {
        self.tools.get(name).map(|t| t.risk)
    }

    fn specs(&self) -> Vec<ToolSpec> {
        self.list()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
