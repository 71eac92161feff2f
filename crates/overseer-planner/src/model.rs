//! Model-driven planning.
//!
//! `ModelPlanner` turns the mission and its history into a chat
//! conversation, advertises the mission's allowed tools as callable
//! functions, and converts the completion into a `Thought`. The transport is
//! behind `CompletionClient`; no HTTP client lives in this crate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::{AgentState, TokenUsage},
    mission::DEFAULT_IMPLICIT_TOOLS,
    thought::{Thought, ToolCall},
    tool::ToolSpec,
};
use overseer_core::traits::Planner;

// ── Wire types ───────────────────────────────────────────────────────────────

/// A function invocation requested by the model. `arguments` is raw JSON
/// text, exactly as the service returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// One conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    /// Function name, on `function` role messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            function_call: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            function_call: None,
            name: None,
        }
    }

    pub fn assistant_call(content: impl Into<String>, call: FunctionCall) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            function_call: Some(call),
            name: None,
        }
    }

    pub fn function_result(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            role: "function".to_string(),
            content: Some(result.into()),
            function_call: None,
            name: Some(name.into()),
        }
    }
}

/// A tool advertised as a callable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolSpec> for FunctionSpec {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: if spec.parameters.is_null() {
                serde_json::json!({ "type": "object", "properties": {} })
            } else {
                spec.parameters.clone()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            }),
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = TokenUsage {
            prompt_tokens,
            completion_tokens,
        };
        self
    }
}

/// The external completion service.
pub trait CompletionClient: Send {
    fn complete(&self, request: &CompletionRequest) -> OverseerResult<CompletionResponse>;
}

// ── Planner ──────────────────────────────────────────────────────────────────

pub struct ModelPlanner {
    client: Box<dyn CompletionClient>,
    tools: Vec<ToolSpec>,
    implicit_tools: Vec<String>,
    usage: TokenUsage,
}

impl ModelPlanner {
    /// `tools` is every registered tool; the mission's allow-list narrows it
    /// per run.
    pub fn new(client: Box<dyn CompletionClient>, tools: Vec<ToolSpec>) -> Self {
        Self {
            client,
            tools,
            implicit_tools: DEFAULT_IMPLICIT_TOOLS.iter().map(|s| s.to_string()).collect(),
            usage: TokenUsage::default(),
        }
    }

    /// Must match the runtime's implicit set.
    pub fn with_implicit_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implicit_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    fn allowed<'a>(&'a self, state: &'a AgentState) -> impl Iterator<Item = &'a ToolSpec> + 'a {
        self.tools
            .iter()
            .filter(move |t| state.mission.allows(&t.name, &self.implicit_tools))
    }

    fn system_prompt(&self, state: &AgentState) -> String {
        let mission = &state.mission;
        let mut prompt = format!(
            "You are an autonomous agent working on mission '{}'.\n\nGoal: {}\n",
            mission.id, mission.goal
        );

        if !mission.constraints.is_empty() {
            prompt.push_str("\nConstraints:\n");
            for c in &mission.constraints {
                prompt.push_str(&format!("- {}\n", c));
            }
        }
        if !mission.success_criteria.is_empty() {
            prompt.push_str("\nSuccess criteria:\n");
            for c in &mission.success_criteria {
                prompt.push_str(&format!("- {}\n", c));
            }
        }

        let names: Vec<&str> = self.allowed(state).map(|t| t.name.as_str()).collect();
        prompt.push_str(&format!("\nAvailable tools: {}\n", names.join(", ")));
        prompt.push_str(&format!(
            "You have at most {} steps. Call one tool per reply. \
             When the goal is met, reply with a summary and no function call.",
            mission.max_steps
        ));
        prompt
    }

    /// The request for the next step.
    pub fn build_request(&self, state: &AgentState) -> CompletionRequest {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt(state)),
            ChatMessage::user(format!("Begin work on: {}", state.mission.goal)),
        ];

        for step in &state.steps {
            let Some(call) = step.thought.tool_call() else {
                continue;
            };
            let arguments = Value::Object(call.arguments.clone()).to_string();
            messages.push(ChatMessage::assistant_call(
                step.thought.content(),
                FunctionCall {
                    name: call.tool.clone(),
                    arguments,
                },
            ));
            let result = match &step.result {
                Some(r) if r.success => r.render(),
                Some(r) => format!("error: {}", r.render()),
                None => "not executed".to_string(),
            };
            messages.push(ChatMessage::function_result(&call.tool, result));
        }

        CompletionRequest {
            messages,
            functions: self.allowed(state).map(FunctionSpec::from).collect(),
        }
    }

    fn to_thought(&self, state: &AgentState, response: CompletionResponse) -> OverseerResult<Thought> {
        let Some(call) = response.function_call else {
            let summary = response
                .content
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "model finished without a summary".to_string());
            return Ok(Thought::finish(summary));
        };

        if !state.mission.allows(&call.name, &self.implicit_tools) {
            return Err(OverseerError::planning(format!(
                "model requested tool '{}' which is not allowed for mission '{}'",
                call.name, state.mission.id
            )));
        }

        let arguments: Map<String, Value> = if call.arguments.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                OverseerError::planning(format!(
                    "malformed arguments for tool '{}': {}",
                    call.name, e
                ))
            })?
        };

        let content = response
            .content
            .unwrap_or_else(|| format!("calling {}", call.name));
        Ok(Thought::action(content, ToolCall::new(call.name, arguments)))
    }
}

impl Planner for ModelPlanner {
    fn plan_next(&mut self, state: &AgentState) -> OverseerResult<Thought> {
        let request = self.build_request(state);
        debug!(
            mission_id = %state.mission.id,
            messages = request.messages.len(),
            functions = request.functions.len(),
            "requesting completion"
        );

        let response = self.client.complete(&request).map_err(|e| match e {
            OverseerError::PlanningFailed { .. } => e,
            other => OverseerError::planning(format!("completion service failed: {}", other)),
        })?;
        self.usage.add(response.usage);

        let thought = self.to_thought(state, response);
        if let Err(e) = &thought {
            warn!(mission_id = %state.mission.id, error = %e, "model response rejected");
        }
        thought
    }

    fn usage(&self) -> Option<TokenUsage> {
        Some(self.usage)
    }
}
