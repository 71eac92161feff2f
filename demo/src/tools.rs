//! In-process knowledge-base tools for the demo.
//!
//! The documents live in a shared map so scenarios can inspect what the
//! agent actually changed.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Map, Value};

use overseer_contracts::{
    error::OverseerResult,
    execution::ExecutionContext,
    tool::{RiskLevel, ToolResult},
};
use overseer_tools::{HandlerError, HandlerOutput, ToolDefinition, ToolRegistry};

pub type DocStore = Arc<Mutex<BTreeMap<String, String>>>;

pub fn seeded_store() -> DocStore {
    let docs = [
        ("docs/intro.md", "Welcome to the handbook. Start with setup."),
        ("docs/setup.md", "Install the toolchain, then run the bootstrap script."),
        ("docs/legacy-deploy.md", "Deprecated: the old deploy process."),
    ];
    Arc::new(Mutex::new(
        docs.into_iter()
            .map(|(path, body)| (path.to_string(), body.to_string()))
            .collect(),
    ))
}

fn lock(store: &DocStore) -> Result<MutexGuard<'_, BTreeMap<String, String>>, HandlerError> {
    store
        .lock()
        .map_err(|e| format!("document store poisoned: {}", e).into())
}

fn text<'a>(args: &'a Map<String, Value>, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn path_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "path": { "type": "string", "minLength": 1 } },
        "required": ["path"],
        "additionalProperties": false
    })
}

/// Every demo tool, registered against `store`.
pub fn demo_registry(store: &DocStore) -> OverseerResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    let docs = Arc::clone(store);
    registry.register(ToolDefinition::new(
        "kb.search",
        "Find documents whose path or body mentions the query",
        json!({
            "type": "object",
            "properties": { "query": { "type": "string", "minLength": 1 } },
            "required": ["query"]
        }),
        RiskLevel::Safe,
        move |args, ctx: &mut ExecutionContext| {
            let query = text(args, "query").to_lowercase();
            let hits: Vec<String> = lock(&docs)?
                .iter()
                .filter(|(path, body)| {
                    path.to_lowercase().contains(&query) || body.to_lowercase().contains(&query)
                })
                .map(|(path, _)| path.clone())
                .collect();
            ctx.set("last_search", json!(hits));
            Ok(HandlerOutput::Value(json!({ "hits": hits })))
        },
    )?)?;

    let docs = Arc::clone(store);
    registry.register(ToolDefinition::new(
        "kb.read",
        "Read one document",
        path_schema(),
        RiskLevel::Safe,
        move |args, _ctx| {
            let path = text(args, "path");
            let output = match lock(&docs)?.get(path) {
                Some(body) => HandlerOutput::Value(json!(body)),
                None => ToolResult::failure(format!("no document at '{}'", path)).into(),
            };
            Ok(output)
        },
    )?)?;

    let docs = Arc::clone(store);
    registry.register(ToolDefinition::new(
        "kb.write",
        "Create or replace a document",
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "minLength": 1 },
                "content": { "type": "string" }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        }),
        RiskLevel::Review,
        move |args, _ctx| {
            let path = text(args, "path").to_string();
            let existed = lock(&docs)?
                .insert(path.clone(), text(args, "content").to_string())
                .is_some();
            let verb = if existed { "updated" } else { "created" };
            Ok(HandlerOutput::Value(json!(format!("{} {}", verb, path))))
        },
    )?)?;

    let docs = Arc::clone(store);
    registry.register(ToolDefinition::new(
        "kb.delete",
        "Delete a document permanently",
        path_schema(),
        RiskLevel::Destructive,
        move |args, _ctx| {
            let path = text(args, "path");
            let output = match lock(&docs)?.remove(path) {
                Some(_) => HandlerOutput::Value(json!(format!("deleted {}", path))),
                None => ToolResult::failure(format!("no document at '{}'", path)).into(),
            };
            Ok(output)
        },
    )?)?;

    registry.register(ToolDefinition::new(
        "session.run",
        "Run a command in the agent's sandboxed session",
        json!({
            "type": "object",
            "properties": { "command": { "type": "string", "minLength": 1 } },
            "required": ["command"]
        }),
        RiskLevel::Safe,
        |args, ctx| {
            let command = text(args, "command");
            ctx.set("last_command", command);
            Ok(HandlerOutput::Value(json!(format!("ran '{}' (dry run)", command))))
        },
    )?)?;

    Ok(registry)
}
