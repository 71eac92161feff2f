//! Scripted plan files.
//!
//! A plan file is YAML or JSON:
//!
//! ```yaml
//! default_finish: docs refreshed
//! steps:
//!   - description: list stale pages
//!     tool: list_docs
//!     arguments:
//!       prefix: { context: docs_root }
//!   - description: done
//!     finish_summary: nothing left to do
//! ```
//!
//! Argument values shaped `{context: "<key>"}`, at any depth, are replaced by
//! the caller-supplied variable of that name while loading. A missing
//! variable fails the load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use overseer_contracts::error::{OverseerError, OverseerResult};
use overseer_core::loader::{parse_document, read_document, DocumentFormat};

use crate::scripted::{ScriptedPlanner, ScriptedStep, DEFAULT_FINISH};

/// A loaded plan with every placeholder resolved.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanFile {
    #[serde(default = "default_finish")]
    pub default_finish: String,
    #[serde(default)]
    pub steps: Vec<ScriptedStep>,
}

fn default_finish() -> String {
    DEFAULT_FINISH.to_string()
}

impl PlanFile {
    /// Load the plan at `path`, resolving placeholders from `variables`.
    pub fn load(path: &Path, variables: &BTreeMap<String, Value>) -> OverseerResult<Self> {
        let plan: PlanFile = read_document(path)?;
        plan.resolve(variables).map_err(|e| match e {
            OverseerError::ConfigError { reason } => {
                OverseerError::config(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    pub fn from_str(
        contents: &str,
        format: DocumentFormat,
        variables: &BTreeMap<String, Value>,
    ) -> OverseerResult<Self> {
        let plan: PlanFile = parse_document(contents, format)?;
        plan.resolve(variables)
    }

    fn resolve(mut self, variables: &BTreeMap<String, Value>) -> OverseerResult<Self> {
        for (index, step) in self.steps.iter_mut().enumerate() {
            for value in step.arguments.values_mut() {
                resolve_value(value, variables).map_err(|key| {
                    OverseerError::config(format!(
                        "step {} ('{}') references missing variable '{}'",
                        index + 1,
                        step.description,
                        key
                    ))
                })?;
            }
        }
        debug!(steps = self.steps.len(), "plan file resolved");
        Ok(self)
    }

    pub fn into_planner(self) -> ScriptedPlanner {
        ScriptedPlanner::new(self.steps).with_default_finish(self.default_finish)
    }
}

/// The placeholder key, if `map` is exactly `{context: "<key>"}`.
fn placeholder(map: &Map<String, Value>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get("context").and_then(Value::as_str)
}

/// Replace placeholders in place. `Err` carries the first missing key.
fn resolve_value(value: &mut Value, variables: &BTreeMap<String, Value>) -> Result<(), String> {
    match value {
        Value::Object(map) => {
            if let Some(key) = placeholder(map) {
                let resolved = variables.get(key).cloned().ok_or_else(|| key.to_string())?;
                *value = resolved;
                return Ok(());
            }
            for inner in map.values_mut() {
                resolve_value(inner, variables)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for inner in items.iter_mut() {
                resolve_value(inner, variables)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Write;

    use serde_json::{json, Value};

    use overseer_contracts::{
        error::OverseerError,
        execution::{AgentState, ExecutionContext},
        mission::Mission,
        thought::Thought,
    };
    use overseer_core::{loader::DocumentFormat, traits::Planner};

    use super::PlanFile;

    const PLAN: &str = r#"
default_finish: docs refreshed
steps:
  - description: list stale pages
    tool: list_docs
    arguments:
      prefix: { context: docs_root }
      filters:
        - owner: { context: team }
        - stale: true
  - description: stop here
    finish_summary: nothing left to do
"#;

    fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_placeholders_resolved_at_any_depth() {
        let plan = PlanFile::from_str(
            PLAN,
            DocumentFormat::Yaml,
            &vars(&[("docs_root", json!("handbook/")), ("team", json!("platform"))]),
        )
        .unwrap();

        let args = &plan.steps[0].arguments;
        assert_eq!(args["prefix"], json!("handbook/"));
        assert_eq!(args["filters"][0]["owner"], json!("platform"));
        assert_eq!(args["filters"][1]["stale"], json!(true));
        assert_eq!(plan.default_finish, "docs refreshed");
    }

    #[test]
    fn test_missing_variable_names_the_key() {
        let err = PlanFile::from_str(PLAN, DocumentFormat::Yaml, &vars(&[("docs_root", json!("x"))]))
            .unwrap_err();
        assert!(matches!(err, OverseerError::ConfigError { .. }));
        assert!(err.to_string().contains("'team'"));
    }

    /// A map with other keys next to "context" is plain data.
    #[test]
    fn test_context_key_among_others_is_not_a_placeholder() {
        let plan = PlanFile::from_str(
            r#"{ "steps": [ { "description": "d", "tool": "t",
                 "arguments": { "meta": { "context": "k", "extra": 1 } } } ] }"#,
            DocumentFormat::Json,
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(plan.steps[0].arguments["meta"]["context"], json!("k"));
    }

    #[test]
    fn test_loaded_plan_drives_planner() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(file, "{}", PLAN).unwrap();

        let mut planner = PlanFile::load(
            file.path(),
            &vars(&[("docs_root", json!("a/")), ("team", json!("b"))]),
        )
        .unwrap()
        .into_planner();

        let state = AgentState::new(Mission::new("m", "g"), ExecutionContext::new());
        assert_eq!(planner.plan_next(&state).unwrap().tool_call().unwrap().tool, "list_docs");
        assert_eq!(planner.plan_next(&state).unwrap(), Thought::finish("nothing left to do"));
        assert_eq!(planner.plan_next(&state).unwrap(), Thought::finish("docs refreshed"));
    }
}
