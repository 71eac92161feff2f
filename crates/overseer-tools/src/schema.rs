//! Argument schema validation.
//!
//! Tool arguments are validated against the tool's declared JSON Schema with
//! the `jsonschema` crate before a handler may run. Validation collects every
//! violation so a planner sees the full picture in one failed result.

use serde_json::{Map, Value};
use tracing::debug;

use overseer_contracts::error::{OverseerError, OverseerResult};

/// A compiled argument schema.
///
/// A `null` document means "no structural constraint": every argument map
/// is accepted.
pub struct ArgumentSchema {
    document: Value,
    validator: Option<jsonschema::Validator>,
}

impl ArgumentSchema {
    /// Compile `document`.
    ///
    /// A malformed schema document is a configuration error and is rejected
    /// here, at registration time, rather than on the first call.
    pub fn compile(document: Value) -> OverseerResult<Self> {
        if document.is_null() {
            return Ok(Self {
                document,
                validator: None,
            });
        }

        let validator = jsonschema::validator_for(&document).map_err(|e| {
            OverseerError::SchemaValidation {
                reason: format!("invalid JSON Schema document: {e}"),
            }
        })?;

        Ok(Self {
            document,
            validator: Some(validator),
        })
    }

    /// The schema document as declared.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Validate `arguments`, returning one message per violation.
    pub fn violations(&self, arguments: &Map<String, Value>) -> Vec<String> {
        let Some(validator) = &self.validator else {
            return Vec::new();
        };

        let instance = Value::Object(arguments.clone());
        let violations: Vec<String> = validator
            .iter_errors(&instance)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{path}: {error}")
                }
            })
            .collect();

        debug!(violations = violations.len(), "argument validation complete");
        violations
    }
}

impl std::fmt::Debug for ArgumentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentSchema")
            .field("document", &self.document)
            .finish()
    }
}
