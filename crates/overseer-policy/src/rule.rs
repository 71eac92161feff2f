//! Risk policy rules and configuration schema.
//!
//! A `RiskPolicy` is deserialized from TOML and holds an ordered list of
//! `RiskRule`s that reclassify tools for one deployment. Rules are evaluated
//! in declaration order and the first matching rule wins. If no rule
//! matches, the tool keeps the risk it was registered with.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    tool::RiskLevel,
};

/// A single risk override loaded from TOML.
///
/// The `tool` pattern is one of:
/// - an exact tool name (`"kb.delete_document"`)
/// - `"*"`, which matches any tool
/// - a namespace prefix ending in `".*"` (`"kb.*"` matches `kb.search`
///   and `kb.delete_document`, but not `kbx.search`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRule {
    /// Stable identifier used in logs.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Tool name pattern.
    pub tool: String,

    /// The risk this rule assigns when it matches.
    pub risk: RiskLevel,
}

impl RiskRule {
    pub fn matches(&self, tool: &str) -> bool {
        if self.tool == "*" {
            return true;
        }
        match self.tool.strip_suffix(".*") {
            Some(prefix) => tool
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.')),
            None => self.tool == tool,
        }
    }
}

/// The top-level structure deserialized from a TOML risk policy file.
///
/// Example:
/// ```toml
/// [[rules]]
/// id = "kb-writes-need-review"
/// description = "Knowledge base writes are reviewed in production"
/// tool = "kb.*"
/// risk = "review"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Ordered list of rules. First match wins.
    #[serde(default)]
    pub rules: Vec<RiskRule>,
}

impl RiskPolicy {
    /// A policy with no overrides.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse `s` as TOML.
    ///
    /// Returns `OverseerError::ConfigError` if the TOML is malformed or does
    /// not match the `RiskPolicy` schema (including unknown risk levels).
    pub fn from_toml_str(s: &str) -> OverseerResult<Self> {
        toml::from_str(s).map_err(|e| OverseerError::ConfigError {
            reason: format!("failed to parse risk policy TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as a TOML risk policy.
    pub fn from_file(path: &Path) -> OverseerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| OverseerError::ConfigError {
            reason: format!("failed to read risk policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The first rule matching `tool`, if any.
    pub fn rule_for(&self, tool: &str) -> Option<&RiskRule> {
        self.rules.iter().find(|rule| rule.matches(tool))
    }

    /// The risk to apply to `tool`: the first matching override, otherwise
    /// the tool's `declared` risk.
    pub fn effective_risk(&self, tool: &str, declared: RiskLevel) -> RiskLevel {
        match self.rule_for(tool) {
            Some(rule) => {
                debug!(
                    rule_id = %rule.id,
                    tool = %tool,
                    declared = %declared,
                    effective = %rule.risk,
                    "risk override applied"
                );
                rule.risk
            }
            None => declared,
        }
    }
}
