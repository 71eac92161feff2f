//! Loading of YAML/JSON definition documents.
//!
//! Mission files, scripted plan files and goal-tree files all share the same
//! rules: the format is chosen from the file extension, and every failure is
//! reported as a `ConfigError` naming the file.

use std::path::Path;

use serde::de::DeserializeOwned;

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    mission::Mission,
};

/// Supported document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.yml` / `.yaml` select YAML; anything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Parse `contents` as a `T` in the given format.
pub fn parse_document<T: DeserializeOwned>(
    contents: &str,
    format: DocumentFormat,
) -> OverseerResult<T> {
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str(contents)
            .map_err(|e| OverseerError::config(format!("invalid YAML document: {e}"))),
        DocumentFormat::Json => serde_json::from_str(contents)
            .map_err(|e| OverseerError::config(format!("invalid JSON document: {e}"))),
    }
}

/// Read and parse the document at `path`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> OverseerResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        OverseerError::config(format!("failed to read '{}': {}", path.display(), e))
    })?;
    parse_document(&contents, DocumentFormat::from_path(path)).map_err(|e| match e {
        OverseerError::ConfigError { reason } => {
            OverseerError::config(format!("{}: {}", path.display(), reason))
        }
        other => other,
    })
}

/// Check the invariants a mission definition must satisfy.
pub fn validate_mission(mission: &Mission) -> OverseerResult<()> {
    if mission.id.trim().is_empty() {
        return Err(OverseerError::config("mission id must not be empty"));
    }
    if mission.goal.trim().is_empty() {
        return Err(OverseerError::config(format!(
            "mission '{}' has an empty goal",
            mission.id
        )));
    }
    if mission.max_steps == 0 {
        return Err(OverseerError::config(format!(
            "mission '{}' must allow at least one step",
            mission.id
        )));
    }
    Ok(())
}

/// Parse and validate a mission definition.
pub fn parse_mission(contents: &str, format: DocumentFormat) -> OverseerResult<Mission> {
    let mission: Mission = parse_document(contents, format)?;
    validate_mission(&mission)?;
    Ok(mission)
}

/// Load and validate the mission definition file at `path`.
pub fn load_mission(path: &Path) -> OverseerResult<Mission> {
    let mission: Mission = read_document(path)?;
    validate_mission(&mission)?;
    Ok(mission)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn yaml_mission_parses() {
        let yaml = r#"
id: curate-docs
goal: Bring the docs index up to date
max_steps: 5
constraints: ["do not delete documents"]
success_criteria: ["index rebuilt"]
allowed_tools: [list_docs, rebuild_index]
requires_approval: true
"#;
        let mission = parse_mission(yaml, DocumentFormat::Yaml).unwrap();

        assert_eq!(mission.id, "curate-docs");
        assert_eq!(mission.max_steps, 5);
        assert_eq!(
            mission.allowed_tools,
            Some(vec!["list_docs".to_string(), "rebuild_index".to_string()])
        );
        assert!(mission.requires_approval);
    }

    #[test]
    fn zero_step_budget_is_rejected() {
        let err = parse_mission(
            r#"{ "id": "m", "goal": "g", "max_steps": 0 }"#,
            DocumentFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one step"));
    }

    #[test]
    fn empty_goal_is_rejected() {
        let err = parse_mission(r#"{ "id": "m", "goal": "  " }"#, DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, OverseerError::ConfigError { .. }));
    }

    #[test]
    fn load_mission_picks_format_from_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "id": "from-disk", "goal": "read me" }}"#).unwrap();

        let mission = load_mission(file.path()).unwrap();
        assert_eq!(mission.id, "from-disk");
    }

    #[test]
    fn malformed_file_error_names_the_path() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "id: [unclosed").unwrap();

        let err = load_mission(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
