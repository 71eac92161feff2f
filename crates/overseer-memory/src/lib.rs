//! # overseer-memory
//!
//! Persistent mission memory for the OVERSEER runtime.
//!
//! Every finished run is stored through an [`ExecutionRepository`], one
//! executions row plus one row per step. [`MissionMemory`] sits on top and
//! answers the questions a deployment asks of its history: what happened the
//! last few times this mission ran, and which tool sequences keep working.
//!
//! ```rust,ignore
//! let repo = Arc::new(SqliteExecutionRepository::open(Path::new("var/memory.db"))?);
//! let memory = MissionMemory::new(repo);
//! memory.record(&mission, &outcome)?;
//! for pattern in memory.extract_patterns(3)? {
//!     println!("{}: {:?}", pattern.mission_type, pattern.tool_sequence);
//! }
//! ```

pub mod mission_memory;
pub mod repository;
pub mod sqlite;

pub use mission_memory::{MissionMemory, SuccessPattern};
pub use repository::{
    ExecutionFilter, ExecutionRepository, ExecutionTrace, StoredExecution, ToolStatistics,
};
pub use sqlite::SqliteExecutionRepository;

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use overseer_contracts::{
        execution::{AgentStep, MissionOutcome, MissionStatus},
        mission::Mission,
        thought::{Thought, ToolCall},
        tool::ToolResult,
    };

    use super::*;

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn memory() -> MissionMemory {
        MissionMemory::new(Arc::new(SqliteExecutionRepository::in_memory().unwrap()))
    }

    fn step(tool: &str, result: Option<ToolResult>) -> AgentStep {
        AgentStep {
            thought: Thought::action(
                format!("use {tool}"),
                ToolCall::from_value(tool, json!({ "target": tool })),
            ),
            result,
        }
    }

    fn outcome(status: MissionStatus, tools: &[&str]) -> MissionOutcome {
        let steps = tools
            .iter()
            .map(|t| step(t, Some(ToolResult::ok(json!(format!("{t} ok"))))))
            .collect();
        MissionOutcome::new(status, steps, format!("{status} run"))
    }

    // ── Round trip ───────────────────────────────────────────────────────────

    #[test]
    fn test_record_round_trip() {
        let memory = memory();
        let mission = Mission::new("docs-sync", "sync the docs");
        let steps = vec![
            step("fetch", Some(ToolResult::ok(json!({ "pages": 3 })))),
            step("lint", Some(ToolResult::failure("2 warnings"))),
            step("publish", None),
        ];
        let original = MissionOutcome::new(MissionStatus::Blocked, steps, "tool 'publish' denied");

        let id = memory.record(&mission, &original).unwrap();
        let found = memory.find_similar("docs-sync", 10, None).unwrap();

        assert_eq!(found.len(), 1);
        let stored = &found[0];
        assert_eq!(stored.id, id);
        assert_eq!(stored.goal, "sync the docs");
        assert_eq!(stored.outcome.status, MissionStatus::Blocked);
        assert_eq!(stored.outcome.steps.len(), 3);
        assert_eq!(stored.outcome.tool_sequence(), vec!["fetch", "lint", "publish"]);
        assert_eq!(stored.outcome.steps[1].result.as_ref().unwrap().error.as_deref(), Some("2 warnings"));
        assert!(stored.outcome.steps[2].result.is_none());
        assert_eq!(stored.outcome, original);
    }

    #[test]
    fn test_find_similar_is_most_recent_first_and_limited() {
        let memory = memory();
        let mission = Mission::new("triage", "triage issues");
        for tool in ["first", "second", "third"] {
            memory.record(&mission, &outcome(MissionStatus::Succeeded, &[tool])).unwrap();
        }
        memory
            .record(&Mission::new("other", "x"), &outcome(MissionStatus::Succeeded, &["x"]))
            .unwrap();

        let found = memory.find_similar("triage", 2, None).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].outcome.tool_sequence(), vec!["third"]);
        assert_eq!(found[1].outcome.tool_sequence(), vec!["second"]);
    }

    #[test]
    fn test_find_similar_status_filter() {
        let memory = memory();
        let mission = Mission::new("triage", "triage issues");
        memory.record(&mission, &outcome(MissionStatus::Succeeded, &["a"])).unwrap();
        memory.record(&mission, &outcome(MissionStatus::Failed, &["b"])).unwrap();

        let failed = memory
            .find_similar("triage", 10, Some(MissionStatus::Failed))
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].outcome.status, MissionStatus::Failed);
    }

    // ── Patterns ─────────────────────────────────────────────────────────────

    #[test]
    fn test_extract_patterns_respects_threshold() {
        let memory = memory();
        let mission = Mission::new("release", "cut a release");

        for _ in 0..3 {
            memory
                .record(&mission, &outcome(MissionStatus::Succeeded, &["build", "tag"]))
                .unwrap();
        }
        memory
            .record(&mission, &outcome(MissionStatus::Succeeded, &["tag"]))
            .unwrap();
        memory
            .record(&mission, &outcome(MissionStatus::Failed, &["build"]))
            .unwrap();

        let patterns = memory.extract_patterns(2).unwrap();
        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.mission_type, "release");
        assert_eq!(pattern.tool_sequence, vec!["build", "tag"]);
        assert_eq!(pattern.occurrences, 3);
        assert!((pattern.success_rate - 0.6).abs() < 1e-9);
        assert!((pattern.avg_steps - 2.0).abs() < 1e-9);

        for pattern in memory.extract_patterns(1).unwrap() {
            assert!(pattern.occurrences >= 1);
            assert!((0.0..=1.0).contains(&pattern.success_rate));
        }
        assert!(memory.extract_patterns(4).unwrap().is_empty());
    }

    #[test]
    fn test_extract_patterns_sorted_by_rate_then_count() {
        let memory = memory();
        let steady = Mission::new("steady", "always works");
        let flaky = Mission::new("flaky", "sometimes works");

        memory.record(&steady, &outcome(MissionStatus::Succeeded, &["ping"])).unwrap();
        for _ in 0..2 {
            memory.record(&flaky, &outcome(MissionStatus::Succeeded, &["retry"])).unwrap();
        }
        memory.record(&flaky, &outcome(MissionStatus::Failed, &["retry"])).unwrap();

        let patterns = memory.extract_patterns(1).unwrap();
        assert_eq!(patterns[0].mission_type, "steady");
        assert_eq!(patterns[1].mission_type, "flaky");
        assert!(patterns[0].success_rate > patterns[1].success_rate);
    }

    #[test]
    fn test_patterns_read_step_rows_not_serialized_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let deploy = Mission::new("deploy", "ship it");
        let noop = Mission::new("noop", "nothing to do");

        let memory = MissionMemory::new(Arc::new(SqliteExecutionRepository::open(&path).unwrap()));
        for _ in 0..2 {
            memory
                .record(&deploy, &outcome(MissionStatus::Succeeded, &["build", "push"]))
                .unwrap();
        }
        memory
            .record(&noop, &MissionOutcome::new(MissionStatus::Succeeded, vec![], "done"))
            .unwrap();

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute("UPDATE executions SET serialized_steps = 'not json'", [])
            .unwrap();

        assert!(memory.find_similar("deploy", 5, None).is_err());

        let traces = memory.repository().traces().unwrap();
        assert_eq!(traces.len(), 3);
        assert_eq!(traces[0].tool_sequence, vec!["build", "push"]);
        assert_eq!(traces[2].mission_id, "noop");
        assert!(traces[2].tool_sequence.is_empty());
        assert_eq!(traces[2].step_count, 0);

        let patterns = memory.extract_patterns(2).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].mission_type, "deploy");
        assert_eq!(patterns[0].tool_sequence, vec!["build", "push"]);
        assert_eq!(patterns[0].occurrences, 2);
        assert!((patterns[0].avg_steps - 2.0).abs() < 1e-9);
    }

    // ── Statistics and persistence ───────────────────────────────────────────

    #[test]
    fn test_tool_statistics_skip_unexecuted_steps() {
        let memory = memory();
        let mission = Mission::new("ops", "run ops");
        let steps = vec![
            step("restart", Some(ToolResult::ok(json!("done")))),
            step("restart", Some(ToolResult::failure("timeout"))),
            step("purge", None),
        ];
        memory
            .record(&mission, &MissionOutcome::new(MissionStatus::Blocked, steps, "blocked"))
            .unwrap();

        let stats = memory.tool_statistics().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].tool_name, "restart");
        assert_eq!(stats[0].calls, 2);
        assert_eq!(stats[0].failures(), 1);
        assert!((stats[0].success_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/memory.db");
        let mission = Mission::new("nightly", "nightly checks");

        {
            let repo = Arc::new(SqliteExecutionRepository::open(&path).unwrap());
            MissionMemory::new(repo)
                .record(&mission, &outcome(MissionStatus::Succeeded, &["check"]))
                .unwrap();
        }

        let reopened = MissionMemory::new(Arc::new(SqliteExecutionRepository::open(&path).unwrap()));
        let found = reopened.find_similar("nightly", 5, None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].outcome.summary, "succeeded run");
    }
}
