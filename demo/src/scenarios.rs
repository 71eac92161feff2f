//! Built-in scenarios, each a complete mission run against the demo tools.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;

use overseer_audit::InMemoryAuditSink;
use overseer_contracts::{
    error::OverseerResult,
    execution::{ExecutionContext, MissionOutcome},
    mission::Mission,
};
use overseer_planner::{Goal, GoalTreePlanner, ScriptedPlanner, ScriptedStep, DEFAULT_MAX_DEPTH};
use overseer_policy::{ApprovalGate, RiskPolicy};
use overseer_verify::{CriteriaEvaluator, StepOutcomeEvaluator};

use crate::tools::{demo_registry, seeded_store, DocStore};
use crate::wiring::build_runtime;

pub struct ScenarioReport {
    pub name: &'static str,
    pub outcome: MissionOutcome,
    pub audit: InMemoryAuditSink,
    pub store: DocStore,
}

impl ScenarioReport {
    pub fn print(&self) {
        println!("── {} ──", self.name);
        println!("  status : {}", self.outcome.status);
        println!("  summary: {}", self.outcome.summary);
        for (i, step) in self.outcome.steps.iter().enumerate() {
            let result = match &step.result {
                Some(r) if r.success => format!("ok: {}", r.render()),
                Some(r) => format!("failed: {}", r.render()),
                None => "not executed".to_string(),
            };
            println!(
                "  [{}] {} -> {}",
                i + 1,
                step.tool_name().unwrap_or("finish"),
                result
            );
        }
        println!(
            "  audit  : {} records, chain {}",
            self.audit.len(),
            if self.audit.verify_integrity() { "intact" } else { "BROKEN" }
        );
        for record in self.audit.records() {
            println!(
                "           {:?} {} by {} ({})",
                record.status, record.tool_name, record.approved_by, record.reason
            );
        }
        println!();
    }
}

/// Three read-only calls inside a three-step budget. Safe tools are
/// auto-approved and still audited.
pub fn read_only_survey() -> OverseerResult<ScenarioReport> {
    let store = seeded_store();
    let audit = InMemoryAuditSink::new();
    let runtime = build_runtime(
        Arc::new(demo_registry(&store)?),
        RiskPolicy::empty(),
        None,
        Arc::new(audit.clone()),
        Box::new(StepOutcomeEvaluator::new()),
    );

    let mission = Mission::new("handbook-survey", "survey the setup documentation")
        .with_max_steps(3)
        .with_allowed_tools(["kb.search", "kb.read"]);
    let mut planner = ScriptedPlanner::new([
        ScriptedStep::action("find setup pages", "kb.search", json!({ "query": "setup" })),
        ScriptedStep::action("read the intro", "kb.read", json!({ "path": "docs/intro.md" })),
        ScriptedStep::action("read the setup guide", "kb.read", json!({ "path": "docs/setup.md" })),
    ]);

    let outcome = runtime.run(&mission, ExecutionContext::new(), &mut planner)?;
    Ok(ScenarioReport {
        name: "read-only survey",
        outcome,
        audit,
        store,
    })
}

/// A destructive call with nobody to approve it is blocked before it runs.
pub fn unattended_delete() -> OverseerResult<ScenarioReport> {
    let store = seeded_store();
    let audit = InMemoryAuditSink::new();
    let runtime = build_runtime(
        Arc::new(demo_registry(&store)?),
        RiskPolicy::empty(),
        None,
        Arc::new(audit.clone()),
        Box::new(StepOutcomeEvaluator::new()),
    );

    let mission = Mission::new("stale-cleanup", "remove deprecated pages").with_max_steps(5);
    let mut planner = ScriptedPlanner::new([ScriptedStep::action(
        "delete the deprecated deploy page",
        "kb.delete",
        json!({ "path": "docs/legacy-deploy.md" }),
    )]);

    let outcome = runtime.run(&mission, ExecutionContext::new(), &mut planner)?;
    Ok(ScenarioReport {
        name: "unattended delete",
        outcome,
        audit,
        store,
    })
}

/// A goal tree that edits a page under a scripted reviewer, judged against
/// the mission's success criteria. The risk policy raises session commands
/// to review; the reviewer signs off on those and on writes.
pub fn supervised_refresh() -> OverseerResult<ScenarioReport> {
    let store = seeded_store();
    let audit = InMemoryAuditSink::new();
    let registry = demo_registry(&store)?;
    let available: BTreeSet<String> = registry.names().into_iter().collect();

    let policy = RiskPolicy::from_toml_str(
        r#"
        [[rules]]
        id = "session-commands-reviewed"
        description = "Commands run in the agent session are reviewed"
        tool = "session.*"
        risk = "review"
        "#,
    )?;
    let reviewer = ApprovalGate::scripted(false)
        .answer("kb.write", true)
        .answer("session.run", true);

    let runtime = build_runtime(
        Arc::new(registry),
        policy,
        Some(reviewer.into()),
        Arc::new(audit.clone()),
        Box::new(CriteriaEvaluator::new()),
    );

    let root = Goal::composite(
        "refresh the setup guide",
        vec![
            Goal::composite(
                "gather context",
                vec![
                    Goal::leaf("locate the guide", "kb.search", json!({ "query": "setup" })),
                    Goal::leaf("read the guide", "kb.read", json!({ "path": "docs/setup.md" })),
                ],
            ),
            Goal::leaf(
                "rewrite the guide",
                "kb.write",
                json!({
                    "path": "docs/setup.md",
                    "content": "Install the toolchain with rustup, then run `make bootstrap`."
                }),
            ),
            Goal::leaf("lint the docs", "session.run", json!({ "command": "lint docs/" })),
        ],
    );
    let mut planner = GoalTreePlanner::new(root, &available, DEFAULT_MAX_DEPTH)?;

    let mission = Mission::new("setup-refresh", "bring the setup guide up to date")
        .with_max_steps(6)
        .with_allowed_tools(["kb.search", "kb.read", "kb.write"])
        .with_success_criteria(["updated docs/setup.md"]);

    let outcome = runtime.run(&mission, ExecutionContext::new(), &mut planner)?;
    Ok(ScenarioReport {
        name: "supervised refresh",
        outcome,
        audit,
        store,
    })
}

pub fn run_all() -> OverseerResult<Vec<ScenarioReport>> {
    Ok(vec![read_only_survey()?, unattended_delete()?, supervised_refresh()?])
}
