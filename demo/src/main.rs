//! OVERSEER runtime wiring demo
//!
//! Wires the workspace crates together against a small in-process knowledge
//! base. Three ways in:
//!
//!   cargo run -p overseer-demo -- scenarios
//!   cargo run -p overseer-demo -- run --mission demo/missions/setup-refresh.mission.yaml \
//!                                    --goals demo/missions/setup-refresh.goals.yaml --approver prompt
//!   cargo run -p overseer-demo -- serve --dir demo/missions --drain

mod scenarios;
mod tools;
mod wiring;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use overseer_audit::{verify_file, JsonlAuditSink};
use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::ExecutionContext,
    mission::Mission,
};
use overseer_core::{loader::load_mission, traits::Planner};
use overseer_deploy::{shutdown_signal, AgentDeployment, DeploymentConfig, Priority};
use overseer_planner::{GoalTreePlanner, PlanFile, DEFAULT_MAX_DEPTH};
use overseer_verify::CriteriaEvaluator;

use crate::tools::{demo_registry, seeded_store};
use crate::wiring::{build_runtime, load_policy, Approver};

// ── CLI definition ────────────────────────────────────────────────────────────

/// OVERSEER supervised agent runtime demo.
#[derive(Parser)]
#[command(
    name = "overseer-demo",
    about = "OVERSEER agent runtime demo",
    long_about = "Runs missions against demo knowledge-base tools, showing risk gating,\n\
                  hash-chained approval audit, mission memory and the deployment loop."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the three built-in scenarios.
    Scenarios,
    /// Run one mission file with a scripted plan or a goal tree.
    Run {
        #[arg(long)]
        mission: PathBuf,
        /// Scripted plan file (YAML or JSON).
        #[arg(long, conflicts_with = "goals")]
        plan: Option<PathBuf>,
        /// Goal tree file (YAML or JSON).
        #[arg(long, required_unless_present = "plan")]
        goals: Option<PathBuf>,
        /// Risk policy overrides (TOML).
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Append approval decisions to this JSON-lines trail.
        #[arg(long, default_value = "var/overseer/approvals.jsonl")]
        audit: PathBuf,
        #[arg(long, value_enum, default_value_t = Approver::Prompt)]
        approver: Approver,
        /// Context input as key=value; also fills plan placeholders.
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
    },
    /// Queue every `*.mission.yaml` in a directory and run the deployment loop.
    Serve {
        #[arg(long)]
        dir: PathBuf,
        /// Deployment config (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        policy: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Approver::None)]
        approver: Approver,
        /// Stop once every queued mission has been processed.
        #[arg(long)]
        drain: bool,
    },
}

fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    // Numbers, booleans and JSON literals keep their type; anything else is a string.
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::Scenarios => run_scenarios(),
        Command::Run {
            mission,
            plan,
            goals,
            policy,
            audit,
            approver,
            vars,
        } => run_mission(
            &mission,
            plan.as_deref(),
            goals.as_deref(),
            policy.as_deref(),
            &audit,
            approver,
            vars,
        ),
        Command::Serve {
            dir,
            config,
            policy,
            approver,
            drain,
        } => serve(&dir, config.as_deref(), policy.as_deref(), approver, drain),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── scenarios ─────────────────────────────────────────────────────────────────

fn run_scenarios() -> OverseerResult<()> {
    for report in scenarios::run_all()? {
        report.print();
    }
    Ok(())
}

// ── run ───────────────────────────────────────────────────────────────────────

fn run_mission(
    mission_path: &Path,
    plan: Option<&Path>,
    goals: Option<&Path>,
    policy: Option<&Path>,
    audit_path: &Path,
    approver: Approver,
    vars: Vec<(String, Value)>,
) -> OverseerResult<()> {
    let mission = load_mission(mission_path)?;
    let variables: BTreeMap<String, Value> = vars.into_iter().collect();
    let context = ExecutionContext {
        inputs: variables.clone(),
    };

    let store = seeded_store();
    let registry = demo_registry(&store)?;
    let mut planner: Box<dyn Planner> = match (plan, goals) {
        (Some(plan), _) => Box::new(PlanFile::load(plan, &variables)?.into_planner()),
        (None, Some(goals)) => {
            let available = registry.names().into_iter().collect();
            let planner = GoalTreePlanner::from_file(goals, &available, DEFAULT_MAX_DEPTH)?;
            for warning in &planner.report().warnings {
                warn!(%warning, "goal tree warning");
            }
            Box::new(planner)
        }
        (None, None) => return Err(OverseerError::config("either --plan or --goals is required")),
    };

    let audit = Arc::new(JsonlAuditSink::open(audit_path)?);
    let runtime = build_runtime(
        Arc::new(registry),
        load_policy(policy)?,
        approver.gate(),
        audit.clone(),
        Box::new(CriteriaEvaluator::new()),
    );

    let outcome = runtime.run(&mission, context, planner.as_mut())?;

    println!("mission : {}", mission.id);
    println!("status  : {}", outcome.status);
    println!("summary : {}", outcome.summary);
    println!("tools   : {}", outcome.tool_sequence().join(" -> "));
    println!(
        "audit   : {} ({})",
        audit.path().display(),
        if verify_file(audit.path())? { "chain intact" } else { "CHAIN BROKEN" }
    );
    Ok(())
}

// ── serve ─────────────────────────────────────────────────────────────────────

fn serve(
    dir: &Path,
    config: Option<&Path>,
    policy: Option<&Path>,
    approver: Approver,
    drain: bool,
) -> OverseerResult<()> {
    let config = match config {
        Some(path) => DeploymentConfig::from_file(path)?,
        None => DeploymentConfig::default(),
    };
    let missions = discover_missions(dir)?;

    let store = seeded_store();
    let audit = Arc::new(JsonlAuditSink::open(&config.audit_log_path)?);
    let runtime = build_runtime(
        Arc::new(demo_registry(&store)?),
        load_policy(policy)?,
        approver.gate(),
        audit.clone(),
        Box::new(CriteriaEvaluator::new()),
    );

    let plan_dir = dir.to_path_buf();
    let planners = move |mission: &Mission| -> OverseerResult<Box<dyn Planner>> {
        let path = plan_dir.join(format!("{}.plan.yaml", mission.id));
        Ok(Box::new(PlanFile::load(&path, &BTreeMap::new())?.into_planner()))
    };

    let token = CancellationToken::new();
    let deployment = Arc::new(
        AgentDeployment::new(config, runtime, planners, token.clone()).with_configured_stores()?,
    );

    let total = missions.len() as u64;
    for mission in missions {
        let id = mission.id.clone();
        if !deployment.submit(mission, ExecutionContext::new(), Priority::Normal) {
            warn!(mission_id = %id, "queue full, mission skipped");
        }
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| OverseerError::config(format!("failed to start async runtime: {}", e)))?;

    let stats = rt.block_on(async {
        tokio::spawn(shutdown_signal(token.clone()));
        if drain {
            let deployment = Arc::clone(&deployment);
            let token = token.clone();
            tokio::spawn(async move {
                while deployment.stats().processed < total && !token.is_cancelled() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                info!("queue drained");
                token.cancel();
            });
        }
        deployment.run().await
    });

    println!(
        "processed {} (succeeded {}, failed {}), deferred {}",
        stats.processed, stats.succeeded, stats.failed, stats.deferred
    );
    if let Some(report) = rt.block_on(deployment.health_check()) {
        println!(
            "health: {} ({:.0}% success over {} missions)",
            report.status,
            report.success_rate * 100.0,
            report.total
        );
        for recommendation in report.recommendations {
            println!("  - {}", recommendation);
        }
    }
    println!(
        "audit: {}",
        if verify_file(audit.path())? { "chain intact" } else { "CHAIN BROKEN" }
    );
    Ok(())
}

/// Every `*.mission.yaml` / `*.mission.json` under `dir`, sorted by file name.
fn discover_missions(dir: &Path) -> OverseerResult<Vec<Mission>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        OverseerError::config(format!("failed to read mission directory '{}': {}", dir.display(), e))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".mission.yaml") || n.ends_with(".mission.json"))
        })
        .collect();
    paths.sort();

    paths.iter().map(|path| load_mission(path)).collect()
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("OVERSEER — Supervised Agent Runtime");
    println!("===================================");
    println!();
    println!("Per step:");
    println!("  [1] Planner proposes a thought: an action or finish");
    println!("  [2] Mission allow-list check");
    println!("  [3] Safety validator: effective risk → auto-approve, callback, or deny");
    println!("  [4] Decision appended to the SHA-256 audit chain");
    println!("  [5] Arguments validated against the tool's JSON Schema, then executed");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_keeps_json_types() {
        assert_eq!(parse_var("limit=3").unwrap(), ("limit".to_string(), Value::from(3)));
        assert_eq!(
            parse_var("path=docs/setup.md").unwrap().1,
            Value::String("docs/setup.md".to_string())
        );
        assert!(parse_var("no-equals").is_err());
    }

    #[test]
    fn test_discover_missions_loads_sorted_mission_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mission.yaml"), "id: beta\ngoal: second\n").unwrap();
        std::fs::write(dir.path().join("a.mission.json"), r#"{"id":"alpha","goal":"first"}"#).unwrap();
        std::fs::write(dir.path().join("alpha.plan.yaml"), "steps: []\n").unwrap();

        let missions = discover_missions(dir.path()).unwrap();
        let ids: Vec<&str> = missions.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "beta"]);
    }
}
