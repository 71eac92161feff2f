//! # overseer-deploy
//!
//! Keeps an OVERSEER agent running against a backlog of missions.
//!
//! ```text
//!   producers ──enqueue──▶ MissionQueue ──poll──▶ worker
//!                                                  │
//!                              CircuitBreaker ◀────┤ permit?
//!                                                  │
//!                 spawn_blocking(AgentRuntime::run)┤
//!                                                  │
//!                       MissionMemory + AgentMonitor
//! ```
//!
//! Shutdown is a `CancellationToken` handed to the constructor; wire it to
//! the OS with [`shutdown_signal`].

pub mod breaker;
pub mod config;
pub mod queue;
pub mod service;
pub mod shutdown;

pub use breaker::{CircuitBreaker, CircuitState};
pub use config::DeploymentConfig;
pub use queue::{MissionQueue, Priority, QueuedMission};
pub use service::{AgentDeployment, DeploymentStats, PlannerFactory};
pub use shutdown::shutdown_signal;

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use overseer_contracts::{
        approval::ApprovalDecision,
        error::{OverseerError, OverseerResult},
        execution::{AgentStep, AgentState, ExecutionContext, MissionStatus},
        mission::Mission,
        thought::{Thought, ToolCall},
        tool::{RiskLevel, ToolResult, ToolSpec},
    };
    use overseer_core::{
        traits::{
            ActionGate, ApprovalRequest, Evaluation, EvaluationTrigger, Evaluator, Planner,
            ToolExecutor,
        },
        AgentRuntime,
    };
    use overseer_memory::{MissionMemory, SqliteExecutionRepository};
    use overseer_monitor::{AgentMonitor, MetricsRepository, SqliteMetricsRepository};

    use super::*;

    // ── Mocks ────────────────────────────────────────────────────────────────

    struct EchoTools;

    impl ToolExecutor for EchoTools {
        fn execute(&self, call: &ToolCall, _context: &mut ExecutionContext) -> OverseerResult<ToolResult> {
            Ok(ToolResult::ok(json!(call.tool.clone())))
        }

        fn risk_level(&self, _name: &str) -> Option<RiskLevel> {
            Some(RiskLevel::Safe)
        }

        fn specs(&self) -> Vec<ToolSpec> {
            Vec::new()
        }
    }

    struct AllowAll;

    impl ActionGate for AllowAll {
        fn approve(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
            Ok(ApprovalDecision::approve(request.risk, "test gate", "test"))
        }
    }

    struct FinishedMeansSuccess;

    impl Evaluator for FinishedMeansSuccess {
        fn evaluate(
            &self,
            _mission: &Mission,
            _context: &ExecutionContext,
            _steps: &[AgentStep],
            trigger: &EvaluationTrigger,
        ) -> OverseerResult<Evaluation> {
            Ok(match trigger {
                EvaluationTrigger::Finished { summary } => Evaluation::success(summary.clone()),
                EvaluationTrigger::BudgetExhausted => Evaluation::failure("out of steps"),
            })
        }
    }

    /// One ping call, then finish. Missions named `bad-*` fault instead.
    struct PingPlanner {
        faulty: bool,
    }

    impl Planner for PingPlanner {
        fn plan_next(&mut self, state: &AgentState) -> OverseerResult<Thought> {
            if self.faulty {
                return Err(OverseerError::planning("planner unavailable"));
            }
            if state.steps.is_empty() {
                Ok(Thought::action("ping", ToolCall::from_value("ping", json!({}))))
            } else {
                Ok(Thought::finish("pinged"))
            }
        }
    }

    /// `boom` panics inside the handler; `slow` blocks for a while.
    #[derive(Default)]
    struct HazardTools {
        slow_started: Arc<AtomicBool>,
    }

    impl ToolExecutor for HazardTools {
        fn execute(&self, call: &ToolCall, _context: &mut ExecutionContext) -> OverseerResult<ToolResult> {
            match call.tool.as_str() {
                "boom" => panic!("tool 'boom' exploded"),
                "slow" => {
                    self.slow_started.store(true, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(300));
                }
                _ => {}
            }
            Ok(ToolResult::ok(json!(call.tool.clone())))
        }

        fn risk_level(&self, _name: &str) -> Option<RiskLevel> {
            Some(RiskLevel::Safe)
        }

        fn specs(&self) -> Vec<ToolSpec> {
            Vec::new()
        }
    }

    /// Calls each tool in order, then finishes.
    struct CallPlanner {
        calls: VecDeque<&'static str>,
    }

    impl Planner for CallPlanner {
        fn plan_next(&mut self, _state: &AgentState) -> OverseerResult<Thought> {
            Ok(match self.calls.pop_front() {
                Some(tool) => Thought::action(format!("call {tool}"), ToolCall::from_value(tool, json!({}))),
                None => Thought::finish("calls done"),
            })
        }
    }

    fn calling(tools: &'static [&'static str]) -> impl PlannerFactory {
        move |_mission: &Mission| -> OverseerResult<Box<dyn Planner>> {
            Ok(Box::new(CallPlanner {
                calls: tools.iter().copied().collect(),
            }))
        }
    }

    fn hazard_runtime(tools: HazardTools) -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(tools),
            Box::new(AllowAll),
            Box::new(FinishedMeansSuccess),
        )
    }

    struct Stores {
        memory: Arc<MissionMemory>,
        metrics: Arc<SqliteMetricsRepository>,
        monitor: Arc<AgentMonitor>,
    }

    fn stores() -> Stores {
        let memory = Arc::new(MissionMemory::new(Arc::new(
            SqliteExecutionRepository::in_memory().unwrap(),
        )));
        let metrics = Arc::new(SqliteMetricsRepository::in_memory().unwrap());
        let monitor = Arc::new(AgentMonitor::new(metrics.clone()));
        Stores {
            memory,
            metrics,
            monitor,
        }
    }

    fn runtime() -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(EchoTools),
            Box::new(AllowAll),
            Box::new(FinishedMeansSuccess),
        )
    }

    fn factory() -> impl PlannerFactory {
        |mission: &Mission| -> OverseerResult<Box<dyn Planner>> {
            Ok(Box::new(PingPlanner {
                faulty: mission.id.starts_with("bad"),
            }))
        }
    }

    fn fast_config() -> DeploymentConfig {
        DeploymentConfig {
            poll_timeout_ms: 10,
            requeue_delay_ms: 10,
            ..DeploymentConfig::default()
        }
    }

    fn queued(id: &str, priority: Priority) -> QueuedMission {
        QueuedMission::new(Mission::new(id, "goal"), ExecutionContext::new(), priority)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..500 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    // ── Queue ────────────────────────────────────────────────────────────────

    #[test]
    fn test_queue_rejects_beyond_capacity() {
        let queue = MissionQueue::new(2);
        assert!(queue.enqueue(queued("a", Priority::Normal)));
        assert!(queue.enqueue(queued("b", Priority::Normal)));
        assert!(!queue.enqueue(queued("c", Priority::Critical)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_orders_by_priority_then_fifo() {
        let queue = MissionQueue::new(10);
        queue.enqueue(queued("low", Priority::Low));
        queue.enqueue(queued("normal-1", Priority::Normal));
        queue.enqueue(queued("critical", Priority::Critical));
        queue.enqueue(queued("normal-2", Priority::Normal));
        queue.enqueue(queued("high", Priority::High));

        let order: Vec<String> = std::iter::from_fn(|| queue.try_dequeue())
            .map(|q| q.mission.id)
            .collect();
        assert_eq!(order, vec!["critical", "high", "normal-1", "normal-2", "low"]);
    }

    #[test]
    fn test_requeue_bypasses_capacity_and_goes_last_in_tier() {
        let queue = MissionQueue::new(1);
        assert!(queue.enqueue(queued("waiting", Priority::Normal)));

        queue.requeue(queued("deferred", Priority::Normal));
        assert_eq!(queue.len(), 2);

        let waiting = queue.try_dequeue().unwrap();
        assert_eq!(waiting.mission_id(), "waiting");
        let deferred = queue.try_dequeue().unwrap();
        assert_eq!(deferred.mission_id(), "deferred");
        assert_eq!(deferred.attempts, 1);
        assert!(deferred.sequence > waiting.sequence);

        // A second deferral takes a fresh place in line.
        let first_sequence = deferred.sequence;
        queue.requeue(deferred);
        let again = queue.try_dequeue().unwrap();
        assert_eq!(again.attempts, 2);
        assert!(again.sequence > first_sequence);
    }

    #[tokio::test]
    async fn test_poll_times_out_when_empty() {
        let queue = MissionQueue::new(1);
        assert!(queue.poll(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn test_poll_wakes_on_enqueue() {
        let queue = Arc::new(MissionQueue::new(4));
        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                queue.enqueue(queued("late", Priority::Low))
            })
        };

        let item = queue.poll(Duration::from_secs(5)).await;
        assert_eq!(item.unwrap().mission.id, "late");
        assert!(producer.await.unwrap());
    }

    // ── Config ───────────────────────────────────────────────────────────────

    #[test]
    fn test_config_defaults_and_overrides() {
        let config = DeploymentConfig::from_toml_str(
            "max_queue_size = 5\nfailure_threshold = 2\ncost_per_1k_tokens = 0.25\n",
        )
        .unwrap();
        assert_eq!(config.max_queue_size, 5);
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.cost_per_1k_tokens, Some(0.25));
        assert_eq!(config.poll_timeout(), Duration::from_millis(1000));
        assert_eq!(config.requeue_delay(), Duration::from_millis(5000));
        assert_eq!(config.recovery_timeout(), Duration::from_secs(300));
        assert_eq!(config.health_lookback_hours, 24);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let err = DeploymentConfig::from_toml_str("max_queue_size = 0").unwrap_err();
        assert!(matches!(err, OverseerError::ConfigError { .. }));

        let err = DeploymentConfig::from_toml_str("max_queue_size = \"lots\"").unwrap_err();
        assert!(err.to_string().contains("deployment config"));

        for hours in ["0", "87601", "10000000000"] {
            let err = DeploymentConfig::from_toml_str(&format!("health_lookback_hours = {hours}"))
                .unwrap_err();
            assert!(err.to_string().contains("health_lookback_hours"), "{hours}: {err}");
        }
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        std::fs::write(&path, "memory_db_path = \"state/mem.db\"\n").unwrap();

        let config = DeploymentConfig::from_file(&path).unwrap();
        assert_eq!(config.memory_db_path, std::path::PathBuf::from("state/mem.db"));
        assert!(DeploymentConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    // ── Service ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_run_processes_and_records_until_shutdown() {
        let token = CancellationToken::new();
        let memory = Arc::new(MissionMemory::new(Arc::new(
            SqliteExecutionRepository::in_memory().unwrap(),
        )));
        let monitor = Arc::new(AgentMonitor::new(Arc::new(
            SqliteMetricsRepository::in_memory().unwrap(),
        )));
        let deployment = Arc::new(
            AgentDeployment::new(fast_config(), runtime(), factory(), token.clone())
                .with_memory(Arc::clone(&memory))
                .with_monitor(Arc::clone(&monitor)),
        );

        assert!(deployment.submit(Mission::new("good-1", "g"), ExecutionContext::new(), Priority::Normal));
        assert!(deployment.submit(Mission::new("bad-1", "b"), ExecutionContext::new(), Priority::High));

        let worker = {
            let deployment = Arc::clone(&deployment);
            tokio::spawn(async move { deployment.run().await })
        };
        wait_until(|| deployment.stats().processed == 2).await;
        token.cancel();
        let stats = worker.await.unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);

        let good = memory.find_similar("good-1", 5, None).unwrap();
        assert_eq!(good[0].outcome.status, MissionStatus::Succeeded);
        assert_eq!(good[0].outcome.tool_sequence(), vec!["ping"]);
        let bad = memory.find_similar("bad-1", 5, None).unwrap();
        assert_eq!(bad[0].outcome.status, MissionStatus::Failed);
        assert!(bad[0].outcome.summary.contains("planner unavailable"));

        let health = deployment.health_check().await.unwrap();
        assert_eq!(health.total, 2);
        assert_eq!(health.failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_mission_is_recorded_as_failed() {
        let token = CancellationToken::new();
        let stores = stores();
        let deployment = Arc::new(
            AgentDeployment::new(
                fast_config(),
                hazard_runtime(HazardTools::default()),
                calling(&["boom"]),
                token.clone(),
            )
            .with_memory(Arc::clone(&stores.memory))
            .with_monitor(Arc::clone(&stores.monitor)),
        );
        deployment.submit(Mission::new("crashy", "c"), ExecutionContext::new(), Priority::Normal);

        let worker = {
            let deployment = Arc::clone(&deployment);
            tokio::spawn(async move { deployment.run().await })
        };
        wait_until(|| deployment.stats().processed == 1).await;
        token.cancel();
        let stats = worker.await.unwrap();

        assert_eq!(stats.failed, 1);
        let recorded = stores.memory.find_similar("crashy", 5, None).unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].outcome.status, MissionStatus::Failed);
        assert!(recorded[0].outcome.summary.contains("exploded"));

        let health = deployment.health_check().await.unwrap();
        assert_eq!(health.total, 1);
        assert_eq!(health.failed, 1);
    }

    /// Tools that ran before an allow-list violation stay in the record.
    #[tokio::test]
    async fn test_protocol_fault_records_executed_steps() {
        let token = CancellationToken::new();
        let stores = stores();
        let deployment = Arc::new(
            AgentDeployment::new(
                fast_config(),
                hazard_runtime(HazardTools::default()),
                calling(&["write", "forbidden"]),
                token.clone(),
            )
            .with_memory(Arc::clone(&stores.memory))
            .with_monitor(Arc::clone(&stores.monitor)),
        );
        let mission = Mission::new("scoped", "s").with_allowed_tools(["write"]);
        deployment.submit(mission, ExecutionContext::new(), Priority::Normal);

        let worker = {
            let deployment = Arc::clone(&deployment);
            tokio::spawn(async move { deployment.run().await })
        };
        wait_until(|| deployment.stats().processed == 1).await;
        token.cancel();
        worker.await.unwrap();

        let recorded = stores.memory.find_similar("scoped", 5, None).unwrap();
        assert_eq!(recorded[0].outcome.status, MissionStatus::Failed);
        assert_eq!(recorded[0].outcome.tool_sequence(), vec!["write"]);
        assert!(recorded[0].outcome.summary.contains("forbidden"));

        let metrics = stores
            .metrics
            .since(chrono::Utc::now() - chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].tool_call_count, 1);
    }

    /// Cancelling mid-mission lets the running mission finish and be
    /// recorded; nothing further is dequeued.
    #[tokio::test]
    async fn test_in_flight_mission_finishes_before_exit() {
        let token = CancellationToken::new();
        let stores = stores();
        let tools = HazardTools::default();
        let started = Arc::clone(&tools.slow_started);
        let deployment = Arc::new(
            AgentDeployment::new(fast_config(), hazard_runtime(tools), calling(&["slow"]), token.clone())
                .with_memory(Arc::clone(&stores.memory)),
        );
        deployment.submit(Mission::new("long-1", "l"), ExecutionContext::new(), Priority::High);
        deployment.submit(Mission::new("long-2", "l"), ExecutionContext::new(), Priority::Low);

        let worker = {
            let deployment = Arc::clone(&deployment);
            tokio::spawn(async move { deployment.run().await })
        };
        wait_until(|| started.load(Ordering::SeqCst)).await;
        token.cancel();
        let stats = tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.succeeded, 1);
        let recorded = stores.memory.find_similar("long-1", 5, None).unwrap();
        assert_eq!(recorded[0].outcome.status, MissionStatus::Succeeded);
        assert_eq!(deployment.queue().len(), 1);
        assert_eq!(deployment.queue().try_dequeue().unwrap().mission.id, "long-2");
    }

    #[tokio::test]
    async fn test_open_breaker_defers_without_dropping() {
        let token = CancellationToken::new();
        let config = DeploymentConfig {
            failure_threshold: 1,
            recovery_timeout_secs: 3600,
            ..fast_config()
        };
        let deployment = Arc::new(AgentDeployment::new(config, runtime(), factory(), token.clone()));

        deployment.submit(Mission::new("bad-1", "b"), ExecutionContext::new(), Priority::Critical);
        deployment.submit(Mission::new("good-1", "g"), ExecutionContext::new(), Priority::Normal);

        let worker = {
            let deployment = Arc::clone(&deployment);
            tokio::spawn(async move { deployment.run().await })
        };
        wait_until(|| deployment.stats().deferred >= 2).await;
        token.cancel();
        let stats = worker.await.unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(deployment.breaker().state(), CircuitState::Open);
        assert_eq!(deployment.queue().len(), 1);
        assert_eq!(deployment.queue().try_dequeue().unwrap().mission.id, "good-1");
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let deployment = AgentDeployment::new(fast_config(), runtime(), factory(), token);
        deployment.submit(Mission::new("good-1", "g"), ExecutionContext::new(), Priority::Normal);

        let stats = deployment.run().await;
        assert_eq!(stats, DeploymentStats::default());
        assert_eq!(deployment.queue().len(), 1);
        assert!(deployment.health_check().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_signal_returns_when_token_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let listener = tokio::spawn(shutdown_signal(token.clone()));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap();
    }
}
