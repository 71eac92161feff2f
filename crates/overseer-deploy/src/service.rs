//! The always-on deployment worker.
//!
//! One consuming worker pulls missions off the queue, asks the circuit
//! breaker for a permit, runs the mission on a blocking thread and records
//! the outcome. Producers enqueue from anywhere through [`AgentDeployment::queue`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::{ExecutionContext, MissionOutcome, MissionStatus, TokenUsage},
    mission::Mission,
};
use overseer_core::{traits::Planner, AgentRuntime};
use overseer_memory::{MissionMemory, SqliteExecutionRepository};
use overseer_monitor::{
    AgentMonitor, HealthReport, HealthStatus, MissionMetrics, SqliteMetricsRepository,
};

use crate::{
    breaker::CircuitBreaker,
    config::DeploymentConfig,
    queue::{MissionQueue, Priority, QueuedMission},
};

/// Builds a fresh planner for each mission run.
pub trait PlannerFactory: Send + Sync {
    fn create(&self, mission: &Mission) -> OverseerResult<Box<dyn Planner>>;
}

impl<F> PlannerFactory for F
where
    F: Fn(&Mission) -> OverseerResult<Box<dyn Planner>> + Send + Sync,
{
    fn create(&self, mission: &Mission) -> OverseerResult<Box<dyn Planner>> {
        self(mission)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub deferred: u64,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Everything the blocking half of a mission run needs.
struct Worker {
    runtime: Arc<AgentRuntime>,
    planners: Arc<dyn PlannerFactory>,
    memory: Option<Arc<MissionMemory>>,
    monitor: Option<Arc<AgentMonitor>>,
    cost_per_1k_tokens: Option<f64>,
}

impl Worker {
    /// Run and record one mission. A panic inside the run is caught here so
    /// that it is recorded like any other failure.
    fn execute(&self, mission: &Mission, context: ExecutionContext) -> MissionOutcome {
        let started = Instant::now();
        let run = panic::catch_unwind(AssertUnwindSafe(|| self.run(mission, context)));
        let (outcome, usage) = run.unwrap_or_else(|payload| {
            let fault = OverseerError::QueueError {
                reason: format!(
                    "mission worker for '{}' panicked: {}",
                    mission.id,
                    panic_message(payload.as_ref())
                ),
            };
            error!(mission_id = %mission.id, error = %fault, "mission run panicked");
            (MissionOutcome::failed(fault.to_string()), None)
        });
        self.record(mission, &outcome, usage, started);
        outcome
    }

    fn run(
        &self,
        mission: &Mission,
        context: ExecutionContext,
    ) -> (MissionOutcome, Option<TokenUsage>) {
        let mut planner = match self.planners.create(mission) {
            Ok(planner) => planner,
            Err(e) => {
                error!(mission_id = %mission.id, error = %e, "planner could not be built");
                return (MissionOutcome::failed(e.to_string()), None);
            }
        };
        let outcome = match self.runtime.run_traced(mission, context, planner.as_mut()) {
            Ok(outcome) => outcome,
            Err(fault) => {
                error!(
                    mission_id = %mission.id,
                    error = %fault.error,
                    executed_steps = fault.steps.len(),
                    "mission run faulted"
                );
                fault.into_outcome()
            }
        };
        (outcome, planner.usage())
    }

    /// Storage faults are logged, never fatal.
    fn record(
        &self,
        mission: &Mission,
        outcome: &MissionOutcome,
        usage: Option<TokenUsage>,
        started: Instant,
    ) {
        if let Some(memory) = &self.memory {
            if let Err(e) = memory.record(mission, outcome) {
                error!(mission_id = %mission.id, error = %e, "failed to record mission memory");
            }
        }
        if let Some(monitor) = &self.monitor {
            let mut metrics = MissionMetrics::from_outcome(mission, outcome, started.elapsed());
            if let Some(usage) = usage {
                metrics = metrics.with_token_usage(usage, self.cost_per_1k_tokens);
            }
            if let Err(e) = monitor.record(&metrics) {
                error!(mission_id = %mission.id, error = %e, "failed to record mission metrics");
            }
        }
    }
}

pub struct AgentDeployment {
    config: DeploymentConfig,
    queue: Arc<MissionQueue>,
    breaker: CircuitBreaker,
    runtime: Arc<AgentRuntime>,
    planners: Arc<dyn PlannerFactory>,
    memory: Option<Arc<MissionMemory>>,
    monitor: Option<Arc<AgentMonitor>>,
    shutdown: CancellationToken,
    stats: Mutex<DeploymentStats>,
}

impl AgentDeployment {
    pub fn new(
        config: DeploymentConfig,
        runtime: AgentRuntime,
        planners: impl PlannerFactory + 'static,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue: Arc::new(MissionQueue::new(config.max_queue_size)),
            breaker: CircuitBreaker::new(config.failure_threshold, config.recovery_timeout()),
            runtime: Arc::new(runtime),
            planners: Arc::new(planners),
            memory: None,
            monitor: None,
            shutdown,
            stats: Mutex::new(DeploymentStats::default()),
            config,
        }
    }

    pub fn with_memory(mut self, memory: Arc<MissionMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<AgentMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Open the SQLite stores named in the config and attach them.
    pub fn with_configured_stores(self) -> OverseerResult<Self> {
        let memory = SqliteExecutionRepository::open(&self.config.memory_db_path)?;
        let metrics = SqliteMetricsRepository::open(&self.config.metrics_db_path)?;
        Ok(self
            .with_memory(Arc::new(MissionMemory::new(Arc::new(memory))))
            .with_monitor(Arc::new(AgentMonitor::new(Arc::new(metrics)))))
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<MissionQueue> {
        &self.queue
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> DeploymentStats {
        *self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn bump(&self, f: impl FnOnce(&mut DeploymentStats)) {
        f(&mut self.stats.lock().unwrap_or_else(|p| p.into_inner()));
    }

    /// Convenience wrapper over [`MissionQueue::enqueue`].
    pub fn submit(&self, mission: Mission, context: ExecutionContext, priority: Priority) -> bool {
        self.queue
            .enqueue(QueuedMission::new(mission, context, priority))
    }

    /// Score recent runs. `None` when no monitor is attached or the check
    /// itself failed.
    pub async fn health_check(&self) -> Option<HealthReport> {
        let monitor = self.monitor.clone()?;
        let lookback = self.config.health_lookback_hours;
        let report = tokio::task::spawn_blocking(move || monitor.check_health(lookback)).await;

        match report {
            Ok(Ok(report)) => {
                if report.status == HealthStatus::Unhealthy {
                    warn!(
                        success_rate = report.success_rate,
                        failed = report.failed,
                        recommendations = ?report.recommendations,
                        "agent unhealthy"
                    );
                }
                Some(report)
            }
            Ok(Err(e)) => {
                error!(error = %e, "health check failed");
                None
            }
            Err(e) => {
                error!(error = %e, "health check task panicked");
                None
            }
        }
    }

    /// Consume the queue until the shutdown token is cancelled.
    ///
    /// A mission already running when shutdown arrives finishes first.
    pub async fn run(&self) -> DeploymentStats {
        info!(
            capacity = self.queue.capacity(),
            failure_threshold = self.config.failure_threshold,
            "deployment worker started"
        );
        let mut next_health_check = tokio::time::Instant::now() + self.config.health_check_interval();

        loop {
            // ── Step 1: Shutdown ─────────────────────────────────────────────
            if self.shutdown.is_cancelled() {
                break;
            }

            // ── Step 2: Periodic health check ────────────────────────────────
            if tokio::time::Instant::now() >= next_health_check {
                self.health_check().await;
                next_health_check = tokio::time::Instant::now() + self.config.health_check_interval();
            }

            // ── Step 3: Poll ─────────────────────────────────────────────────
            let queued = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                queued = self.queue.poll(self.config.poll_timeout()) => queued,
            };
            let Some(queued) = queued else {
                continue;
            };

            // ── Step 4: Breaker permit ───────────────────────────────────────
            if !self.breaker.allow_request() {
                self.bump(|s| s.deferred += 1);
                warn!(
                    mission_id = %queued.mission.id,
                    state = %self.breaker.state(),
                    delay_ms = self.config.requeue_delay_ms,
                    "circuit open, deferring mission"
                );
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        self.queue.requeue(queued);
                        break;
                    }
                    _ = tokio::time::sleep(self.config.requeue_delay()) => {
                        self.queue.requeue(queued);
                    }
                }
                continue;
            }

            // ── Step 5: Execute and record ───────────────────────────────────
            let outcome = self.process(queued).await;

            // ── Step 6: Feed the breaker ─────────────────────────────────────
            if outcome.status == MissionStatus::Succeeded {
                self.breaker.record_success();
                self.bump(|s| {
                    s.processed += 1;
                    s.succeeded += 1;
                });
            } else {
                self.breaker.record_failure();
                self.bump(|s| {
                    s.processed += 1;
                    s.failed += 1;
                });
            }
        }

        let stats = self.stats();
        info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            deferred = stats.deferred,
            queued = self.queue.len(),
            "deployment worker stopped"
        );
        stats
    }

    async fn process(&self, queued: QueuedMission) -> MissionOutcome {
        let worker = Worker {
            runtime: Arc::clone(&self.runtime),
            planners: Arc::clone(&self.planners),
            memory: self.memory.clone(),
            monitor: self.monitor.clone(),
            cost_per_1k_tokens: self.config.cost_per_1k_tokens,
        };
        let mission_id = queued.mission.id.clone();
        debug!(
            mission_id = %mission_id,
            priority = %queued.priority,
            attempts = queued.attempts,
            "mission dequeued"
        );

        let joined = tokio::task::spawn_blocking(move || {
            worker.execute(&queued.mission, queued.context)
        })
        .await;

        match joined {
            Ok(outcome) => {
                info!(
                    mission_id = %mission_id,
                    status = %outcome.status,
                    steps = outcome.steps.len(),
                    "mission processed"
                );
                outcome
            }
            Err(e) => {
                let fault = OverseerError::QueueError {
                    reason: format!("mission worker for '{}' panicked: {}", mission_id, e),
                };
                error!(mission_id = %mission_id, error = %fault, "mission lost");
                MissionOutcome::failed(fault.to_string())
            }
        }
    }
}
