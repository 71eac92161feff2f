//! # overseer-monitor
//!
//! Mission metrics, health scoring and performance reports.
//!
//! The deployment service records one [`MissionMetrics`] per finished run and
//! periodically asks [`AgentMonitor::check_health`] whether the agent is still
//! doing its job. Classification over the lookback window:
//!
//! | Status      | Condition                                   |
//! |-------------|---------------------------------------------|
//! | `Healthy`   | success rate ≥ 0.9 and fewer than 3 failures |
//! | `Degraded`  | success rate ≥ 0.7 or fewer than 5 failures  |
//! | `Unhealthy` | anything else                               |

pub mod health;
pub mod metrics;
pub mod monitor;
pub mod report;
pub mod repository;

pub use health::{HealthReport, HealthStatus};
pub use metrics::MissionMetrics;
pub use monitor::{AgentMonitor, MAX_LOOKBACK_HOURS};
pub use report::{PerformanceReport, ReportPeriod, TypeBreakdown};
pub use repository::{MetricsRepository, SqliteMetricsRepository};

// ── Tests ────────────────────────────────────────────────────────────────────
