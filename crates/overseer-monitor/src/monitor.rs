//! The agent monitor: record metrics, score health, build reports.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use overseer_contracts::error::{OverseerError, OverseerResult};

use crate::{
    health::{HealthReport, HealthStatus},
    metrics::MissionMetrics,
    report::{PerformanceReport, ReportPeriod},
    repository::MetricsRepository,
};

/// Longest health window accepted, ten years.
pub const MAX_LOOKBACK_HOURS: u64 = 24 * 365 * 10;

pub struct AgentMonitor {
    repository: Arc<dyn MetricsRepository>,
}

impl AgentMonitor {
    pub fn new(repository: Arc<dyn MetricsRepository>) -> Self {
        Self { repository }
    }

    pub fn record(&self, metrics: &MissionMetrics) -> OverseerResult<()> {
        self.repository.insert(metrics)
    }

    /// Score the last `lookback_hours` of runs.
    pub fn check_health(&self, lookback_hours: u64) -> OverseerResult<HealthReport> {
        self.check_health_at(Utc::now(), lookback_hours)
    }

    /// # Errors
    ///
    /// `ConfigError` when `lookback_hours` exceeds [`MAX_LOOKBACK_HOURS`] or
    /// reaches before the earliest representable time.
    pub fn check_health_at(&self, now: DateTime<Utc>, lookback_hours: u64) -> OverseerResult<HealthReport> {
        let since = Some(lookback_hours)
            .filter(|hours| *hours <= MAX_LOOKBACK_HOURS)
            .and_then(|hours| i64::try_from(hours).ok())
            .and_then(Duration::try_hours)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                OverseerError::config(format!(
                    "health lookback of {} hours is out of range (max {})",
                    lookback_hours, MAX_LOOKBACK_HOURS
                ))
            })?;
        let metrics = self.repository.since(since)?;
        let report = HealthReport::from_metrics(&metrics, lookback_hours);

        match report.status {
            HealthStatus::Healthy => info!(
                total = report.total,
                success_rate = report.success_rate,
                "health check passed"
            ),
            status => warn!(
                status = %status,
                total = report.total,
                failed = report.failed,
                blocked = report.blocked,
                success_rate = report.success_rate,
                "health check degraded"
            ),
        }
        Ok(report)
    }

    pub fn generate_report(&self, period: ReportPeriod) -> OverseerResult<PerformanceReport> {
        self.generate_report_at(Utc::now(), period)
    }

    pub fn generate_report_at(
        &self,
        now: DateTime<Utc>,
        period: ReportPeriod,
    ) -> OverseerResult<PerformanceReport> {
        let start = now - period.span();
        let metrics: Vec<MissionMetrics> = self
            .repository
            .since(start)?
            .into_iter()
            .filter(|m| m.timestamp <= now)
            .collect();
        Ok(PerformanceReport::build(period, start, now, &metrics))
    }
}
