//! Health classification over a window of mission metrics.

use std::fmt;

use serde::{Deserialize, Serialize};

use overseer_contracts::execution::MissionStatus;

use crate::metrics::MissionMetrics;

pub const HEALTHY_SUCCESS_RATE: f64 = 0.9;
pub const DEGRADED_SUCCESS_RATE: f64 = 0.7;
/// Failures at or above this count rule out `Healthy`.
pub const REPEATED_FAILURES: usize = 3;
/// Failures at or above this count (with a low rate) mean `Unhealthy`.
pub const UNHEALTHY_FAILURES: usize = 5;
pub const SLOW_MISSION_SECONDS: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn classify(success_rate: f64, failures: usize) -> Self {
        if success_rate >= HEALTHY_SUCCESS_RATE && failures < REPEATED_FAILURES {
            HealthStatus::Healthy
        } else if success_rate >= DEGRADED_SUCCESS_RATE || failures < UNHEALTHY_FAILURES {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub lookback_hours: u64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub blocked: usize,
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    /// Score a window of metrics.
    pub fn from_metrics(metrics: &[MissionMetrics], lookback_hours: u64) -> Self {
        if metrics.is_empty() {
            return Self {
                status: HealthStatus::Healthy,
                lookback_hours,
                total: 0,
                succeeded: 0,
                failed: 0,
                blocked: 0,
                success_rate: 0.0,
                avg_duration_seconds: 0.0,
                recommendations: vec![format!(
                    "no missions ran in the last {} hours",
                    lookback_hours
                )],
            };
        }

        let count = |status: MissionStatus| metrics.iter().filter(|m| m.status == status).count();
        let total = metrics.len();
        let succeeded = count(MissionStatus::Succeeded);
        let failed = count(MissionStatus::Failed);
        let blocked = count(MissionStatus::Blocked);
        let success_rate = succeeded as f64 / total as f64;
        let avg_duration_seconds =
            metrics.iter().map(|m| m.duration_seconds).sum::<f64>() / total as f64;

        let mut recommendations = Vec::new();
        if success_rate < DEGRADED_SUCCESS_RATE {
            recommendations.push(format!(
                "high failure rate: only {:.0}% of missions succeeded",
                success_rate * 100.0
            ));
        }
        if failed >= REPEATED_FAILURES {
            recommendations.push(format!(
                "repeated failures: {} missions failed, inspect recent error messages",
                failed
            ));
        }
        if blocked > 0 {
            recommendations.push(format!(
                "{} missions blocked by approval policy, review risk rules or approvers",
                blocked
            ));
        }
        if avg_duration_seconds > SLOW_MISSION_SECONDS {
            recommendations.push(format!(
                "slow missions: average duration {:.1}s exceeds {:.0}s",
                avg_duration_seconds, SLOW_MISSION_SECONDS
            ));
        }

        Self {
            status: HealthStatus::classify(success_rate, failed),
            lookback_hours,
            total,
            succeeded,
            failed,
            blocked,
            success_rate,
            avg_duration_seconds,
            recommendations,
        }
    }
}
