//! Periodic performance reports.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use overseer_contracts::execution::MissionStatus;

use crate::metrics::MissionMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Day,
    Week,
    Month,
}

impl ReportPeriod {
    pub fn span(&self) -> Duration {
        match self {
            ReportPeriod::Day => Duration::days(1),
            ReportPeriod::Week => Duration::days(7),
            ReportPeriod::Month => Duration::days(30),
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportPeriod::Day => "day",
            ReportPeriod::Week => "week",
            ReportPeriod::Month => "month",
        })
    }
}

/// Per mission type totals within a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeBreakdown {
    pub total: usize,
    pub succeeded: usize,
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub period: ReportPeriod,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_missions: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub blocked: usize,
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
    pub avg_steps: f64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub by_mission_type: BTreeMap<String, TypeBreakdown>,
}

impl PerformanceReport {
    pub fn build(
        period: ReportPeriod,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        metrics: &[MissionMetrics],
    ) -> Self {
        let total = metrics.len();
        let count = |status: MissionStatus| metrics.iter().filter(|m| m.status == status).count();
        let mean = |sum: f64, n: usize| if n == 0 { 0.0 } else { sum / n as f64 };

        let succeeded = count(MissionStatus::Succeeded);

        let mut by_mission_type: BTreeMap<String, TypeBreakdown> = BTreeMap::new();
        for m in metrics {
            let entry = by_mission_type.entry(m.mission_type.clone()).or_default();
            entry.total += 1;
            if m.status == MissionStatus::Succeeded {
                entry.succeeded += 1;
            }
            // running sum, averaged below
            entry.avg_duration_seconds += m.duration_seconds;
        }
        for breakdown in by_mission_type.values_mut() {
            breakdown.success_rate = mean(breakdown.succeeded as f64, breakdown.total);
            breakdown.avg_duration_seconds = mean(breakdown.avg_duration_seconds, breakdown.total);
        }

        Self {
            period,
            start,
            end,
            total_missions: total,
            succeeded,
            failed: count(MissionStatus::Failed),
            blocked: count(MissionStatus::Blocked),
            success_rate: mean(succeeded as f64, total),
            avg_duration_seconds: mean(metrics.iter().map(|m| m.duration_seconds).sum(), total),
            avg_steps: mean(metrics.iter().map(|m| m.step_count as f64).sum(), total),
            total_tokens: metrics.iter().filter_map(|m| m.token_usage).sum(),
            total_cost: metrics.iter().filter_map(|m| m.cost_estimate).sum(),
            by_mission_type,
        }
    }
}
