//! Per-run metrics record.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use overseer_contracts::{
    execution::{MissionOutcome, MissionStatus, TokenUsage},
    mission::Mission,
};

/// What the monitor stores about one finished mission run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionMetrics {
    pub mission_id: String,
    pub mission_type: String,
    pub status: MissionStatus,
    pub duration_seconds: f64,
    pub step_count: u32,
    pub tool_call_count: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
}

impl MissionMetrics {
    /// Metrics for a run that just finished. Non-successful runs carry
    /// their summary as the error message.
    pub fn from_outcome(mission: &Mission, outcome: &MissionOutcome, duration: Duration) -> Self {
        let error_message = match outcome.status {
            MissionStatus::Succeeded => None,
            _ => Some(outcome.summary.clone()),
        };
        Self {
            mission_id: mission.id.clone(),
            mission_type: mission.mission_type().to_string(),
            status: outcome.status,
            duration_seconds: duration.as_secs_f64(),
            step_count: outcome.steps.len() as u32,
            tool_call_count: outcome.tool_call_count() as u32,
            timestamp: Utc::now(),
            error_message,
            token_usage: None,
            cost_estimate: None,
        }
    }

    /// Attach token consumption, pricing it when a rate is known.
    pub fn with_token_usage(mut self, usage: TokenUsage, cost_per_1k_tokens: Option<f64>) -> Self {
        let total = usage.total();
        self.token_usage = Some(total);
        self.cost_estimate = cost_per_1k_tokens.map(|rate| total as f64 / 1000.0 * rate);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
