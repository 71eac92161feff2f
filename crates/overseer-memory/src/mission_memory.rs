//! Mission memory: record finished runs and mine them for reusable patterns.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use overseer_contracts::{
    error::OverseerResult,
    execution::{ExecutionId, MissionOutcome, MissionStatus},
    mission::Mission,
};

use crate::repository::{ExecutionFilter, ExecutionRepository, StoredExecution, ToolStatistics};

/// A tool sequence that repeatedly led a mission type to success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessPattern {
    pub mission_type: String,
    pub tool_sequence: Vec<String>,
    /// Successful executions that used exactly this sequence.
    pub occurrences: usize,
    /// `occurrences` divided by every attempt of the mission type.
    pub success_rate: f64,
    pub avg_steps: f64,
}

/// Persistent record of past executions.
pub struct MissionMemory {
    repository: Arc<dyn ExecutionRepository>,
}

impl MissionMemory {
    pub fn new(repository: Arc<dyn ExecutionRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn ExecutionRepository> {
        &self.repository
    }

    /// Store one finished run and return its new execution id.
    pub fn record(&self, mission: &Mission, outcome: &MissionOutcome) -> OverseerResult<ExecutionId> {
        let execution = StoredExecution {
            id: ExecutionId::new(),
            mission_id: mission.id.clone(),
            goal: mission.goal.clone(),
            outcome: outcome.clone(),
            timestamp: Utc::now(),
        };
        self.repository.insert(&execution)?;

        info!(
            execution_id = %execution.id,
            mission_id = %mission.id,
            status = %outcome.status,
            steps = outcome.steps.len(),
            "mission execution recorded"
        );
        Ok(execution.id)
    }

    /// Past runs of `mission_type`, most recent first.
    pub fn find_similar(
        &self,
        mission_type: &str,
        limit: usize,
        status: Option<MissionStatus>,
    ) -> OverseerResult<Vec<StoredExecution>> {
        let filter = ExecutionFilter::for_mission(mission_type)
            .with_status(status)
            .with_limit(limit);
        self.repository.list(&filter)
    }

    /// Tool sequences that succeeded at least `min_occurrences` times.
    ///
    /// Sorted by success rate, then occurrences, both descending. Ties keep
    /// mission type and sequence order.
    pub fn extract_patterns(&self, min_occurrences: usize) -> OverseerResult<Vec<SuccessPattern>> {
        let traces = self.repository.traces()?;

        let mut attempts: BTreeMap<&str, usize> = BTreeMap::new();
        // (mission type, sequence) -> step counts of each successful run
        let mut groups: BTreeMap<(&str, &[String]), Vec<usize>> = BTreeMap::new();

        for trace in &traces {
            *attempts.entry(trace.mission_id.as_str()).or_default() += 1;
            if trace.status == MissionStatus::Succeeded {
                groups
                    .entry((trace.mission_id.as_str(), trace.tool_sequence.as_slice()))
                    .or_default()
                    .push(trace.step_count);
            }
        }

        let mut patterns: Vec<SuccessPattern> = groups
            .into_iter()
            .filter(|(_, runs)| runs.len() >= min_occurrences.max(1))
            .map(|((mission_type, tool_sequence), runs)| {
                let total = attempts.get(mission_type).copied().unwrap_or(runs.len());
                SuccessPattern {
                    mission_type: mission_type.to_string(),
                    tool_sequence: tool_sequence.to_vec(),
                    occurrences: runs.len(),
                    success_rate: runs.len() as f64 / total as f64,
                    avg_steps: runs.iter().sum::<usize>() as f64 / runs.len() as f64,
                }
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then(b.occurrences.cmp(&a.occurrences))
        });

        debug!(
            executions = traces.len(),
            patterns = patterns.len(),
            min_occurrences,
            "success patterns extracted"
        );
        Ok(patterns)
    }

    pub fn tool_statistics(&self) -> OverseerResult<Vec<ToolStatistics>> {
        self.repository.tool_statistics()
    }
}
