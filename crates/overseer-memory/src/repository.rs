//! Storage seam for mission memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use overseer_contracts::{
    error::OverseerResult,
    execution::{ExecutionId, MissionOutcome, MissionStatus},
};

/// One persisted mission run, fully reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExecution {
    pub id: ExecutionId,
    pub mission_id: String,
    pub goal: String,
    pub outcome: MissionOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Which executions to return. Results are always most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionFilter {
    pub mission_id: Option<String>,
    pub status: Option<MissionStatus>,
    pub limit: Option<usize>,
}

impl ExecutionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_mission(mission_id: impl Into<String>) -> Self {
        Self {
            mission_id: Some(mission_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Option<MissionStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Per-tool execution counts across every stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStatistics {
    pub tool_name: String,
    pub calls: u64,
    pub successes: u64,
}

impl ToolStatistics {
    pub fn failures(&self) -> u64 {
        self.calls - self.successes
    }

    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.successes as f64 / self.calls as f64
        }
    }
}

/// The shape of one run, read from the steps table without loading step bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTrace {
    pub mission_id: String,
    pub status: MissionStatus,
    /// Tool names in step order.
    pub tool_sequence: Vec<String>,
    pub step_count: usize,
}

/// Swappable persistence for executions and their steps.
pub trait ExecutionRepository: Send + Sync {
    /// Store one execution and its steps atomically.
    fn insert(&self, execution: &StoredExecution) -> OverseerResult<()>;

    fn list(&self, filter: &ExecutionFilter) -> OverseerResult<Vec<StoredExecution>>;

    /// Every stored run in insertion order, as mission, status and tool sequence.
    fn traces(&self) -> OverseerResult<Vec<ExecutionTrace>>;

    /// Sorted by tool name. Steps that never executed are not counted.
    fn tool_statistics(&self) -> OverseerResult<Vec<ToolStatistics>>;
}
