//! SQLite-backed execution repository.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::{AgentStep, ExecutionId, MissionOutcome, MissionStatus},
};

use crate::repository::{
    ExecutionFilter, ExecutionRepository, ExecutionTrace, StoredExecution, ToolStatistics,
};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY NOT NULL,
    mission_id TEXT NOT NULL,
    mission_goal TEXT NOT NULL,
    status TEXT NOT NULL,
    summary TEXT NOT NULL,
    step_count INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    serialized_steps TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_executions_mission ON executions(mission_id);
CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status);
CREATE INDEX IF NOT EXISTS idx_executions_timestamp ON executions(timestamp DESC);

CREATE TABLE IF NOT EXISTS steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL,
    step_number INTEGER NOT NULL,
    thought_content TEXT NOT NULL,
    thought_type TEXT NOT NULL,
    tool_name TEXT,
    tool_arguments TEXT,
    result_success INTEGER,
    result_output TEXT,
    result_error TEXT,
    FOREIGN KEY (execution_id) REFERENCES executions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_steps_execution ON steps(execution_id, step_number);
CREATE INDEX IF NOT EXISTS idx_steps_tool ON steps(tool_name) WHERE tool_name IS NOT NULL;
"#;

fn db_error(action: &str) -> impl Fn(rusqlite::Error) -> OverseerError + '_ {
    move |e| OverseerError::StorageError {
        reason: format!("{}: {}", action, e),
    }
}

/// Fixed-width timestamps so lexical order is chronological order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> OverseerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| OverseerError::storage(format!("invalid stored timestamp '{}': {}", raw, e)))
}

/// Raw executions row, converted outside the rusqlite closure.
struct ExecutionRow {
    id: String,
    mission_id: String,
    goal: String,
    status: String,
    summary: String,
    timestamp: String,
    serialized_steps: String,
}

impl ExecutionRow {
    fn into_execution(self) -> OverseerResult<StoredExecution> {
        let uuid = uuid::Uuid::parse_str(&self.id)
            .map_err(|e| OverseerError::storage(format!("invalid execution id '{}': {}", self.id, e)))?;
        let steps: Vec<AgentStep> = serde_json::from_str(&self.serialized_steps).map_err(|e| {
            OverseerError::storage(format!("corrupt steps for execution '{}': {}", self.id, e))
        })?;

        Ok(StoredExecution {
            id: ExecutionId(uuid),
            mission_id: self.mission_id,
            goal: self.goal,
            outcome: MissionOutcome::new(MissionStatus::parse(&self.status), steps, self.summary),
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

pub struct SqliteExecutionRepository {
    conn: Mutex<Connection>,
}

impl SqliteExecutionRepository {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> OverseerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                OverseerError::storage(format!("failed to create '{}': {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path).map_err(db_error("failed to open mission memory"))?;
        info!(path = %path.display(), "mission memory opened");
        Self::with_connection(conn)
    }

    /// A private, non-persistent store.
    pub fn in_memory() -> OverseerResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error("failed to open mission memory"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> OverseerResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(db_error("failed to run mission memory schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> OverseerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| OverseerError::storage(format!("mission memory lock poisoned: {}", e)))
    }
}

impl ExecutionRepository for SqliteExecutionRepository {
    fn insert(&self, execution: &StoredExecution) -> OverseerResult<()> {
        let outcome = &execution.outcome;
        let serialized_steps = serde_json::to_string(&outcome.steps)
            .map_err(|e| OverseerError::storage(format!("failed to serialize steps: {}", e)))?;
        let id = execution.id.to_string();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(db_error("failed to begin transaction"))?;

        tx.execute(
            "INSERT INTO executions
                 (id, mission_id, mission_goal, status, summary, step_count, timestamp, serialized_steps)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                execution.mission_id,
                execution.goal,
                outcome.status.as_str(),
                outcome.summary,
                outcome.steps.len() as i64,
                format_timestamp(&execution.timestamp),
                serialized_steps,
            ],
        )
        .map_err(db_error("failed to insert execution"))?;

        for (number, step) in outcome.steps.iter().enumerate() {
            let call = step.thought.tool_call();
            let arguments = call.map(|c| serde_json::Value::Object(c.arguments.clone()).to_string());
            let output = step.result.as_ref().map(|r| r.output.to_string());

            tx.execute(
                "INSERT INTO steps
                     (execution_id, step_number, thought_content, thought_type, tool_name,
                      tool_arguments, result_success, result_output, result_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    number as i64,
                    step.thought.content(),
                    step.thought.kind(),
                    call.map(|c| c.tool.as_str()),
                    arguments,
                    step.result.as_ref().map(|r| r.success),
                    output,
                    step.result.as_ref().and_then(|r| r.error.as_deref()),
                ],
            )
            .map_err(db_error("failed to insert step"))?;
        }

        tx.commit().map_err(db_error("failed to commit execution"))?;
        debug!(
            execution_id = %id,
            mission_id = %execution.mission_id,
            steps = outcome.steps.len(),
            "execution stored"
        );
        Ok(())
    }

    fn list(&self, filter: &ExecutionFilter) -> OverseerResult<Vec<StoredExecution>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, mission_id, mission_goal, status, summary, timestamp, serialized_steps
                 FROM executions
                 WHERE (?1 IS NULL OR mission_id = ?1)
                   AND (?2 IS NULL OR status = ?2)
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?3",
            )
            .map_err(db_error("failed to prepare execution query"))?;

        // LIMIT -1 means no limit in SQLite.
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(
                params![
                    filter.mission_id.as_deref(),
                    filter.status.map(|s| s.as_str()),
                    limit
                ],
                |row| {
                    Ok(ExecutionRow {
                        id: row.get(0)?,
                        mission_id: row.get(1)?,
                        goal: row.get(2)?,
                        status: row.get(3)?,
                        summary: row.get(4)?,
                        timestamp: row.get(5)?,
                        serialized_steps: row.get(6)?,
                    })
                },
            )
            .map_err(db_error("failed to query executions"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error("failed to read execution row"))?;

        rows.into_iter().map(ExecutionRow::into_execution).collect()
    }

    fn traces(&self) -> OverseerResult<Vec<ExecutionTrace>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT e.id, e.mission_id, e.status, e.step_count, s.tool_name
                 FROM executions e
                 LEFT JOIN steps s ON s.execution_id = e.id AND s.tool_name IS NOT NULL
                 ORDER BY e.rowid, s.step_number",
            )
            .map_err(db_error("failed to prepare trace query"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })
            .map_err(db_error("failed to query traces"))?;

        // One row per tool step, or a single row with no tool for tool-less runs.
        let mut traces: Vec<ExecutionTrace> = Vec::new();
        let mut current_id: Option<String> = None;
        for row in rows {
            let (id, mission_id, status, step_count, tool_name) =
                row.map_err(db_error("failed to read trace row"))?;
            if current_id.as_deref() != Some(id.as_str()) {
                traces.push(ExecutionTrace {
                    mission_id,
                    status: MissionStatus::parse(&status),
                    tool_sequence: Vec::new(),
                    step_count: step_count.max(0) as usize,
                });
                current_id = Some(id);
            }
            if let (Some(tool), Some(trace)) = (tool_name, traces.last_mut()) {
                trace.tool_sequence.push(tool);
            }
        }
        Ok(traces)
    }

    fn tool_statistics(&self) -> OverseerResult<Vec<ToolStatistics>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT tool_name, COUNT(*), SUM(CASE WHEN result_success = 1 THEN 1 ELSE 0 END)
                 FROM steps
                 WHERE tool_name IS NOT NULL AND result_success IS NOT NULL
                 GROUP BY tool_name
                 ORDER BY tool_name",
            )
            .map_err(db_error("failed to prepare tool statistics query"))?;

        let stats = stmt
            .query_map([], |row| {
                Ok(ToolStatistics {
                    tool_name: row.get(0)?,
                    calls: row.get::<_, i64>(1)? as u64,
                    successes: row.get::<_, i64>(2)? as u64,
                })
            })
            .map_err(db_error("failed to query tool statistics"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error("failed to read tool statistics row"))?;
        Ok(stats)
    }
}
