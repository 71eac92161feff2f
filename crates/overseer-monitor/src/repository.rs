//! Storage seam for mission metrics, with the SQLite implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use overseer_contracts::{
    error::{OverseerError, OverseerResult},
    execution::MissionStatus,
};

use crate::metrics::MissionMetrics;

/// Swappable persistence for mission metrics.
pub trait MetricsRepository: Send + Sync {
    fn insert(&self, metrics: &MissionMetrics) -> OverseerResult<()>;

    /// Every record with `timestamp >= since`, oldest first.
    fn since(&self, since: DateTime<Utc>) -> OverseerResult<Vec<MissionMetrics>>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS mission_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id TEXT NOT NULL,
    mission_type TEXT NOT NULL,
    status TEXT NOT NULL,
    duration_seconds REAL NOT NULL,
    step_count INTEGER NOT NULL,
    tool_call_count INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    error_message TEXT,
    token_usage INTEGER,
    cost_estimate REAL
);

CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON mission_metrics(timestamp);
CREATE INDEX IF NOT EXISTS idx_metrics_status ON mission_metrics(status);
"#;

fn db_error(action: &str) -> impl Fn(rusqlite::Error) -> OverseerError + '_ {
    move |e| OverseerError::storage(format!("{}: {}", action, e))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct MetricsRow {
    mission_id: String,
    mission_type: String,
    status: String,
    duration_seconds: f64,
    step_count: i64,
    tool_call_count: i64,
    timestamp: String,
    error_message: Option<String>,
    token_usage: Option<i64>,
    cost_estimate: Option<f64>,
}

impl MetricsRow {
    fn into_metrics(self) -> OverseerResult<MissionMetrics> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                OverseerError::storage(format!("invalid stored timestamp '{}': {}", self.timestamp, e))
            })?;
        Ok(MissionMetrics {
            mission_id: self.mission_id,
            mission_type: self.mission_type,
            status: MissionStatus::parse(&self.status),
            duration_seconds: self.duration_seconds,
            step_count: self.step_count as u32,
            tool_call_count: self.tool_call_count as u32,
            timestamp,
            error_message: self.error_message,
            token_usage: self.token_usage.map(|t| t as u64),
            cost_estimate: self.cost_estimate,
        })
    }
}

pub struct SqliteMetricsRepository {
    conn: Mutex<Connection>,
}

impl SqliteMetricsRepository {
    pub fn open(path: &Path) -> OverseerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                OverseerError::storage(format!("failed to create '{}': {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path).map_err(db_error("failed to open metrics store"))?;
        info!(path = %path.display(), "metrics store opened");
        Self::with_connection(conn)
    }

    pub fn in_memory() -> OverseerResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error("failed to open metrics store"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> OverseerResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(db_error("failed to run metrics schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> OverseerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| OverseerError::storage(format!("metrics store lock poisoned: {}", e)))
    }
}

impl MetricsRepository for SqliteMetricsRepository {
    fn insert(&self, metrics: &MissionMetrics) -> OverseerResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO mission_metrics
                 (mission_id, mission_type, status, duration_seconds, step_count, tool_call_count,
                  timestamp, error_message, token_usage, cost_estimate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                metrics.mission_id,
                metrics.mission_type,
                metrics.status.as_str(),
                metrics.duration_seconds,
                metrics.step_count as i64,
                metrics.tool_call_count as i64,
                format_timestamp(&metrics.timestamp),
                metrics.error_message,
                metrics.token_usage.map(|t| t as i64),
                metrics.cost_estimate,
            ],
        )
        .map_err(db_error("failed to insert mission metrics"))?;

        debug!(
            mission_id = %metrics.mission_id,
            status = %metrics.status,
            duration_seconds = metrics.duration_seconds,
            "mission metrics stored"
        );
        Ok(())
    }

    fn since(&self, since: DateTime<Utc>) -> OverseerResult<Vec<MissionMetrics>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT mission_id, mission_type, status, duration_seconds, step_count,
                        tool_call_count, timestamp, error_message, token_usage, cost_estimate
                 FROM mission_metrics
                 WHERE timestamp >= ?1
                 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(db_error("failed to prepare metrics query"))?;

        let rows = stmt
            .query_map(params![format_timestamp(&since)], |row| {
                Ok(MetricsRow {
                    mission_id: row.get(0)?,
                    mission_type: row.get(1)?,
                    status: row.get(2)?,
                    duration_seconds: row.get(3)?,
                    step_count: row.get(4)?,
                    tool_call_count: row.get(5)?,
                    timestamp: row.get(6)?,
                    error_message: row.get(7)?,
                    token_usage: row.get(8)?,
                    cost_estimate: row.get(9)?,
                })
            })
            .map_err(db_error("failed to query mission metrics"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error("failed to read mission metrics row"))?;

        rows.into_iter().map(MetricsRow::into_metrics).collect()
    }
}
