//! Deployment configuration, loaded from TOML. Every field has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use overseer_contracts::error::{OverseerError, OverseerResult};
use overseer_monitor::MAX_LOOKBACK_HOURS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub max_queue_size: usize,
    pub poll_timeout_ms: u64,
    pub requeue_delay_ms: u64,
    pub health_check_interval_secs: u64,
    pub health_lookback_hours: u64,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub memory_db_path: PathBuf,
    pub metrics_db_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub cost_per_1k_tokens: Option<f64>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            poll_timeout_ms: 1000,
            requeue_delay_ms: 5000,
            health_check_interval_secs: 300,
            health_lookback_hours: 24,
            failure_threshold: 5,
            recovery_timeout_secs: 300,
            memory_db_path: PathBuf::from("var/overseer/memory.db"),
            metrics_db_path: PathBuf::from("var/overseer/metrics.db"),
            audit_log_path: PathBuf::from("var/overseer/approvals.jsonl"),
            cost_per_1k_tokens: None,
        }
    }
}

impl DeploymentConfig {
    pub fn from_toml_str(s: &str) -> OverseerResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| OverseerError::ConfigError {
            reason: format!("failed to parse deployment config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> OverseerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| OverseerError::ConfigError {
            reason: format!("failed to read deployment config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values that would stall or disable the service.
    pub fn validate(&self) -> OverseerResult<()> {
        if self.max_queue_size == 0 {
            return Err(OverseerError::config("max_queue_size must be at least 1"));
        }
        if self.failure_threshold == 0 {
            return Err(OverseerError::config("failure_threshold must be at least 1"));
        }
        if self.poll_timeout_ms == 0 {
            return Err(OverseerError::config("poll_timeout_ms must be at least 1"));
        }
        if self.health_lookback_hours == 0 || self.health_lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(OverseerError::config(format!(
                "health_lookback_hours must be between 1 and {}",
                MAX_LOOKBACK_HOURS
            )));
        }
        if matches!(self.cost_per_1k_tokens, Some(rate) if rate < 0.0) {
            return Err(OverseerError::config("cost_per_1k_tokens must not be negative"));
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}
