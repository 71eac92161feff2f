//! Circuit breaker guarding the mission worker against cascading failure.
//!
//! ```text
//!   CLOSED --N consecutive failures--> OPEN
//!   OPEN   --recovery timeout-------> HALF_OPEN (one trial call)
//!   HALF_OPEN --success--> CLOSED
//!   HALF_OPEN --failure--> OPEN
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        })
    }
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// May the next mission run?
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    pub fn allow_request_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(self.recovery_timeout);
                if elapsed < self.recovery_timeout {
                    return false;
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                info!("circuit breaker half-open, allowing one trial call");
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            info!("circuit breaker trial call succeeded, closing");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        inner.last_failure = Some(now);
        inner.trial_in_flight = false;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!("circuit breaker trial call failed, reopening");
            }
            CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                inner.state = CircuitState::Open;
                warn!(
                    failures = inner.consecutive_failures,
                    threshold = self.failure_threshold,
                    "circuit breaker opened"
                );
            }
            _ => {}
        }
    }

    /// Force the breaker closed and forget past failures.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure = None;
        inner.trial_in_flight = false;
    }
}
