//! Bounded, thread-safe mission queue with four priority tiers.
//!
//! Lower tier number wins. Within a tier, missions leave in the order they
//! were (re)enqueued.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, warn};

use overseer_contracts::{execution::ExecutionContext, mission::Mission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        })
    }
}

/// A mission waiting for the worker.
#[derive(Debug, Clone)]
pub struct QueuedMission {
    pub mission: Mission,
    pub context: ExecutionContext,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    /// Position within the queue's global order, assigned on every
    /// (re)enqueue. Zero until first queued.
    pub sequence: u64,
    /// Times this mission has been deferred back onto the queue.
    pub attempts: u32,
}

impl QueuedMission {
    pub fn new(mission: Mission, context: ExecutionContext, priority: Priority) -> Self {
        Self {
            mission,
            context,
            priority,
            enqueued_at: Utc::now(),
            sequence: 0,
            attempts: 0,
        }
    }

    pub fn mission_id(&self) -> &str {
        &self.mission.id
    }
}

struct QueueState {
    entries: BTreeMap<(Priority, u64), QueuedMission>,
    next_sequence: u64,
}

impl QueueState {
    fn push(&mut self, mut item: QueuedMission) {
        item.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert((item.priority, item.sequence), item);
    }
}

pub struct MissionQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    available: Notify,
}

impl MissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                entries: BTreeMap::new(),
                next_sequence: 0,
            }),
            available: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a mission. Returns `false` without blocking when full.
    pub fn enqueue(&self, item: QueuedMission) -> bool {
        let mut state = self.lock();
        if state.entries.len() >= self.capacity {
            warn!(
                mission_id = %item.mission_id(),
                capacity = self.capacity,
                "mission queue full, rejecting"
            );
            return false;
        }
        debug!(mission_id = %item.mission_id(), priority = %item.priority, "mission enqueued");
        state.push(item);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Put a deferred mission back at the end of its tier, ignoring capacity.
    pub fn requeue(&self, mut item: QueuedMission) {
        item.attempts += 1;
        debug!(
            mission_id = %item.mission_id(),
            attempts = item.attempts,
            "mission requeued"
        );
        self.lock().push(item);
        self.available.notify_one();
    }

    /// Take the highest-priority mission without waiting.
    pub fn try_dequeue(&self) -> Option<QueuedMission> {
        self.lock().entries.pop_first().map(|(_, item)| item)
    }

    /// Wait up to `timeout` for a mission.
    pub async fn poll(&self, timeout: Duration) -> Option<QueuedMission> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(item) = self.try_dequeue() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, self.available.notified())
                .await
                .is_err()
            {
                return self.try_dequeue();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued mission counts per tier, highest priority first.
    pub fn depth_by_priority(&self) -> Vec<(Priority, usize)> {
        let state = self.lock();
        [Priority::Critical, Priority::High, Priority::Normal, Priority::Low]
            .into_iter()
            .map(|p| (p, state.entries.keys().filter(|(tier, _)| *tier == p).count()))
            .collect()
    }
}
