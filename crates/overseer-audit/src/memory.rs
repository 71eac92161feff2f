//! In-memory implementation of `AuditSink`.
//!
//! `InMemoryAuditSink` keeps every entry in a `Vec` behind a `Mutex`. Clones
//! share the same chain, so a test or the demo can keep a handle while the
//! safety validator owns another.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use overseer_contracts::{
    approval::ApprovalRecord,
    error::{OverseerError, OverseerResult},
};
use overseer_core::traits::AuditSink;

use crate::{
    chain::{seal, verify_chain},
    entry::{AuditEntry, GENESIS_HASH},
};

pub(crate) struct ChainState {
    pub(crate) entries: Vec<AuditEntry>,
    pub(crate) last_hash: String,
}

/// An in-memory, append-only approval trail backed by a SHA-256 hash chain.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    pub(crate) state: Arc<Mutex<ChainState>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                entries: Vec::new(),
                last_hash: GENESIS_HASH.to_string(),
            })),
        }
    }

    fn lock(&self) -> OverseerResult<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|e| OverseerError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }

    /// A copy of every entry written so far, in chain order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().map(|s| s.entries.clone()).unwrap_or_default()
    }

    /// Just the approval records, in chain order.
    pub fn records(&self) -> Vec<ApprovalRecord> {
        self.lock()
            .map(|s| s.entries.iter().map(|e| e.record.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.entries.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify that the chain has not been tampered with in memory.
    pub fn verify_integrity(&self) -> bool {
        self.lock().map(|s| verify_chain(&s.entries)).unwrap_or(false)
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&self, record: &ApprovalRecord) -> OverseerResult<()> {
        let mut state = self.lock()?;
        let sequence = state.entries.len() as u64;
        let entry = seal(sequence, record, &state.last_hash)?;

        debug!(
            sequence,
            tool = %record.tool_name,
            status = ?record.status,
            "approval audited"
        );

        state.last_hash = entry.hash.clone();
        state.entries.push(entry);
        Ok(())
    }
}
