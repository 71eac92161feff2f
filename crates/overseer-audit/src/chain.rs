//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. canonical JSON of the approval record (no pretty-printing)

use sha2::{Digest, Sha256};

use overseer_contracts::{
    approval::ApprovalRecord,
    error::{OverseerError, OverseerResult},
};

use crate::entry::{AuditEntry, GENESIS_HASH};

/// Compute the SHA-256 hash for one entry. Returns lowercase hex.
pub fn hash_entry(sequence: u64, record: &ApprovalRecord, prev_hash: &str) -> OverseerResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| OverseerError::AuditWriteFailed {
        reason: format!("approval record could not be serialized: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Build the entry that follows `prev_hash` at position `sequence`.
pub fn seal(sequence: u64, record: &ApprovalRecord, prev_hash: &str) -> OverseerResult<AuditEntry> {
    Ok(AuditEntry {
        record: record.clone(),
        sequence,
        prev_hash: prev_hash.to_string(),
        hash: hash_entry(sequence, record, prev_hash)?,
    })
}

/// Index of the first entry that breaks the chain, if any.
///
/// An entry breaks the chain when its sequence is out of place, its
/// `prev_hash` does not match the previous entry's `hash` (or `GENESIS_HASH`
/// at position 0), or its `hash` does not match the recomputed value.
pub fn find_break(entries: &[AuditEntry]) -> Option<usize> {
    let mut expected_prev = GENESIS_HASH;

    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64 || entry.prev_hash != expected_prev {
            return Some(index);
        }
        match hash_entry(entry.sequence, &entry.record, &entry.prev_hash) {
            Ok(recomputed) if recomputed == entry.hash => {}
            _ => return Some(index),
        }
        expected_prev = entry.hash.as_str();
    }

    None
}

/// True when the whole chain is intact. An empty chain is valid.
pub fn verify_chain(entries: &[AuditEntry]) -> bool {
    find_break(entries).is_none()
}
