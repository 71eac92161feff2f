//! Audit entry type.
//!
//! An `AuditEntry` wraps one `ApprovalRecord` with its position in the chain
//! and the SHA-256 hashes that make tampering detectable. Serialized, the
//! record's fields and the chain fields sit side by side in one flat JSON
//! object, one object per line.

use serde::{Deserialize, Serialize};

use overseer_contracts::approval::ApprovalRecord;

/// The `prev_hash` of the first entry in every chain: 64 hex zeros.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// A single entry in the approval hash chain.
///
/// Modifying any field, including those of the embedded record, invalidates
/// `hash` and every later `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub record: ApprovalRecord,

    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// Hash of the previous entry, or `GENESIS_HASH`.
    pub prev_hash: String,

    /// Hash over (sequence, prev_hash, canonical JSON of record).
    pub hash: String,
}
