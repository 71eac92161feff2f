//! # overseer-audit
//!
//! Append-only, SHA-256 hash-chained approval audit trail for the OVERSEER
//! runtime.
//!
//! ## Overview
//!
//! Every decision the safety validator makes is wrapped in an `AuditEntry`
//! that links to the previous entry via its SHA-256 hash. Tampering with any
//! entry breaks the chain and is detected by `verify_chain`.
//!
//! Two sinks implement [`AuditSink`](overseer_core::traits::AuditSink):
//! [`InMemoryAuditSink`] for tests and the demo, and [`JsonlAuditSink`],
//! which appends one JSON object per line to a file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use overseer_audit::{JsonlAuditSink, verify_file};
//!
//! let sink = Arc::new(JsonlAuditSink::open("var/approvals.jsonl")?);
//! let validator = SafetyValidator::new(sink.clone());
//! // ... run missions ...
//! assert!(verify_file(sink.path())?);
//! ```

pub mod chain;
pub mod entry;
pub mod file;
pub mod memory;

pub use chain::{find_break, hash_entry, verify_chain};
pub use entry::{AuditEntry, GENESIS_HASH};
pub use file::{read_entries, verify_file, JsonlAuditSink};
pub use memory::InMemoryAuditSink;

// ── Tests ────────────────────────────────────────────────────────────────────
