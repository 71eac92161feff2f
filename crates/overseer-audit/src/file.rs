//! JSON-lines implementation of `AuditSink`.
//!
//! Each approval decision becomes one line in an append-only file. Opening
//! an existing file resumes its chain, so a service restart extends the same
//! trail instead of starting a second one.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use overseer_contracts::{
    approval::ApprovalRecord,
    error::{OverseerError, OverseerResult},
};
use overseer_core::traits::AuditSink;

use crate::{
    chain::{find_break, seal},
    entry::{AuditEntry, GENESIS_HASH},
};

struct FileState {
    file: File,
    next_sequence: u64,
    last_hash: String,
}

/// An audit sink writing one hash-chained JSON object per line.
pub struct JsonlAuditSink {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl JsonlAuditSink {
    /// Open (or create) the trail at `path` and resume its chain.
    ///
    /// Refuses to extend a file whose existing chain is already broken.
    pub fn open(path: impl Into<PathBuf>) -> OverseerResult<Self> {
        let path = path.into();
        let existing = if path.exists() {
            read_entries(&path)?
        } else {
            Vec::new()
        };

        if let Some(index) = find_break(&existing) {
            return Err(OverseerError::AuditWriteFailed {
                reason: format!(
                    "audit trail '{}' is corrupt at entry {}",
                    path.display(),
                    index
                ),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_error(&path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| write_error(&path, e))?;

        let last_hash = existing
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        info!(
            path = %path.display(),
            resumed_entries = existing.len(),
            "audit trail opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                file,
                next_sequence: existing.len() as u64,
                last_hash,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn append(&self, record: &ApprovalRecord) -> OverseerResult<()> {
        let mut state = self.state.lock().map_err(|e| OverseerError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })?;

        let entry = seal(state.next_sequence, record, &state.last_hash)?;
        let mut line = serde_json::to_string(&entry).map_err(|e| OverseerError::AuditWriteFailed {
            reason: format!("audit entry could not be serialized: {}", e),
        })?;
        line.push('\n');

        let file = &mut state.file;
        file.write_all(line.as_bytes())
            .map_err(|e| write_error(&self.path, e))?;
        file.flush().map_err(|e| write_error(&self.path, e))?;

        state.next_sequence += 1;
        state.last_hash = entry.hash;
        Ok(())
    }
}

/// Read every entry of the trail at `path`. Blank lines are skipped.
pub fn read_entries(path: &Path) -> OverseerResult<Vec<AuditEntry>> {
    let file = File::open(path).map_err(|e| OverseerError::StorageError {
        reason: format!("failed to open audit trail '{}': {}", path.display(), e),
    })?;

    let mut entries = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| OverseerError::StorageError {
            reason: format!("failed to read audit trail '{}': {}", path.display(), e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|e| OverseerError::StorageError {
            reason: format!(
                "malformed audit entry at {}:{}: {}",
                path.display(),
                number + 1,
                e
            ),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Verify the trail at `path`. `Ok(false)` means the chain is broken;
/// `Err` means the file could not be read or parsed at all.
pub fn verify_file(path: &Path) -> OverseerResult<bool> {
    let entries = read_entries(path)?;
    match find_break(&entries) {
        None => Ok(true),
        Some(index) => {
            warn!(path = %path.display(), entry = index, "audit chain broken");
            Ok(false)
        }
    }
}

fn write_error(path: &Path, e: std::io::Error) -> OverseerError {
    OverseerError::AuditWriteFailed {
        reason: format!("failed to write audit trail '{}': {}", path.display(), e),
    }
}
