//! Flat-file storage for accepted submissions.
//!
//! Storage is one directory of documents plus one append-only log file:
//! - [`hasher`]: SHA-256 content digests
//! - [`AuditLog`]: durable record of every acceptance
//! - [`DuplicateIndex`]: hash lookups derived from the log
//! - [`Ingestor`]: all-or-nothing moves into the submissions directory
//!
//! There is no database; the log is the source of truth.

pub mod audit_log;
pub mod hasher;
pub mod index;
pub mod ingest;

use std::path::Path;

use examsubmit_shared::{ExamSubmitError, Result};

pub use audit_log::AuditLog;
pub use hasher::{hash_bytes, hash_file};
pub use index::{DuplicateIndex, LogScanIndex, MemoryIndex};
pub use ingest::{Ingestor, sanitize_name, stored_base_name};

/// Whether a directory entry name is a temp file or other hidden entry.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Sorted names of the regular files in `dir`, hidden entries excluded.
///
/// A missing directory lists as empty.
pub fn list_stored_files(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ExamSubmitError::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ExamSubmitError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| ExamSubmitError::io(entry.path(), e))?
            .is_file();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && !is_hidden(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
