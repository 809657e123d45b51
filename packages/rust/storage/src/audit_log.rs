//! Append-only audit log of accepted submissions.
//!
//! One human-readable UTF-8 line per acceptance:
//!
//! ```text
//! 2026-03-01T09:15:02.118+00:00 - Ada Lovelace submitted Ada_Lovelace_20260301_091502.pdf - Hash: 3a7bd3e2...
//! ```
//!
//! The log is the durable source of truth for the duplicate index. Lines are
//! only ever appended; nothing here rewrites or truncates the file.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, instrument};

use examsubmit_shared::{ExamSubmitError, Result, SubmissionRecord};

const SUBMITTED_SEP: &str = " submitted ";
const HASH_SEP: &str = " - Hash: ";
const FIELD_SEP: &str = " - ";

/// Handle to the audit log file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// Open the log at `path`, creating it (and its parent directory) if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ExamSubmitError::io(parent, e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ExamSubmitError::io(&path, e))?;

        debug!(path = %path.display(), "audit log ready");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line and flush it to disk.
    ///
    /// The whole line goes out in one `write_all` on an append-mode handle,
    /// serialized by an in-process lock, so entries never interleave.
    #[instrument(skip_all, fields(file = %record.stored_filename))]
    pub fn append(&self, record: &SubmissionRecord) -> Result<()> {
        let line = format_line(record)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ExamSubmitError::Storage("audit log lock poisoned".into()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ExamSubmitError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| ExamSubmitError::io(&self.path, e))?;

        debug!(hash = %record.content_hash, "audit entry appended");
        Ok(())
    }

    /// All parseable entries, in append order.
    ///
    /// Lines that are not submission entries (blank lines, legacy markers)
    /// are skipped.
    pub fn entries(&self) -> Result<Vec<SubmissionRecord>> {
        let mut records = Vec::new();
        self.scan(|record| {
            records.push(record);
            false
        })?;
        Ok(records)
    }

    /// Find the first entry whose content hash equals `hash`.
    pub fn find_hash(&self, hash: &str) -> Result<Option<SubmissionRecord>> {
        let mut found = None;
        self.scan(|record| {
            if record.content_hash == hash {
                found = Some(record);
                true
            } else {
                false
            }
        })?;
        Ok(found)
    }

    /// Walk the log line by line; `visit` returns `true` to stop early.
    fn scan(&self, mut visit: impl FnMut(SubmissionRecord) -> bool) -> Result<()> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ExamSubmitError::io(&self.path, e)),
        };

        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| ExamSubmitError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Some(record) => {
                    if visit(record) {
                        break;
                    }
                }
                None => debug!(line = lineno + 1, "skipping non-entry log line"),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Line format
// ---------------------------------------------------------------------------

/// Render a record as one log line (newline included).
///
/// Refuses records that could not be read back as exactly one entry: control
/// characters anywhere, whitespace in the stored file name, a non-hex hash.
pub fn format_line(record: &SubmissionRecord) -> Result<String> {
    if record.student_name.contains(char::is_control) {
        return Err(ExamSubmitError::validation(format!(
            "student name {:?} contains control characters",
            record.student_name
        )));
    }
    if record.stored_filename.is_empty()
        || record.stored_filename.contains(|c: char| c.is_whitespace() || c.is_control())
    {
        return Err(ExamSubmitError::validation(format!(
            "stored file name {:?} cannot be logged",
            record.stored_filename
        )));
    }
    if record.content_hash.is_empty() || !record.content_hash.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(ExamSubmitError::validation(format!(
            "content hash {:?} is not hex",
            record.content_hash
        )));
    }

    Ok(format!(
        "{}{FIELD_SEP}{}{SUBMITTED_SEP}{}{HASH_SEP}{}\n",
        record.timestamp.to_rfc3339(),
        record.student_name,
        record.stored_filename,
        record.content_hash,
    ))
}

/// Parse a log line back into a record. Returns `None` for anything that is
/// not a submission entry.
///
/// Stored file names never contain spaces, which is what makes the split on
/// the last `" submitted "` unambiguous even for odd student names.
pub fn parse_line(line: &str) -> Option<SubmissionRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (head, hash) = line.rsplit_once(HASH_SEP)?;
    let (timestamp, rest) = head.split_once(FIELD_SEP)?;
    let (student_name, stored_filename) = rest.rsplit_once(SUBMITTED_SEP)?;

    let hash = hash.trim();
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    if stored_filename.is_empty() || stored_filename.contains(char::is_whitespace) {
        return None;
    }

    Some(SubmissionRecord {
        timestamp: parse_timestamp(timestamp)?,
        student_name: student_name.to_string(),
        stored_filename: stored_filename.to_string(),
        content_hash: hash.to_ascii_lowercase(),
    })
}

/// RFC 3339, or the older `2025-01-31 14:02:11.482913` local-time form
/// (interpreted as UTC).
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
