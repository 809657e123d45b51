//! Storage ↔ audit log consistency check.
//!
//! Every stored file should have exactly one log entry and vice versa.
//! Files that predate the log (cold start) show up as untracked.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument, warn};

use examsubmit_shared::Result;
use examsubmit_storage::{AuditLog, hash_file, list_stored_files};

/// Length of a SHA-256 hex digest. Older entries may carry other digests.
const SHA256_HEX_LEN: usize = 64;

/// Differences between the submissions directory and the audit log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    /// Number of parseable log entries.
    pub logged: usize,
    /// Number of files in the submissions directory.
    pub stored: usize,
    /// Stored files with no log entry.
    pub untracked_files: Vec<String>,
    /// Log entries whose file is gone.
    pub missing_files: Vec<String>,
    /// Files whose bytes no longer hash to the logged value.
    pub hash_mismatches: Vec<String>,
    /// File names referenced by more than one log entry.
    pub shared_filenames: Vec<String>,
}

impl ConsistencyReport {
    /// Whether storage and log are in exact bijection.
    pub fn is_consistent(&self) -> bool {
        self.untracked_files.is_empty()
            && self.missing_files.is_empty()
            && self.hash_mismatches.is_empty()
            && self.shared_filenames.is_empty()
    }
}

/// Compare the submissions directory against the audit log.
#[instrument(skip_all, fields(dir = %submissions_dir.display()))]
pub fn check_consistency(submissions_dir: &Path, log: &AuditLog) -> Result<ConsistencyReport> {
    let entries = log.entries()?;
    let stored: BTreeSet<String> = list_stored_files(submissions_dir)?.into_iter().collect();

    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in &entries {
        by_name
            .entry(entry.stored_filename.as_str())
            .or_default()
            .push(entry.content_hash.as_str());
    }

    let mut report = ConsistencyReport {
        logged: entries.len(),
        stored: stored.len(),
        ..Default::default()
    };

    for name in &stored {
        if !by_name.contains_key(name.as_str()) {
            report.untracked_files.push(name.clone());
        }
    }

    for (name, hashes) in &by_name {
        if hashes.len() > 1 {
            report.shared_filenames.push((*name).to_string());
        }
        if !stored.contains(*name) {
            report.missing_files.push((*name).to_string());
            continue;
        }

        let logged_hash = hashes[0];
        if logged_hash.len() != SHA256_HEX_LEN {
            continue;
        }
        match hash_file(&submissions_dir.join(name)) {
            Ok(actual) if actual == logged_hash => {}
            Ok(_) => report.hash_mismatches.push((*name).to_string()),
            Err(e) => {
                warn!(file = %name, error = %e, "could not hash stored file");
                report.hash_mismatches.push((*name).to_string());
            }
        }
    }

    info!(
        logged = report.logged,
        stored = report.stored,
        untracked = report.untracked_files.len(),
        missing = report.missing_files.len(),
        mismatched = report.hash_mismatches.len(),
        "consistency check complete"
    );

    Ok(report)
}
