//! Duplicate index: "has this exact content been accepted before?"
//!
//! The audit log is the durable record; an index only answers lookups.
//! [`LogScanIndex`] re-reads the log on every query, [`MemoryIndex`] keeps a
//! hash map rebuilt from the log at startup and updated alongside each
//! append.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use examsubmit_shared::{ExamSubmitError, Result, SubmissionRecord};

use crate::audit_log::AuditLog;

/// Lookup of previously accepted content hashes.
pub trait DuplicateIndex: Send + Sync {
    /// Stored file name of the earlier submission with this hash, if any.
    fn lookup(&self, hash: &str) -> Result<Option<String>>;

    /// Whether `hash` has been accepted before.
    fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self.lookup(hash)?.is_some())
    }

    /// Make a freshly logged record visible to later lookups.
    fn record(&self, record: &SubmissionRecord) -> Result<()>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// LogScanIndex
// ---------------------------------------------------------------------------

/// Answers every lookup with a linear scan of the audit log.
pub struct LogScanIndex {
    log: Arc<AuditLog>,
}

impl LogScanIndex {
    pub fn new(log: Arc<AuditLog>) -> Self {
        Self { log }
    }
}

impl DuplicateIndex for LogScanIndex {
    fn lookup(&self, hash: &str) -> Result<Option<String>> {
        Ok(self.log.find_hash(hash)?.map(|r| r.stored_filename))
    }

    fn record(&self, _record: &SubmissionRecord) -> Result<()> {
        // The log itself is the index.
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "scan"
    }
}

// ---------------------------------------------------------------------------
// MemoryIndex
// ---------------------------------------------------------------------------

/// Hash → stored filename map held in memory.
#[derive(Default)]
pub struct MemoryIndex {
    by_hash: RwLock<HashMap<String, String>>,
}

impl MemoryIndex {
    /// Rebuild the index from every entry in the log. The first entry for a
    /// hash wins.
    pub fn rebuild(log: &AuditLog) -> Result<Self> {
        let mut by_hash = HashMap::new();
        for record in log.entries()? {
            by_hash
                .entry(record.content_hash)
                .or_insert(record.stored_filename);
        }
        info!(entries = by_hash.len(), "duplicate index rebuilt from audit log");
        Ok(Self {
            by_hash: RwLock::new(by_hash),
        })
    }

    /// Number of distinct hashes indexed.
    pub fn len(&self) -> usize {
        self.by_hash.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DuplicateIndex for MemoryIndex {
    fn lookup(&self, hash: &str) -> Result<Option<String>> {
        let map = self
            .by_hash
            .read()
            .map_err(|_| ExamSubmitError::Storage("duplicate index lock poisoned".into()))?;
        Ok(map.get(hash).cloned())
    }

    fn record(&self, record: &SubmissionRecord) -> Result<()> {
        let mut map = self
            .by_hash
            .write()
            .map_err(|_| ExamSubmitError::Storage("duplicate index lock poisoned".into()))?;
        map.entry(record.content_hash.clone())
            .or_insert_with(|| record.stored_filename.clone());
        debug!(hash = %record.content_hash, "indexed");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
