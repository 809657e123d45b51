//! Core domain types for assignment submissions.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default size ceiling for an uploaded document: 5 MiB.
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Default plagiarism threshold. A best similarity score strictly above this
/// value flags the submission.
pub const DEFAULT_PLAGIARISM_THRESHOLD: u8 = 90;

// ---------------------------------------------------------------------------
// SubmissionRecord
// ---------------------------------------------------------------------------

/// One audit log entry. Written once, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// When the submission was accepted.
    pub timestamp: DateTime<Utc>,
    /// Student who submitted the document.
    pub student_name: String,
    /// File name inside the submissions directory.
    pub stored_filename: String,
    /// SHA-256 of the stored bytes (lowercase hex).
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A submission attempt that has not been accepted or rejected yet.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Student name as typed by the caller (trimmed).
    pub student_name: String,
    /// Where the uploaded document currently lives.
    pub source_path: PathBuf,
    /// Extension taken from the source path, without the leading dot.
    pub declared_extension: String,
    /// Size reported by the filesystem; 0 when the file is missing.
    pub size_bytes: u64,
}

impl Candidate {
    /// Inspect `source_path` and build a candidate from it.
    ///
    /// Never fails: a missing file yields `size_bytes = 0` and is reported by
    /// the validator as `FileNotFound`.
    pub fn from_path(student_name: &str, source_path: impl AsRef<Path>) -> Self {
        let source_path = source_path.as_ref().to_path_buf();
        let declared_extension = source_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let size_bytes = std::fs::metadata(&source_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Self {
            student_name: student_name.trim().to_string(),
            source_path,
            declared_extension,
            size_bytes,
        }
    }

    /// Extension lowercased and stripped of any leading dot.
    pub fn normalized_extension(&self) -> String {
        normalize_extension(&self.declared_extension)
    }
}

/// Lowercase an extension and strip a leading dot (`".PDF"` → `"pdf"`).
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a submission was turned away. Rejections before ingestion leave
/// storage and the audit log untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("student name cannot be empty")]
    EmptyStudentName,

    #[error("student name cannot contain line breaks or other control characters")]
    InvalidStudentName,

    #[error("file does not exist: {path}")]
    FileNotFound { path: String },

    #[error("unsupported file type '{extension}' (allowed: {allowed})")]
    UnsupportedType { extension: String, allowed: String },

    #[error("file too large: {size_bytes} bytes (maximum {max_bytes})")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("this file has already been submitted (stored as {existing})")]
    DuplicateSubmission { existing: String },

    #[error("failed to move file into storage: {message}")]
    IngestionFailed { message: String },

    #[error("submission cancelled before ingestion")]
    Cancelled,
}

/// Best similarity hit against another stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlagiarismMatch {
    /// Similarity score in `[0, 100]`.
    pub score: u8,
    /// The stored document that produced the score.
    pub matched_filename: String,
}

/// What the caller gets back for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// The audit log entry that was appended.
    pub record: SubmissionRecord,
    /// Absolute or config-relative path of the stored document.
    pub stored_path: PathBuf,
}

/// Final outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    Accepted {
        receipt: SubmissionReceipt,
    },
    AcceptedWithPlagiarismWarning {
        receipt: SubmissionReceipt,
        matched: PlagiarismMatch,
    },
    Rejected {
        reason: RejectReason,
    },
}

impl SubmissionResult {
    /// Shorthand for a rejection.
    pub fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    /// Whether the document ended up in storage.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// The receipt, if accepted.
    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        match self {
            Self::Accepted { receipt } | Self::AcceptedWithPlagiarismWarning { receipt, .. } => {
                Some(receipt)
            }
            Self::Rejected { .. } => None,
        }
    }

    /// The plagiarism score, if a warning was issued.
    pub fn plagiarism_score(&self) -> Option<u8> {
        match self {
            Self::AcceptedWithPlagiarismWarning { matched, .. } => Some(matched.score),
            _ => None,
        }
    }

    /// The rejection reason, if rejected.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}
