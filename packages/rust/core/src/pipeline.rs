//! End-to-end submission pipeline:
//! validate → duplicate check → ingest → extract → compare → log.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use examsubmit_extract::ExtractorRegistry;
use examsubmit_shared::{
    Candidate, DeskConfig, ExamSubmitError, IndexMode, PlagiarismMatch, RejectReason, Result,
    SubmissionReceipt, SubmissionRecord, SubmissionResult,
};
use examsubmit_storage::{
    AuditLog, DuplicateIndex, Ingestor, LogScanIndex, MemoryIndex, hash_file, list_stored_files,
};

use crate::consistency::{self, ConsistencyReport};
use crate::similarity::{RatioScorer, SimilarityScorer};
use crate::validator::Validator;

// ---------------------------------------------------------------------------
// Progress & cancellation
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each stored document is compared.
    fn compared(&self, filename: &str, current: usize, total: usize);
    /// Called with the final outcome.
    fn done(&self, result: &SubmissionResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn compared(&self, _filename: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &SubmissionResult) {}
}

/// Shared flag that asks an in-flight submission to stop.
///
/// Honored before ingestion only. Once the file has moved, the submission
/// always runs to its audit entry; cancelling then just cuts the plagiarism
/// scan short.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// SubmissionDesk
// ---------------------------------------------------------------------------

/// Everything a submission touches: storage directory, audit log, duplicate
/// index, extractors and scorer. Open once at startup and share.
pub struct SubmissionDesk {
    config: DeskConfig,
    validator: Validator,
    log: Arc<AuditLog>,
    index: Box<dyn DuplicateIndex>,
    ingestor: Ingestor,
    extractors: ExtractorRegistry,
    scorer: Box<dyn SimilarityScorer>,
    /// Held from the duplicate check through the audit append.
    commit_lock: Mutex<()>,
}

impl SubmissionDesk {
    /// Create the submissions directory and audit log if absent and build
    /// the duplicate index.
    #[instrument(skip_all, fields(dir = %config.submissions_dir.display()))]
    pub fn open(config: DeskConfig) -> Result<Self> {
        config.validate()?;

        let ingestor = Ingestor::new(&config.submissions_dir)?;
        let log = Arc::new(AuditLog::open(&config.log_file)?);
        let index: Box<dyn DuplicateIndex> = match config.index_mode {
            IndexMode::Memory => Box::new(MemoryIndex::rebuild(&log)?),
            IndexMode::Scan => Box::new(LogScanIndex::new(Arc::clone(&log))),
        };

        info!(
            log = %config.log_file.display(),
            index = index.kind(),
            "submission desk ready"
        );

        Ok(Self {
            validator: Validator::from_config(&config),
            config,
            log,
            index,
            ingestor,
            extractors: ExtractorRegistry::with_defaults(),
            scorer: Box::new(RatioScorer),
            commit_lock: Mutex::new(()),
        })
    }

    /// Replace the text extractors.
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Replace the similarity scorer.
    pub fn with_scorer<S: SimilarityScorer + 'static>(mut self, scorer: S) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Submit a document with no progress reporting or cancellation.
    pub fn submit(&self, student_name: &str, source: &Path) -> Result<SubmissionResult> {
        self.submit_with(student_name, source, &SilentProgress, &CancelToken::new())
    }

    /// Run the full pipeline for one upload.
    ///
    /// `Ok(Rejected(..))` means the upload was turned away with storage and
    /// log untouched. `Err` means the machinery itself failed.
    #[instrument(skip_all, fields(student = %student_name, source = %source.display()))]
    pub fn submit_with(
        &self,
        student_name: &str,
        source: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<SubmissionResult> {
        let result = self.run(student_name, source, progress, cancel)?;

        match &result {
            SubmissionResult::Rejected { reason } => {
                info!(%reason, "submission rejected");
            }
            accepted => {
                info!(
                    stored = accepted.receipt().map(|r| r.record.stored_filename.as_str()),
                    plagiarism_score = accepted.plagiarism_score(),
                    "submission accepted"
                );
            }
        }
        progress.done(&result);
        Ok(result)
    }

    fn run(
        &self,
        student_name: &str,
        source: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<SubmissionResult> {
        let candidate = Candidate::from_path(student_name, source);
        if candidate.student_name.is_empty() {
            return Ok(SubmissionResult::rejected(RejectReason::EmptyStudentName));
        }
        if candidate.student_name.chars().any(char::is_control) {
            return Ok(SubmissionResult::rejected(RejectReason::InvalidStudentName));
        }
        if cancel.is_cancelled() {
            return Ok(SubmissionResult::rejected(RejectReason::Cancelled));
        }

        // --- Validate ---
        progress.phase("Validating upload");
        if let Err(reason) = self.validator.validate_candidate(&candidate) {
            return Ok(SubmissionResult::rejected(reason));
        }
        if cancel.is_cancelled() {
            return Ok(SubmissionResult::rejected(RejectReason::Cancelled));
        }

        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| ExamSubmitError::Storage("submission lock poisoned".into()))?;

        // --- Duplicate check ---
        progress.phase("Checking for duplicates");
        let content_hash = match hash_file(&candidate.source_path) {
            Ok(hash) => hash,
            Err(e) if e.is_not_found() => {
                return Ok(SubmissionResult::rejected(RejectReason::FileNotFound {
                    path: candidate.source_path.display().to_string(),
                }));
            }
            Err(e) => return Err(e),
        };
        if let Some(existing) = self.index.lookup(&content_hash)? {
            return Ok(SubmissionResult::rejected(
                RejectReason::DuplicateSubmission { existing },
            ));
        }
        if cancel.is_cancelled() {
            return Ok(SubmissionResult::rejected(RejectReason::Cancelled));
        }

        // --- Ingest (point of no return) ---
        progress.phase("Storing submission");
        let now = Utc::now();
        let stored_filename = match self.ingestor.ingest_at(
            &candidate.source_path,
            &candidate.student_name,
            &candidate.normalized_extension(),
            now,
        ) {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "ingestion failed");
                return Ok(SubmissionResult::rejected(RejectReason::IngestionFailed {
                    message: e.to_string(),
                }));
            }
        };

        // --- Plagiarism scan (advisory) ---
        let matched = if self.config.plagiarism_enabled {
            self.scan_for_plagiarism(&stored_filename, progress, cancel)
        } else {
            None
        };

        // --- Audit log ---
        progress.phase("Recording submission");
        let record = SubmissionRecord {
            timestamp: now,
            student_name: candidate.student_name.clone(),
            stored_filename: stored_filename.clone(),
            content_hash,
        };
        if let Err(e) = self.log.append(&record) {
            if let Err(undo) = self.ingestor.restore(&stored_filename, &candidate.source_path) {
                warn!(error = %undo, stored = %stored_filename, "rollback after log failure failed");
            }
            return Err(e);
        }
        self.index.record(&record)?;

        let receipt = SubmissionReceipt {
            stored_path: self.stored_path(&stored_filename),
            record,
        };
        Ok(match matched {
            Some(matched) => SubmissionResult::AcceptedWithPlagiarismWarning { receipt, matched },
            None => SubmissionResult::Accepted { receipt },
        })
    }

    /// Compare the newly stored document with every other stored document.
    /// Returns the best match if it exceeds the threshold. Never fails.
    fn scan_for_plagiarism(
        &self,
        stored_filename: &str,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Option<PlagiarismMatch> {
        progress.phase("Extracting text");
        let new_text = self.extractors.extract_or_empty(&self.stored_path(stored_filename));
        if new_text.is_empty() {
            debug!("no text in new submission, skipping comparison");
            return None;
        }

        let others: Vec<String> = match list_stored_files(&self.config.submissions_dir) {
            Ok(names) => names.into_iter().filter(|n| n != stored_filename).collect(),
            Err(e) => {
                warn!(error = %e, "could not list stored submissions, skipping comparison");
                return None;
            }
        };

        let threshold = self.config.plagiarism_threshold;
        let total = others.len();
        let mut best: Option<PlagiarismMatch> = None;

        for (i, name) in others.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(compared = i, total, "plagiarism scan cancelled");
                break;
            }
            progress.compared(name, i + 1, total);

            let text = self.extractors.extract_or_empty(&self.stored_path(name));
            if text.is_empty() {
                continue;
            }

            let floor = best.as_ref().map_or(threshold, |b| b.score.max(threshold));
            if let Some(bound) = self.scorer.upper_bound(&new_text, &text) {
                if bound <= floor {
                    continue;
                }
            }

            let score = self.scorer.score(&new_text, &text);
            debug!(other = %name, score, "compared");
            if score > floor {
                best = Some(PlagiarismMatch {
                    score,
                    matched_filename: name.clone(),
                });
            }
        }

        if let Some(m) = &best {
            warn!(score = m.score, matched = %m.matched_filename, "submission flagged for potential plagiarism");
        }
        best
    }

    /// Hash-and-lookup only. Nothing is moved or logged.
    pub fn check_duplicate(&self, path: &Path) -> Result<bool> {
        let hash = hash_file(path)?;
        let found = self.index.contains(&hash)?;
        debug!(path = %path.display(), found, "duplicate check");
        Ok(found)
    }

    /// Sorted stored file names.
    pub fn list_submissions(&self) -> Result<Vec<String>> {
        list_stored_files(&self.config.submissions_dir)
    }

    /// Every audit log entry, oldest first.
    pub fn history(&self) -> Result<Vec<SubmissionRecord>> {
        self.log.entries()
    }

    /// Compare storage contents with the audit log.
    pub fn verify(&self) -> Result<ConsistencyReport> {
        consistency::check_consistency(&self.config.submissions_dir, &self.log)
    }

    fn stored_path(&self, name: &str) -> PathBuf {
        self.config.submissions_dir.join(name)
    }
}
