//! Upload validation: existence, file type, size ceiling.

use std::path::Path;

use examsubmit_shared::{Candidate, DeskConfig, RejectReason, normalize_extension};

/// Checks an upload against the accepted types and the size limit.
///
/// Rules run in order and the first failure wins:
/// 1. the file exists,
/// 2. its extension is accepted (case-insensitive),
/// 3. it is no larger than the ceiling (inclusive).
#[derive(Debug, Clone)]
pub struct Validator {
    allowed_extensions: Vec<String>,
    max_size_bytes: u64,
}

impl Validator {
    pub fn new(allowed_extensions: &[String], max_size_bytes: u64) -> Self {
        Self {
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            max_size_bytes,
        }
    }

    pub fn from_config(config: &DeskConfig) -> Self {
        Self::new(&config.allowed_extensions, config.max_size_bytes)
    }

    /// Validate a raw `(path, extension, size)` triple.
    pub fn validate(
        &self,
        path: &Path,
        declared_extension: &str,
        size_bytes: u64,
    ) -> Result<(), RejectReason> {
        if !path.is_file() {
            return Err(RejectReason::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let ext = normalize_extension(declared_extension);
        if !self.allowed_extensions.iter().any(|allowed| *allowed == ext) {
            return Err(RejectReason::UnsupportedType {
                extension: ext,
                allowed: self.allowed_extensions.join(", "),
            });
        }

        if size_bytes > self.max_size_bytes {
            return Err(RejectReason::TooLarge {
                size_bytes,
                max_bytes: self.max_size_bytes,
            });
        }

        Ok(())
    }

    /// Validate a candidate built from an upload path.
    pub fn validate_candidate(&self, candidate: &Candidate) -> Result<(), RejectReason> {
        self.validate(
            &candidate.source_path,
            &candidate.declared_extension,
            candidate.size_bytes,
        )
    }
}
