//! PDF text extraction via `pdf-extract`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::debug;

use examsubmit_shared::{ExamSubmitError, Result};

use crate::TextExtractor;

/// Extractor for PDF files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| ExamSubmitError::io(path, e))?;

        // pdf-extract panics on some malformed inputs instead of erroring.
        let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)))
            .map_err(|_| {
                ExamSubmitError::Extraction(format!("{}: PDF parser panicked", path.display()))
            })?
            .map_err(|e| ExamSubmitError::Extraction(format!("{}: {e}", path.display())))?;

        let text = text.trim().to_string();
        debug!(path = %path.display(), chars = text.len(), "PDF text extracted");
        Ok(text)
    }
}
