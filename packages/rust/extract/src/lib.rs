//! Plain-text extraction from submitted documents.
//!
//! | Extractor | Extensions |
//! |-----------|------------|
//! | [`PdfExtractor`] | `.pdf` |
//! | [`DocxExtractor`] | `.docx` |
//!
//! [`ExtractorRegistry`] routes a file to an extractor by extension. The
//! submission pipeline only ever calls [`ExtractorRegistry::extract_or_empty`]:
//! a document whose text cannot be read is treated as having no text, which
//! never matches anything during plagiarism checks.

pub mod docx;
pub mod pdf;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use examsubmit_shared::{ExamSubmitError, Result, normalize_extension};

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;

/// Turns a stored document into plain text, in document order.
pub trait TextExtractor: Send + Sync {
    /// Lowercase extensions (no dot) this extractor handles.
    fn extensions(&self) -> &[&str];

    /// Extract all text. Errors on unreadable or malformed files.
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Registry of text extractors keyed by file extension.
#[derive(Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the PDF and DOCX extractors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfExtractor);
        registry.register(DocxExtractor);
        registry
    }

    /// Register an extractor for every extension it claims. Later
    /// registrations replace earlier ones.
    pub fn register<E: TextExtractor + 'static>(&mut self, extractor: E) {
        let extractor: Arc<dyn TextExtractor> = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert(normalize_extension(ext), Arc::clone(&extractor));
        }
    }

    /// Extractor for a path, chosen by its extension.
    pub fn get_for_path(&self, path: &Path) -> Option<Arc<dyn TextExtractor>> {
        let ext = path.extension()?.to_str()?;
        self.by_extension.get(&normalize_extension(ext)).cloned()
    }

    /// Extract text, failing on unsupported types and parser errors.
    pub fn extract(&self, path: &Path) -> Result<String> {
        let extractor = self.get_for_path(path).ok_or_else(|| {
            ExamSubmitError::Extraction(format!("no extractor for {}", path.display()))
        })?;
        extractor.extract_text(path)
    }

    /// Extract text, degrading any failure to an empty string.
    pub fn extract_or_empty(&self, path: &Path) -> String {
        match self.extract(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "text extraction failed, treating as empty");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shouting;

    impl TextExtractor for Shouting {
        fn extensions(&self) -> &[&str] {
            &["PDF"]
        }

        fn extract_text(&self, _path: &Path) -> Result<String> {
            Ok("LOUD".into())
        }
    }

    #[test]
    fn defaults_cover_pdf_and_docx() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.get_for_path(Path::new("a.pdf")).is_some());
        assert!(registry.get_for_path(Path::new("a.DOCX")).is_some());
        assert!(registry.get_for_path(Path::new("a.txt")).is_none());
        assert!(registry.get_for_path(Path::new("no_extension")).is_none());
    }

    #[test]
    fn later_registration_wins() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Shouting);
        assert_eq!(registry.extract(Path::new("whatever.pdf")).unwrap(), "LOUD");
    }

    #[test]
    fn failures_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.docx");
        std::fs::write(&broken, b"not a zip").unwrap();

        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.extract(&broken).is_err());
        assert_eq!(registry.extract_or_empty(&broken), "");
        assert_eq!(registry.extract_or_empty(&dir.path().join("notes.txt")), "");
    }
}
