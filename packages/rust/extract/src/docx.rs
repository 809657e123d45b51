//! DOCX text extraction.
//!
//! A `.docx` file is a zip package; the body text lives in
//! `word/document.xml` as `<w:t>` runs grouped into `<w:p>` paragraphs.

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use examsubmit_shared::{ExamSubmitError, Result};

use crate::TextExtractor;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extractor for Office Open XML word-processing documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extensions(&self) -> &[&str] {
        &["docx"]
    }

    fn extract_text(&self, path: &Path) -> Result<String> {
        let file = std::fs::File::open(path).map_err(|e| ExamSubmitError::io(path, e))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ExamSubmitError::Extraction(format!("{}: {e}", path.display())))?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| {
                ExamSubmitError::Extraction(format!("{}: {DOCUMENT_PART}: {e}", path.display()))
            })?
            .read_to_string(&mut xml)
            .map_err(|e| ExamSubmitError::io(path, e))?;

        let text = document_xml_to_text(&xml);
        debug!(path = %path.display(), chars = text.len(), "DOCX text extracted");
        Ok(text)
    }
}

/// Flatten `word/document.xml` into plain text, one line per paragraph.
pub(crate) fn document_xml_to_text(xml: &str) -> String {
    static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>")
            .expect("valid regex")
    });

    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for caps in TOKEN_RE.captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            current.push_str(&unescape_xml(run.as_str()));
            continue;
        }
        match &caps[0] {
            "</w:p>" => paragraphs.push(std::mem::take(&mut current)),
            tag if tag.starts_with("<w:tab") => current.push('\t'),
            _ => current.push('\n'),
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n").trim().to_string()
}

/// Decode the five predefined XML entities plus numeric references.
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };

        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(|n| n.ok())
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
