//! End-to-end behavior of the submission desk against a real temp directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use examsubmit_core::{SimilarityScorer, SubmissionDesk};
use examsubmit_extract::{ExtractorRegistry, TextExtractor};
use examsubmit_shared::{DEFAULT_MAX_SIZE_BYTES, DeskConfig, RejectReason, Result};
use examsubmit_storage::hash_file;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Env {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    uploads: PathBuf,
}

impl Env {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let uploads = root.join("uploads");
        std::fs::create_dir(&uploads).unwrap();
        Self {
            _tmp: tmp,
            root,
            uploads,
        }
    }

    fn config(&self) -> DeskConfig {
        DeskConfig::in_dir(&self.root)
    }

    fn desk(&self) -> SubmissionDesk {
        SubmissionDesk::open(self.config()).unwrap()
    }

    fn upload(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.uploads.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// A minimal `.docx` whose body is `paragraphs`. `salt` changes the
    /// package bytes without changing the text.
    fn upload_docx(&self, name: &str, paragraphs: &[&str], salt: &str) -> PathBuf {
        let path = self.uploads.join(name);
        write_docx(&path, paragraphs, salt);
        path
    }

    fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.config().log_file)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }
}

fn write_docx(path: &Path, paragraphs: &[&str], salt: &str) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let document = format!("<w:document><w:body>{body}</w:body></w:document>");

    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(b"<Types/>").unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(document.as_bytes()).unwrap();
    zip.start_file("docProps/custom.xml", options).unwrap();
    zip.write_all(salt.as_bytes()).unwrap();
    zip.finish().unwrap();
}

const ESSAY: &[&str] = &[
    "Photosynthesis converts light energy into chemical energy stored in glucose.",
    "Chlorophyll absorbs mostly blue and red wavelengths of visible light.",
];

const OTHER_ESSAY: &[&str] = &[
    "The French Revolution began in 1789 and reshaped European politics.",
    "Its causes included fiscal crisis, famine and Enlightenment ideas.",
];

// ---------------------------------------------------------------------------
// Acceptance and storage
// ---------------------------------------------------------------------------

#[test]
fn accepted_file_keeps_its_bytes_and_leaves_upload_path() {
    let env = Env::new();
    let desk = env.desk();
    let payload = b"%PDF-1.7 pretend body".to_vec();
    let source = env.upload("essay.pdf", &payload);

    let result = desk.submit("Ada Lovelace", &source).unwrap();
    let receipt = result.receipt().expect("accepted").clone();

    assert!(!source.exists());
    assert_eq!(std::fs::read(&receipt.stored_path).unwrap(), payload);
    assert!(
        receipt
            .record
            .stored_filename
            .starts_with("Ada_Lovelace_")
    );
    assert!(receipt.record.stored_filename.ends_with(".pdf"));
    assert_eq!(receipt.record.content_hash, examsubmit_storage::hash_bytes(&payload));
}

#[test]
fn n_submissions_give_n_entries_and_n_files_in_bijection() {
    let env = Env::new();
    let desk = env.desk();

    for i in 0..5 {
        let source = env.upload(&format!("doc{i}.pdf"), format!("document #{i}").as_bytes());
        assert!(desk.submit(&format!("Student {i}"), &source).unwrap().is_accepted());
    }

    let stored = desk.list_submissions().unwrap();
    let history = desk.history().unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(history.len(), 5);
    assert_eq!(env.log_lines().len(), 5);

    for record in &history {
        let path = env.config().submissions_dir.join(&record.stored_filename);
        assert_eq!(hash_file(&path).unwrap(), record.content_hash);
    }
    assert!(desk.verify().unwrap().is_consistent());
}

#[test]
fn same_second_resubmission_does_not_overwrite() {
    let env = Env::new();
    let desk = env.desk();

    let a = env.upload("a.pdf", b"first draft");
    let b = env.upload("b.pdf", b"second draft");
    assert!(desk.submit("Ada", &a).unwrap().is_accepted());
    assert!(desk.submit("Ada", &b).unwrap().is_accepted());

    assert_eq!(desk.list_submissions().unwrap().len(), 2);
    assert!(desk.verify().unwrap().is_consistent());
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn duplicate_bytes_rejected_regardless_of_name_or_student() {
    let env = Env::new();
    let desk = env.desk();

    let first = env.upload("essay.pdf", b"identical bytes");
    assert!(desk.submit("Ada", &first).unwrap().is_accepted());

    let copy = env.upload("totally_different_name.PDF", b"identical bytes");
    let result = desk.submit("Grace", &copy).unwrap();

    match result.reject_reason() {
        Some(RejectReason::DuplicateSubmission { existing }) => {
            assert!(existing.starts_with("Ada_"));
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert!(copy.exists(), "rejected upload must stay where it was");
    assert_eq!(desk.list_submissions().unwrap().len(), 1);
    assert_eq!(env.log_lines().len(), 1);
}

#[test]
fn valid_document_with_wrong_extension_is_unsupported() {
    let env = Env::new();
    let desk = env.desk();

    let real_docx = env.upload_docx("essay.docx", ESSAY, "a");
    let renamed = env.uploads.join("essay.txt");
    std::fs::rename(&real_docx, &renamed).unwrap();

    let result = desk.submit("Ada", &renamed).unwrap();
    assert!(matches!(
        result.reject_reason(),
        Some(RejectReason::UnsupportedType { .. })
    ));
    assert!(renamed.exists());
}

#[test]
fn size_ceiling_is_exactly_five_mebibytes() {
    let env = Env::new();
    let desk = env.desk();
    let limit = DEFAULT_MAX_SIZE_BYTES as usize;

    let mut at_limit = vec![b'a'; limit];
    at_limit[0] = b'1';
    let ok = env.upload("at_limit.pdf", &at_limit);
    assert!(desk.submit("Ada", &ok).unwrap().is_accepted());

    let over = env.upload("over.pdf", &vec![b'b'; limit + 1]);
    let result = desk.submit("Ada", &over).unwrap();
    assert_eq!(
        result.reject_reason(),
        Some(&RejectReason::TooLarge {
            size_bytes: DEFAULT_MAX_SIZE_BYTES + 1,
            max_bytes: DEFAULT_MAX_SIZE_BYTES,
        })
    );
}

#[test]
fn missing_upload_is_file_not_found() {
    let env = Env::new();
    let desk = env.desk();
    let result = desk.submit("Ada", &env.uploads.join("ghost.pdf")).unwrap();
    assert!(matches!(
        result.reject_reason(),
        Some(RejectReason::FileNotFound { .. })
    ));
    assert!(env.log_lines().is_empty());
}

#[test]
fn name_with_line_break_cannot_corrupt_the_log() {
    let env = Env::new();
    let desk = env.desk();

    let source = env.upload("essay.pdf", b"one entry per line");
    let result = desk.submit("Ada\nLovelace", &source).unwrap();
    assert_eq!(
        result.reject_reason(),
        Some(&RejectReason::InvalidStudentName)
    );
    assert!(source.exists());
    assert!(env.log_lines().is_empty());

    assert!(desk.submit("Ada Lovelace", &source).unwrap().is_accepted());
    drop(desk);

    let desk = env.desk();
    let again = env.upload("again.pdf", b"one entry per line");
    assert!(matches!(
        desk.submit("Grace", &again).unwrap().reject_reason(),
        Some(RejectReason::DuplicateSubmission { .. })
    ));
    assert_eq!(desk.history().unwrap().len(), 1);
    assert!(desk.verify().unwrap().is_consistent());
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[test]
fn unusable_storage_rejects_without_touching_upload_or_log() {
    let env = Env::new();
    let desk = env.desk();
    let submissions = env.config().submissions_dir;
    std::fs::remove_dir_all(&submissions).unwrap();
    std::fs::write(&submissions, b"not a directory").unwrap();

    let source = env.upload("essay.pdf", b"cannot be stored");
    let result = desk.submit("Ada", &source).unwrap();

    assert!(matches!(
        result.reject_reason(),
        Some(RejectReason::IngestionFailed { .. })
    ));
    assert_eq!(std::fs::read(&source).unwrap(), b"cannot be stored");
    assert!(env.log_lines().is_empty());
}

#[test]
fn failed_log_append_moves_upload_back() {
    let env = Env::new();
    let desk = env.desk();
    let log_file = env.config().log_file;
    std::fs::remove_file(&log_file).unwrap();
    std::fs::create_dir(&log_file).unwrap();

    let source = env.upload("essay.pdf", b"never logged");
    assert!(desk.submit("Ada", &source).is_err());

    assert_eq!(std::fs::read(&source).unwrap(), b"never logged");
    assert!(desk.list_submissions().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Plagiarism
// ---------------------------------------------------------------------------

#[test]
fn identical_text_in_different_bytes_warns_at_100() {
    let env = Env::new();
    let desk = env.desk();

    let first = env.upload_docx("ada.docx", ESSAY, "salt-one");
    let first_result = desk.submit("Ada", &first).unwrap();
    assert!(first_result.is_accepted());
    assert_eq!(
        first_result.plagiarism_score(),
        None,
        "a document must not be compared with itself"
    );

    let copied = env.upload_docx("grace.docx", ESSAY, "salt-two");
    let result = desk.submit("Grace", &copied).unwrap();

    assert!(result.is_accepted(), "plagiarism warnings never block");
    assert_eq!(result.plagiarism_score(), Some(100));
    if let examsubmit_shared::SubmissionResult::AcceptedWithPlagiarismWarning { matched, .. } =
        &result
    {
        assert_eq!(
            &matched.matched_filename,
            &first_result.receipt().unwrap().record.stored_filename
        );
    }
    assert_eq!(desk.history().unwrap().len(), 2);
}

#[test]
fn unrelated_text_gets_no_warning() {
    let env = Env::new();
    let desk = env.desk();

    let first = env.upload_docx("ada.docx", ESSAY, "x");
    assert!(desk.submit("Ada", &first).unwrap().is_accepted());

    let other = env.upload_docx("grace.docx", OTHER_ESSAY, "y");
    let result = desk.submit("Grace", &other).unwrap();
    assert!(matches!(
        result,
        examsubmit_shared::SubmissionResult::Accepted { .. }
    ));
}

#[test]
fn unreadable_documents_never_match() {
    let env = Env::new();
    let desk = env.desk();

    let a = env.upload("a.pdf", b"garbage one");
    let b = env.upload("b.pdf", b"garbage two");
    assert!(desk.submit("Ada", &a).unwrap().is_accepted());
    let result = desk.submit("Grace", &b).unwrap();
    assert_eq!(result.plagiarism_score(), None);
}

#[test]
fn disabled_scan_skips_warning() {
    let env = Env::new();
    let mut config = env.config();
    config.plagiarism_enabled = false;
    let desk = SubmissionDesk::open(config).unwrap();

    let a = env.upload_docx("a.docx", ESSAY, "1");
    let b = env.upload_docx("b.docx", ESSAY, "2");
    assert!(desk.submit("Ada", &a).unwrap().is_accepted());
    assert_eq!(desk.submit("Grace", &b).unwrap().plagiarism_score(), None);
}

struct FileAsText;

impl TextExtractor for FileAsText {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract_text(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| examsubmit_shared::ExamSubmitError::io(path, e))
    }
}

/// Scores 95 for any pair whose first words match, 0 otherwise.
struct FirstWord;

impl SimilarityScorer for FirstWord {
    fn score(&self, a: &str, b: &str) -> u8 {
        if a.split_whitespace().next() == b.split_whitespace().next() {
            95
        } else {
            0
        }
    }
}

#[test]
fn custom_extractor_and_scorer_are_used() {
    let env = Env::new();
    let mut registry = ExtractorRegistry::new();
    registry.register(FileAsText);
    let desk = env.desk().with_extractors(registry).with_scorer(FirstWord);

    let a = env.upload("a.pdf", b"Hamlet is a tragedy");
    let b = env.upload("b.pdf", b"Hamlet hesitates too long");
    let c = env.upload("c.pdf", b"Macbeth is ambitious");

    assert_eq!(desk.submit("Ada", &a).unwrap().plagiarism_score(), None);
    assert_eq!(desk.submit("Grace", &b).unwrap().plagiarism_score(), Some(95));
    assert_eq!(desk.submit("Alan", &c).unwrap().plagiarism_score(), None);
}

#[test]
fn cold_start_files_join_the_comparison_corpus() {
    let env = Env::new();
    let config = env.config();
    std::fs::create_dir_all(&config.submissions_dir).unwrap();
    write_docx(&config.submissions_dir.join("old_2024.docx"), ESSAY, "legacy");

    let desk = env.desk();
    let report = desk.verify().unwrap();
    assert_eq!(report.untracked_files, vec!["old_2024.docx"]);

    let copy = env.upload_docx("new.docx", ESSAY, "fresh");
    let result = desk.submit("Ada", &copy).unwrap();
    assert_eq!(result.plagiarism_score(), Some(100));
}

// ---------------------------------------------------------------------------
// Query entry points
// ---------------------------------------------------------------------------

#[test]
fn check_duplicate_is_read_only() {
    let env = Env::new();
    let desk = env.desk();

    let fresh = env.upload("fresh.pdf", b"never seen");
    assert!(!desk.check_duplicate(&fresh).unwrap());

    let original = env.upload("orig.pdf", b"seen before");
    desk.submit("Ada", &original).unwrap();
    let log_before = env.log_lines();
    let listing_before = desk.list_submissions().unwrap();

    let probe = env.upload("probe.docx", b"seen before");
    assert!(desk.check_duplicate(&probe).unwrap());
    assert!(probe.exists());
    assert_eq!(env.log_lines(), log_before);
    assert_eq!(desk.list_submissions().unwrap(), listing_before);
}

#[test]
fn check_duplicate_on_missing_path_errors() {
    let env = Env::new();
    let desk = env.desk();
    let err = desk.check_duplicate(&env.uploads.join("nope.pdf")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn reopened_desk_remembers_accepted_hashes() {
    let env = Env::new();
    {
        let desk = env.desk();
        let a = env.upload("a.pdf", b"persisted");
        assert!(desk.submit("Ada", &a).unwrap().is_accepted());
    }

    let desk = env.desk();
    let again = env.upload("again.pdf", b"persisted");
    assert!(matches!(
        desk.submit("Grace", &again).unwrap().reject_reason(),
        Some(RejectReason::DuplicateSubmission { .. })
    ));
}

#[test]
fn concurrent_callers_keep_log_and_storage_in_step() {
    let env = Env::new();
    let desk = Arc::new(env.desk());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let desk = Arc::clone(&desk);
            let source = env.upload(&format!("t{i}.pdf"), format!("thread {i}").as_bytes());
            std::thread::spawn(move || desk.submit("Same Student", &source).unwrap())
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_accepted());
    }

    assert_eq!(desk.list_submissions().unwrap().len(), 8);
    assert_eq!(desk.history().unwrap().len(), 8);
    assert!(desk.verify().unwrap().is_consistent());
}
