//! Shared types, error model, and configuration for examsubmit.
//!
//! This crate is the foundation depended on by all other examsubmit crates.
//! It provides:
//! - [`ExamSubmitError`]: the unified error type
//! - Domain types ([`SubmissionRecord`], [`Candidate`], [`SubmissionResult`], [`RejectReason`])
//! - Configuration ([`AppConfig`], [`DeskConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DeskConfig, IndexConfig, IndexMode, LimitsConfig, PlagiarismConfig, StorageConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ExamSubmitError, Result};
pub use types::{
    Candidate, DEFAULT_MAX_SIZE_BYTES, DEFAULT_PLAGIARISM_THRESHOLD, PlagiarismMatch,
    RejectReason, SubmissionReceipt, SubmissionRecord, SubmissionResult, normalize_extension,
};
