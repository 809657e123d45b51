//! Submission pipeline and domain logic for examsubmit.
//!
//! This crate ties together validation, duplicate detection, ingestion,
//! text extraction and similarity scoring into [`SubmissionDesk`].

pub mod consistency;
pub mod pipeline;
pub mod similarity;
pub mod validator;

pub use consistency::ConsistencyReport;
pub use pipeline::{CancelToken, ProgressReporter, SilentProgress, SubmissionDesk};
pub use similarity::{RatioScorer, SimilarityScorer};
pub use validator::Validator;
