//! Application configuration for examsubmit.
//!
//! User config lives at `~/.examsubmit/examsubmit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExamSubmitError, Result};
use crate::types::{DEFAULT_MAX_SIZE_BYTES, DEFAULT_PLAGIARISM_THRESHOLD, normalize_extension};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "examsubmit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".examsubmit";

// ---------------------------------------------------------------------------
// Config structs (matching examsubmit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where accepted documents and the audit log live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Near-duplicate detection.
    #[serde(default)]
    pub plagiarism: PlagiarismConfig,

    /// Duplicate index strategy.
    #[serde(default)]
    pub index: IndexConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Flat directory holding accepted documents.
    #[serde(default = "default_submissions_dir")]
    pub submissions_dir: String,

    /// Append-only audit log file.
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            submissions_dir: default_submissions_dir(),
            log_file: default_log_file(),
        }
    }
}

fn default_submissions_dir() -> String {
    "Submissions".into()
}
fn default_log_file() -> String {
    "submission_log.txt".into()
}

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted upload, inclusive.
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,

    /// Accepted extensions, compared case-insensitively.
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size(),
            allowed_extensions: default_extensions(),
        }
    }
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE_BYTES
}
fn default_extensions() -> Vec<String> {
    vec!["pdf".into(), "docx".into()]
}

/// `[plagiarism]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismConfig {
    /// Whether to compare new submissions against stored ones at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scores strictly above this value raise a warning.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
}

impl Default for PlagiarismConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_threshold() -> u8 {
    DEFAULT_PLAGIARISM_THRESHOLD
}

/// How duplicate lookups are answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Hash set rebuilt from the audit log at startup.
    #[default]
    Memory,
    /// Re-read the audit log on every lookup.
    Scan,
}

/// `[index]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub mode: IndexMode,
}

// ---------------------------------------------------------------------------
// Desk config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for a submission desk.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    /// Directory of accepted documents (created if absent).
    pub submissions_dir: PathBuf,
    /// Path of the audit log.
    pub log_file: PathBuf,
    /// Inclusive size ceiling.
    pub max_size_bytes: u64,
    /// Lowercased accepted extensions without dots.
    pub allowed_extensions: Vec<String>,
    /// Whether to run the similarity scan.
    pub plagiarism_enabled: bool,
    /// Scores strictly above this value raise a warning.
    pub plagiarism_threshold: u8,
    /// Duplicate index strategy.
    pub index_mode: IndexMode,
}

impl From<&AppConfig> for DeskConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            submissions_dir: PathBuf::from(&config.storage.submissions_dir),
            log_file: PathBuf::from(&config.storage.log_file),
            max_size_bytes: config.limits.max_size_bytes,
            allowed_extensions: config
                .limits
                .allowed_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .filter(|e| !e.is_empty())
                .collect(),
            plagiarism_enabled: config.plagiarism.enabled,
            plagiarism_threshold: config.plagiarism.threshold,
            index_mode: config.index.mode,
        }
    }
}

impl DeskConfig {
    /// Defaults rooted at `root` (handy for tests and one-off runs).
    pub fn in_dir(root: &Path) -> Self {
        let mut config = Self::from(&AppConfig::default());
        config.submissions_dir = root.join(&config.submissions_dir);
        config.log_file = root.join(&config.log_file);
        config
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_extensions.is_empty() {
            return Err(ExamSubmitError::config(
                "limits.allowed_extensions must list at least one extension",
            ));
        }
        if self.plagiarism_threshold > 100 {
            return Err(ExamSubmitError::config(format!(
                "plagiarism.threshold must be within 0..=100, got {}",
                self.plagiarism_threshold
            )));
        }
        if self.log_file.parent() == Some(self.submissions_dir.as_path()) {
            return Err(ExamSubmitError::config(
                "the audit log must not live inside the submissions directory",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.examsubmit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExamSubmitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.examsubmit/examsubmit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ExamSubmitError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ExamSubmitError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ExamSubmitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ExamSubmitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ExamSubmitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
