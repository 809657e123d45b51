//! Moves validated uploads into the submissions directory.
//!
//! A move either completes fully or leaves nothing behind in storage:
//! 1. The target name is reserved with `create_new`, so an existing stored
//!    file is never overwritten.
//! 2. `rename` is tried first (atomic on the same filesystem).
//! 3. If that fails (e.g. across volumes), the bytes are copied into a hidden
//!    `.partial` temp file, synced, renamed over the reservation, and only
//!    then is the source deleted.
//! 4. Any failure removes the temp file and the reservation.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use examsubmit_shared::{ExamSubmitError, Result, normalize_extension};

/// Upper bound on `_N` suffixes tried for one base name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Owns the submissions directory for writing.
#[derive(Debug, Clone)]
pub struct Ingestor {
    dir: PathBuf,
}

impl Ingestor {
    /// Use `dir` as the submissions directory, creating it if absent.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ExamSubmitError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// The submissions directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `source` into storage, naming it after the student and the
    /// current time. Returns the stored file name.
    pub fn ingest(&self, source: &Path, student_name: &str, extension: &str) -> Result<String> {
        self.ingest_at(source, student_name, extension, Utc::now())
    }

    /// Same as [`Ingestor::ingest`] with an explicit timestamp.
    #[instrument(skip_all, fields(source = %source.display(), student = %student_name))]
    pub fn ingest_at(
        &self,
        source: &Path,
        student_name: &str,
        extension: &str,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let base = stored_base_name(student_name, at);
        let ext = normalize_extension(extension);
        let (name, target) = self.reserve(&base, &ext)?;

        if let Err(e) = self.move_into(source, &target) {
            if let Err(cleanup) = std::fs::remove_file(&target) {
                warn!(target = %target.display(), error = %cleanup, "failed to remove name reservation");
            }
            return Err(e);
        }

        info!(stored = %name, "file ingested");
        Ok(name)
    }

    /// Undo an ingestion: move `stored_name` back to `original`.
    ///
    /// Used when a later step fails and the stored file must not stay
    /// without an audit entry.
    #[instrument(skip_all, fields(stored = %stored_name, original = %original.display()))]
    pub fn restore(&self, stored_name: &str, original: &Path) -> Result<()> {
        let stored = self.dir.join(stored_name);
        if std::fs::rename(&stored, original).is_ok() {
            info!("ingestion rolled back");
            return Ok(());
        }

        copy_synced(&stored, original)?;
        std::fs::remove_file(&stored).map_err(|e| ExamSubmitError::io(&stored, e))?;
        info!("ingestion rolled back via copy");
        Ok(())
    }

    /// Claim the first free `<base>[_N].<ext>` in the directory.
    fn reserve(&self, base: &str, ext: &str) -> Result<(String, PathBuf)> {
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let name = if attempt == 1 {
                format!("{base}.{ext}")
            } else {
                format!("{base}_{attempt}.{ext}")
            };
            let path = self.dir.join(&name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    if attempt > 1 {
                        debug!(%name, "name taken within the same second, using suffix");
                    }
                    return Ok((name, path));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(ExamSubmitError::io(&path, e)),
            }
        }

        Err(ExamSubmitError::Storage(format!(
            "no free file name for '{base}.{ext}' after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    fn move_into(&self, source: &Path, target: &Path) -> Result<()> {
        match std::fs::rename(source, target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
                Err(ExamSubmitError::io(source, e))
            }
            Err(e) => {
                debug!(error = %e, "rename failed, falling back to copy + delete");
                self.copy_then_delete(source, target)
            }
        }
    }

    /// Cross-volume move. On error the target still holds only the empty
    /// reservation (or the rolled-back copy was removed); the caller deletes it.
    fn copy_then_delete(&self, source: &Path, target: &Path) -> Result<()> {
        let temp = self.dir.join(format!(".{}.partial", Uuid::now_v7()));

        let copied = copy_synced(source, &temp).and_then(|()| {
            std::fs::rename(&temp, target).map_err(|e| ExamSubmitError::io(target, e))
        });
        if let Err(e) = copied {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }

        if let Err(e) = std::fs::remove_file(source) {
            // Leave the upload where it was rather than keeping two owners.
            warn!(source = %source.display(), error = %e, "could not remove source, rolling back copy");
            return Err(ExamSubmitError::io(source, e));
        }
        Ok(())
    }
}

fn copy_synced(source: &Path, dest: &Path) -> Result<()> {
    let mut src = File::open(source).map_err(|e| ExamSubmitError::io(source, e))?;
    let mut dst = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| ExamSubmitError::io(dest, e))?;
    std::io::copy(&mut src, &mut dst).map_err(|e| ExamSubmitError::io(dest, e))?;
    dst.sync_all().map_err(|e| ExamSubmitError::io(dest, e))
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// `<sanitized student>_<YYYYMMDD_HHMMSS>` in local time.
pub fn stored_base_name(student_name: &str, at: DateTime<Utc>) -> String {
    let stamp = at.with_timezone(&Local).format("%Y%m%d_%H%M%S");
    format!("{}_{stamp}", sanitize_name(student_name))
}

/// Make a student name safe to embed in a file name.
///
/// Letters, digits, `-`, `_` and `.` survive; whitespace, path separators and
/// everything else become `_`. Leading dots are dropped so the result can
/// never be hidden or a parent-directory reference.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "student".to_string()
    } else {
        cleaned.to_string()
    }
}
