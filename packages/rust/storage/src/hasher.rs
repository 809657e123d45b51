//! Content hashing for exact-duplicate detection.
//!
//! Hashes raw bytes only: the file name and submission time never affect the
//! digest, so byte-identical uploads always collide.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use examsubmit_shared::{ExamSubmitError, Result};

const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 of `bytes` as lowercase hex (64 chars).
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a file's contents, streamed in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| ExamSubmitError::io(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| ExamSubmitError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
