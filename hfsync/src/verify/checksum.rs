//! Streaming SHA-256 for local files.
//!
//! Files are hashed in fixed-size chunks so memory use is independent of file
//! size. LFS object ids on the hub are SHA-256 digests, so the result can be
//! compared directly against a manifest checksum.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{SyncError, SyncResult};
use crate::progress::{self, InterruptFlag, Progress};

/// Buffer size for reading files during checksum calculation (64KB).
pub const CHECKSUM_CHUNK_SIZE: usize = 64 * 1024;

/// Calculate the SHA-256 checksum of a file.
///
/// `progress` receives `(bytes_hashed, file_size)` after every chunk. The
/// interrupt flag is polled between chunks.
///
/// # Returns
///
/// The lowercase hexadecimal SHA-256 hash of the file contents.
pub fn calculate_file_checksum(
    path: &Path,
    chunk_size: usize,
    progress: Option<Progress<'_>>,
    interrupt: &InterruptFlag,
) -> SyncResult<String> {
    let read_err = |e| SyncError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let total = file.metadata().map_err(read_err)?.len();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut hashed = 0u64;

    loop {
        if interrupt.is_triggered() {
            return Err(SyncError::Interrupted);
        }

        let bytes_read = file.read(&mut buffer).map_err(read_err)?;
        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
        hashed += bytes_read as u64;
        progress::report(progress, hashed, total);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare two hex digests, ignoring case and surrounding whitespace.
pub fn checksums_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// Verify that a file matches an expected checksum.
///
/// Returns `Ok(())` if the checksum matches, or `ChecksumMismatch` if it
/// doesn't. `display_path` is the name used in the error.
pub fn verify_checksum(
    path: &Path,
    display_path: &str,
    expected: &str,
    progress: Option<Progress<'_>>,
    interrupt: &InterruptFlag,
) -> SyncResult<()> {
    let actual = calculate_file_checksum(path, CHECKSUM_CHUNK_SIZE, progress, interrupt)?;
    if !checksums_match(expected, &actual) {
        return Err(SyncError::ChecksumMismatch {
            path: display_path.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
