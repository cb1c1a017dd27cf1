//! Local State Inspector.
//!
//! Cheap, read-only classification of a manifest entry against the local
//! filesystem. Only file sizes are looked at here; content checks belong to
//! [`crate::verify`].

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::manifest::FileEntry;
use crate::verify::heuristics::trailing_excess;

/// Classification of one local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// No local bytes.
    Missing,
    /// Fewer bytes than expected; resumable.
    Incomplete,
    /// Size matches, content not (yet) checked.
    CompleteUnverified,
    /// Size matches and the digest matched the manifest checksum.
    CompleteVerified,
    /// Size or content cannot be trusted.
    Suspicious,
}

impl FileStatus {
    /// Whether the size matches the manifest.
    pub fn is_complete(self) -> bool {
        matches!(self, Self::CompleteUnverified | Self::CompleteVerified)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Missing => "missing",
            Self::Incomplete => "incomplete",
            Self::CompleteUnverified => "complete (unverified)",
            Self::CompleteVerified => "complete (verified)",
            Self::Suspicious => "suspicious",
        };
        f.write_str(label)
    }
}

/// Why a file was judged [`FileStatus::Suspicious`].
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationDetail {
    /// SHA-256 of the local content differs from the manifest.
    ChecksumMismatch { expected: String, actual: String },
    /// Local file extends past the expected size by `excess` bytes.
    TrailingData { excess: u64 },
    /// Sampled content is mostly zero bytes, or ends in a long zero run.
    ZeroFilled {
        zero_fraction: f64,
        trailing_zeros: u64,
    },
}

impl fmt::Display for VerificationDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch { .. } => write!(f, "checksum mismatch"),
            Self::TrailingData { excess } => write!(f, "{} bytes trailing", excess),
            Self::ZeroFilled {
                zero_fraction,
                trailing_zeros,
            } => write!(
                f,
                "likely zero-filled: {:.1}% zeros, {:.1}MB trailing",
                zero_fraction * 100.0,
                *trailing_zeros as f64 / (1024.0 * 1024.0)
            ),
        }
    }
}

/// Derived state of one local file, recomputed on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFileState {
    bytes_on_disk: u64,
    status: FileStatus,
    detail: Option<VerificationDetail>,
}

impl LocalFileState {
    /// Classify a local size against the expected size.
    ///
    /// `bytes_on_disk` is `None` when the file does not exist. An empty file
    /// counts as missing unless the manifest itself expects zero bytes.
    pub fn classify(bytes_on_disk: Option<u64>, expected_size: u64) -> Self {
        let bytes = bytes_on_disk.unwrap_or(0);
        match bytes_on_disk {
            None => Self::new(0, FileStatus::Missing, None),
            Some(0) if expected_size > 0 => Self::new(0, FileStatus::Missing, None),
            Some(n) if n < expected_size => Self::new(n, FileStatus::Incomplete, None),
            Some(_) => match trailing_excess(bytes, expected_size) {
                Some(excess) => Self::new(
                    bytes,
                    FileStatus::Suspicious,
                    Some(VerificationDetail::TrailingData { excess }),
                ),
                None => Self::new(bytes, FileStatus::CompleteUnverified, None),
            },
        }
    }

    fn new(bytes_on_disk: u64, status: FileStatus, detail: Option<VerificationDetail>) -> Self {
        Self {
            bytes_on_disk,
            status,
            detail,
        }
    }

    /// Size of the local file, 0 if absent.
    pub fn bytes_on_disk(&self) -> u64 {
        self.bytes_on_disk
    }

    /// Current classification.
    pub fn status(&self) -> FileStatus {
        self.status
    }

    /// Reason for a suspicious classification.
    pub fn detail(&self) -> Option<&VerificationDetail> {
        self.detail.as_ref()
    }

    /// Bytes still missing for a missing or incomplete file; 0 otherwise.
    pub fn remaining_bytes(&self, expected_size: u64) -> u64 {
        match self.status {
            FileStatus::Missing | FileStatus::Incomplete => {
                expected_size.saturating_sub(self.bytes_on_disk)
            }
            _ => 0,
        }
    }

    /// Bytes a normal (non-forced) run will fetch for this file.
    ///
    /// Oversized files are refetched in full; size-complete files are not
    /// fetched at all.
    pub fn bytes_to_transfer(&self, expected_size: u64) -> u64 {
        if self.bytes_on_disk > expected_size {
            expected_size
        } else {
            self.remaining_bytes(expected_size)
        }
    }

    /// Share of the expected size already on disk, in percent.
    pub fn percent_complete(&self, expected_size: u64) -> f64 {
        if expected_size == 0 {
            100.0
        } else {
            self.bytes_on_disk as f64 / expected_size as f64 * 100.0
        }
    }

    /// Promote a size-complete file after its digest matched.
    ///
    /// Has no effect on any other status.
    pub fn into_verified(self) -> Self {
        match self.status {
            FileStatus::CompleteUnverified => {
                Self::new(self.bytes_on_disk, FileStatus::CompleteVerified, None)
            }
            _ => self,
        }
    }

    /// Mark a size-complete or oversized file as untrustworthy.
    ///
    /// Missing and incomplete files keep their status: a short file is never
    /// suspicious, only unfinished.
    pub fn into_suspicious(self, detail: VerificationDetail) -> Self {
        match self.status {
            FileStatus::Missing | FileStatus::Incomplete => self,
            _ => Self::new(self.bytes_on_disk, FileStatus::Suspicious, Some(detail)),
        }
    }
}

/// Classify `entry` against the file at its location under `root`.
///
/// Only stats the file. A directory or other non-file at the path is
/// reported as a read failure.
pub fn inspect(entry: &FileEntry, root: &Path) -> SyncResult<LocalFileState> {
    let path = entry.local_path(root);
    let bytes_on_disk = match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        Ok(_) => {
            return Err(SyncError::ReadFailed {
                path,
                source: io::Error::new(io::ErrorKind::Other, "not a regular file"),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(SyncError::ReadFailed { path, source: e }),
    };

    let state = LocalFileState::classify(bytes_on_disk, entry.expected_size());
    trace!(
        path = entry.relative_path(),
        bytes_on_disk = state.bytes_on_disk(),
        expected = entry.expected_size(),
        status = %state.status(),
        "Inspected local file"
    );
    Ok(state)
}
