//! Integrity Verifier.
//!
//! Confirms or refutes the integrity of size-complete local files:
//!
//! - with a manifest checksum, by a streaming SHA-256 pass (`checksum`)
//! - without one, by zero-byte heuristics (`heuristics`)
//!
//! The verifier never mutates files. Deleting a suspicious file is the
//! caller's decision.

pub mod checksum;
pub mod heuristics;

use std::path::Path;

use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::inspect::{FileStatus, LocalFileState, VerificationDetail};
use crate::manifest::FileEntry;
use crate::progress::{InterruptFlag, Progress};

use checksum::{calculate_file_checksum, checksums_match, CHECKSUM_CHUNK_SIZE};
use heuristics::{assess, profile_file, trailing_excess, ZeroProfile, ZeroScanConfig};

/// Outcome of a verification pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Digest matched the manifest checksum.
    Verified,
    /// No evidence either way. `profile` is set when the zero heuristic ran
    /// and found nothing alarming.
    Unverified { profile: Option<ZeroProfile> },
    /// Content or size cannot be trusted.
    Suspicious(VerificationDetail),
}

impl Verdict {
    /// Fold this verdict into a classification.
    pub fn apply(&self, state: LocalFileState) -> LocalFileState {
        match self {
            Verdict::Verified => state.into_verified(),
            Verdict::Unverified { .. } => state,
            Verdict::Suspicious(detail) => state.into_suspicious(detail.clone()),
        }
    }
}

/// Checksum and heuristic verification of local files.
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    zero_scan: ZeroScanConfig,
    chunk_size: usize,
    interrupt: InterruptFlag,
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        Self::new(ZeroScanConfig::default(), InterruptFlag::new())
    }
}

impl IntegrityVerifier {
    /// Create a verifier with the given heuristic settings.
    pub fn new(zero_scan: ZeroScanConfig, interrupt: InterruptFlag) -> Self {
        Self {
            zero_scan,
            chunk_size: CHECKSUM_CHUNK_SIZE,
            interrupt,
        }
    }

    /// Set the read size for checksum passes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Heuristic settings in use.
    pub fn zero_scan(&self) -> &ZeroScanConfig {
        &self.zero_scan
    }

    /// Verify the local copy of `entry` under `root`.
    ///
    /// Missing and incomplete files are not read at all. Oversized files are
    /// reported with the exact overflow length. `progress` receives
    /// `(bytes_hashed, file_size)` during a checksum pass.
    pub fn verify(
        &self,
        entry: &FileEntry,
        root: &Path,
        state: &LocalFileState,
        progress: Option<Progress<'_>>,
    ) -> SyncResult<Verdict> {
        let path = entry.local_path(root);
        let bytes_on_disk = state.bytes_on_disk();

        if matches!(state.status(), FileStatus::Missing | FileStatus::Incomplete) {
            debug!(
                path = entry.relative_path(),
                status = %state.status(),
                "Nothing to verify yet"
            );
            return Ok(Verdict::Unverified { profile: None });
        }

        if let Some(excess) = trailing_excess(bytes_on_disk, entry.expected_size()) {
            warn!(
                path = entry.relative_path(),
                excess, "Local file is larger than expected"
            );
            return Ok(Verdict::Suspicious(VerificationDetail::TrailingData {
                excess,
            }));
        }

        if let Some(expected) = entry.expected_checksum() {
            debug!(path = entry.relative_path(), "Computing SHA-256");
            let actual =
                calculate_file_checksum(&path, self.chunk_size, progress, &self.interrupt)?;
            if checksums_match(expected, &actual) {
                return Ok(Verdict::Verified);
            }
            warn!(
                path = entry.relative_path(),
                expected,
                actual = %actual,
                "Checksum mismatch"
            );
            return Ok(Verdict::Suspicious(VerificationDetail::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            }));
        }

        if bytes_on_disk < self.zero_scan.min_size {
            return Ok(Verdict::Unverified { profile: None });
        }

        let profile = profile_file(&path, &self.zero_scan, &self.interrupt)?;
        debug!(
            path = entry.relative_path(),
            zero_fraction = profile.zero_fraction(),
            trailing_zeros = profile.trailing_zeros,
            "Sampled zero-byte profile"
        );
        match assess(
            bytes_on_disk,
            entry.expected_size(),
            &profile,
            &self.zero_scan,
        ) {
            Some(detail) => {
                warn!(path = entry.relative_path(), %detail, "File looks corrupt");
                Ok(Verdict::Suspicious(detail))
            }
            None => Ok(Verdict::Unverified {
                profile: Some(profile),
            }),
        }
    }
}
