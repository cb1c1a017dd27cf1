//! Corruption heuristics for files without a manifest checksum.
//!
//! The decision functions are pure over `(bytes_on_disk, expected_size,
//! sampled content)`; [`profile_file`] is the only part touching the disk.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{SyncError, SyncResult};
use crate::inspect::VerificationDetail;
use crate::progress::InterruptFlag;

/// Size of each sampled window (1 MiB).
pub const DEFAULT_SAMPLE_WINDOW: usize = 1024 * 1024;

/// Zero fraction above which sampled content is considered zero-filled.
pub const DEFAULT_ZERO_FRACTION_THRESHOLD: f64 = 0.90;

/// Length of a trailing zero run that flags a file (10 MiB).
pub const DEFAULT_TRAILING_ZERO_LIMIT: u64 = 10 * 1024 * 1024;

/// Files smaller than this are not sampled (10 MiB).
pub const DEFAULT_HEURISTIC_MIN_SIZE: u64 = 10 * 1024 * 1024;

/// Settings for the zero-byte heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroScanConfig {
    /// Bytes read per sampled window and per backward tail step.
    pub sample_window: usize,
    /// Flag when the sampled zero fraction exceeds this value (0.0 to 1.0).
    pub zero_fraction_threshold: f64,
    /// Flag when the file ends in more than this many zero bytes.
    pub trailing_zero_limit: u64,
    /// Skip the heuristic for files below this size.
    pub min_size: u64,
}

impl Default for ZeroScanConfig {
    fn default() -> Self {
        Self {
            sample_window: DEFAULT_SAMPLE_WINDOW,
            zero_fraction_threshold: DEFAULT_ZERO_FRACTION_THRESHOLD,
            trailing_zero_limit: DEFAULT_TRAILING_ZERO_LIMIT,
            min_size: DEFAULT_HEURISTIC_MIN_SIZE,
        }
    }
}

/// Zero-byte statistics gathered from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZeroProfile {
    /// Bytes read across all sample windows.
    pub sampled_bytes: u64,
    /// Zero bytes among the sampled bytes.
    pub zero_bytes: u64,
    /// Length of the zero run ending at EOF (may stop early past the limit).
    pub trailing_zeros: u64,
}

impl ZeroProfile {
    /// Build a profile from in-memory sample windows and the file tail.
    pub fn from_content(windows: &[&[u8]], tail: &[u8]) -> Self {
        Self {
            sampled_bytes: windows.iter().map(|w| w.len() as u64).sum(),
            zero_bytes: windows.iter().map(|w| count_zeros(w)).sum(),
            trailing_zeros: trailing_zero_run(tail),
        }
    }

    /// Share of zero bytes among sampled bytes (0.0 when nothing was sampled).
    pub fn zero_fraction(&self) -> f64 {
        if self.sampled_bytes == 0 {
            0.0
        } else {
            self.zero_bytes as f64 / self.sampled_bytes as f64
        }
    }
}

/// Bytes past the expected size, if any.
pub fn trailing_excess(bytes_on_disk: u64, expected_size: u64) -> Option<u64> {
    bytes_on_disk
        .checked_sub(expected_size)
        .filter(|&excess| excess > 0)
}

/// Start offsets of the sample windows: beginning, middle and end.
pub fn sample_offsets(file_size: u64, window: u64) -> Vec<u64> {
    if file_size == 0 {
        return Vec::new();
    }
    if file_size <= window {
        return vec![0];
    }
    let mut offsets = vec![0, file_size / 2, file_size - window];
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

/// Number of zero bytes in `buf`.
pub fn count_zeros(buf: &[u8]) -> u64 {
    buf.iter().filter(|&&b| b == 0).count() as u64
}

/// Number of consecutive zero bytes at the end of `buf`.
pub fn trailing_zero_run(buf: &[u8]) -> u64 {
    buf.iter().rev().take_while(|&&b| b == 0).count() as u64
}

/// Decide whether a file looks corrupt from its size and zero profile.
pub fn assess(
    bytes_on_disk: u64,
    expected_size: u64,
    profile: &ZeroProfile,
    config: &ZeroScanConfig,
) -> Option<VerificationDetail> {
    if let Some(excess) = trailing_excess(bytes_on_disk, expected_size) {
        return Some(VerificationDetail::TrailingData { excess });
    }
    if bytes_on_disk < config.min_size {
        return None;
    }

    let zero_fraction = profile.zero_fraction();
    if zero_fraction > config.zero_fraction_threshold
        || profile.trailing_zeros > config.trailing_zero_limit
    {
        return Some(VerificationDetail::ZeroFilled {
            zero_fraction,
            trailing_zeros: profile.trailing_zeros,
        });
    }
    None
}

/// Sample a file and measure its trailing zero run.
///
/// Holds a single `sample_window` buffer. The backward tail scan stops at the
/// first non-zero byte or as soon as the run exceeds `trailing_zero_limit`.
pub fn profile_file(
    path: &Path,
    config: &ZeroScanConfig,
    interrupt: &InterruptFlag,
) -> SyncResult<ZeroProfile> {
    let read_err = |e| SyncError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let file_size = file.metadata().map_err(read_err)?.len();
    let window = config.sample_window.max(1);
    let mut buffer = vec![0u8; window];
    let mut profile = ZeroProfile::default();

    for offset in sample_offsets(file_size, window as u64) {
        if interrupt.is_triggered() {
            return Err(SyncError::Interrupted);
        }
        let len = (file_size - offset).min(window as u64) as usize;
        file.seek(SeekFrom::Start(offset)).map_err(read_err)?;
        file.read_exact(&mut buffer[..len]).map_err(read_err)?;
        profile.sampled_bytes += len as u64;
        profile.zero_bytes += count_zeros(&buffer[..len]);
    }

    let mut pos = file_size;
    while pos > 0 && profile.trailing_zeros <= config.trailing_zero_limit {
        if interrupt.is_triggered() {
            return Err(SyncError::Interrupted);
        }
        let len = pos.min(window as u64) as usize;
        pos -= len as u64;
        file.seek(SeekFrom::Start(pos)).map_err(read_err)?;
        file.read_exact(&mut buffer[..len]).map_err(read_err)?;

        let run = trailing_zero_run(&buffer[..len]);
        profile.trailing_zeros += run;
        if run < len as u64 {
            break;
        }
    }

    Ok(profile)
}
