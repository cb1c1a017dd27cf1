//! Error types for repository synchronisation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while inspecting, verifying or transferring files.
///
/// Most variants describe a problem with a single file and are recorded in
/// the batch result. Variants for which [`SyncError::is_fatal`] returns true
/// abort the whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote refused or failed a byte fetch (DNS, connection, HTTP status).
    #[error("remote unavailable for {path}: {reason}")]
    RemoteUnavailable { path: String, reason: String },

    /// The server did not honour a range request.
    #[error("server did not honour range request for {path} at offset {offset}")]
    RangeUnsupported { path: String, offset: u64 },

    /// Final on-disk size differs from the manifest size.
    #[error("size mismatch for {path}: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Content digest differs from the manifest checksum.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Local file is larger than the manifest says it can be.
    #[error("local file {path} is {actual} bytes, larger than the expected {expected}")]
    LocalOverflow {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Network timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Failed to read a local file.
    #[error("failed to read {}: {}", .path.display(), .source)]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a local file or create its parent directory.
    #[error("failed to write {}: {}", .path.display(), .source)]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The destination root cannot be created or written.
    #[error("destination {} is not writable: {}", .path.display(), .source)]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The repository file listing could not be fetched or parsed.
    #[error("failed to list files of {repo}: {reason}")]
    MetadataFailed { repo: String, reason: String },

    /// Repository id is not of the form `organization/name`.
    #[error("invalid repository id '{0}': expected 'organization/name'")]
    InvalidRepoId(String),

    /// The file listing contains entries that cannot be used safely.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run was interrupted by the operator.
    #[error("interrupted")]
    Interrupted,
}

impl SyncError {
    /// Whether this error ends the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DestinationUnwritable { .. }
                | Self::MetadataFailed { .. }
                | Self::InvalidRepoId(_)
                | Self::InvalidManifest(_)
                | Self::InvalidConfig(_)
                | Self::Interrupted
        )
    }

    /// Whether a later run can pick up from the bytes already on disk.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. } | Self::Timeout { .. } | Self::Interrupted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = SyncError::ChecksumMismatch {
            path: "model.bin".to_string(),
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(err.to_string().contains("abc123"));
        assert!(err.to_string().contains("def456"));
    }

    #[test]
    fn test_read_failed_display_includes_path() {
        let err = SyncError::ReadFailed {
            path: PathBuf::from("/data/model.bin"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to read /data/model.bin: denied");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::Interrupted.is_fatal());
        assert!(SyncError::InvalidRepoId("x".into()).is_fatal());
        assert!(!SyncError::SizeMismatch {
            path: "a".into(),
            expected: 2,
            actual: 1
        }
        .is_fatal());
        assert!(!SyncError::RemoteUnavailable {
            path: "a".into(),
            reason: "HTTP 503".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_resumable_classification() {
        assert!(SyncError::Timeout {
            url: "http://x".into(),
            timeout_secs: 5
        }
        .is_resumable());
        assert!(!SyncError::LocalOverflow {
            path: "a".into(),
            expected: 1,
            actual: 2
        }
        .is_resumable());
    }
}
