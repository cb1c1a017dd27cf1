//! Remote byte sources.
//!
//! The [`RemoteSource`] trait is the seam between the transfer loop and the
//! network: production code uses [`super::HttpSource`], tests use the
//! in-memory `MockSource` from this module's test helpers.

use std::io::Read;

use crate::error::{SyncError, SyncResult};
use crate::hub::auth_hint;
use crate::manifest::FileEntry;

/// What the remote actually sent back for a request at some offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Bytes start at `start` (a honoured range request).
    Partial { start: u64 },
    /// Bytes start at 0 (the range was ignored, or none was requested).
    Full,
}

impl BodyKind {
    /// Offset of the first byte in the body.
    pub fn start(self) -> u64 {
        match self {
            Self::Partial { start } => start,
            Self::Full => 0,
        }
    }
}

/// An open response body.
pub struct RemoteBody {
    pub kind: BodyKind,
    /// Length of the body if the remote announced it.
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBody")
            .field("kind", &self.kind)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Supplies the bytes of a manifest entry from some offset.
///
/// Implementations must request `offset..` when `offset > 0` and report via
/// [`BodyKind`] where the returned bytes really start. A source that cannot
/// serve the offset at all returns [`SyncError::RangeUnsupported`].
pub trait RemoteSource: Send + Sync {
    fn open(&self, entry: &FileEntry, offset: u64) -> SyncResult<RemoteBody>;
}

impl<T: RemoteSource + ?Sized> RemoteSource for &T {
    fn open(&self, entry: &FileEntry, offset: u64) -> SyncResult<RemoteBody> {
        (**self).open(entry, offset)
    }
}

/// Parse the start offset out of `Content-Range: bytes START-END/TOTAL`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

/// Map a response status and headers onto a [`BodyKind`].
///
/// A 206 is only accepted when it starts at the requested offset. Without a
/// `Content-Range` header the announced length must equal the bytes still
/// missing. Any other 206 or a 416 means ranges cannot be trusted.
pub fn interpret_response(
    status: u16,
    offset: u64,
    content_range: Option<&str>,
    content_length: Option<u64>,
    expected_size: u64,
    path: &str,
) -> SyncResult<BodyKind> {
    match status {
        206 => {
            let start = match content_range {
                Some(value) => parse_content_range(value),
                None if content_length == Some(expected_size.saturating_sub(offset)) => {
                    Some(offset)
                }
                None => None,
            };
            match start {
                Some(start) if start == offset => Ok(BodyKind::Partial { start }),
                _ => Err(SyncError::RangeUnsupported {
                    path: path.to_string(),
                    offset,
                }),
            }
        }
        200..=299 => Ok(BodyKind::Full),
        416 => Err(SyncError::RangeUnsupported {
            path: path.to_string(),
            offset,
        }),
        other => Err(SyncError::RemoteUnavailable {
            path: path.to_string(),
            reason: format!("HTTP {}{}", other, auth_hint(other)),
        }),
    }
}
