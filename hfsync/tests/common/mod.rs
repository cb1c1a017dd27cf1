//! Shared helpers for hfsync integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use hfsync::transfer::{BodyKind, RemoteBody, RemoteSource};
use hfsync::{FileEntry, SyncError, SyncResult};

/// Remote repository held in memory.
///
/// Honours range requests unless told otherwise and records every request.
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    honor_ranges: bool,
    offline: bool,
    requests: Mutex<Vec<(String, u64)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            honor_ranges: true,
            offline: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn ignoring_ranges(mut self) -> Self {
        self.honor_ranges = false;
        self
    }

    /// Record requests but fail all of them.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn requests(&self) -> Vec<(String, u64)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

impl RemoteSource for MemorySource {
    fn open(&self, entry: &FileEntry, offset: u64) -> SyncResult<RemoteBody> {
        let path = entry.relative_path().to_string();
        self.requests.lock().unwrap().push((path.clone(), offset));

        if self.offline {
            return Err(SyncError::RemoteUnavailable {
                path,
                reason: "network unreachable".to_string(),
            });
        }

        let content = self
            .files
            .get(&path)
            .cloned()
            .ok_or_else(|| SyncError::RemoteUnavailable {
                path: path.clone(),
                reason: "HTTP 404".to_string(),
            })?;

        let (kind, body) = if self.honor_ranges && offset > 0 {
            let start = (offset as usize).min(content.len());
            (BodyKind::Partial { start: offset }, content[start..].to_vec())
        } else {
            (BodyKind::Full, content)
        };

        Ok(RemoteBody {
            kind,
            content_length: Some(body.len() as u64),
            reader: Box::new(Cursor::new(body)),
        })
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Deterministic, non-zero-heavy test content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 253) as u8 + 1).collect()
}
