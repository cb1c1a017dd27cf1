//! Resumable Transfer Executor.
//!
//! Brings one local file to exactly `expected_size` bytes of remote content,
//! appending from the bytes already on disk whenever the remote honours a
//! range request and restarting from 0 when it does not.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use super::source::{BodyKind, RemoteBody, RemoteSource};
use crate::error::{SyncError, SyncResult};
use crate::manifest::FileEntry;
use crate::progress::{self, InterruptFlag, Progress};

/// Buffer size for reading/writing during transfers (64KB).
pub const TRANSFER_CHUNK_SIZE: usize = 64 * 1024;

/// What a single transfer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Offset the bytes were written from.
    pub start_offset: u64,
    /// Bytes written in this call.
    pub bytes_written: u64,
    /// Size of the file after the transfer.
    pub final_size: u64,
    /// Local bytes were discarded and the file was fetched from 0.
    pub restarted: bool,
}

/// Streams remote bytes into local files.
#[derive(Debug)]
pub struct TransferExecutor<S> {
    source: S,
    chunk_size: usize,
    interrupt: InterruptFlag,
}

impl<S: RemoteSource> TransferExecutor<S> {
    pub fn new(source: S, interrupt: InterruptFlag) -> Self {
        Self {
            source,
            chunk_size: TRANSFER_CHUNK_SIZE,
            interrupt,
        }
    }

    /// Set the chunk size for streaming.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Transfer `entry` into `dest`, which currently holds `bytes_on_disk` bytes.
    ///
    /// The parent directory of `dest` must exist. On any failure after the
    /// stream started, the bytes already written stay on disk as the next
    /// resume point. `progress` receives `(bytes_on_disk_now, expected_size)`.
    pub fn transfer(
        &self,
        entry: &FileEntry,
        dest: &Path,
        bytes_on_disk: u64,
        progress: Option<Progress<'_>>,
    ) -> SyncResult<TransferReport> {
        let expected = entry.expected_size();
        let mut offset = bytes_on_disk;
        let mut restarted = false;

        if offset > expected {
            let overflow = SyncError::LocalOverflow {
                path: entry.relative_path().to_string(),
                expected,
                actual: bytes_on_disk,
            };
            warn!(error = %overflow, "Discarding local file and restarting");
            offset = 0;
            restarted = true;
        }

        // A discarded oversize file is never complete, even for a zero-size entry
        if !restarted && offset == expected && (expected > 0 || dest.is_file()) {
            debug!(path = entry.relative_path(), "Already complete");
            return Ok(TransferReport {
                start_offset: offset,
                bytes_written: 0,
                final_size: expected,
                restarted: false,
            });
        }

        let body = self.open_body(entry, &mut offset, &mut restarted)?;
        let file = open_destination(dest, offset)?;

        if offset > 0 {
            info!(path = entry.relative_path(), offset, "Resuming transfer");
        } else {
            info!(path = entry.relative_path(), bytes = expected, "Starting transfer");
        }

        let written = self.stream_body(entry, body, file, dest, offset, progress)?;
        let final_size = offset + written;

        let on_disk = dest
            .metadata()
            .map_err(|e| SyncError::ReadFailed {
                path: dest.to_path_buf(),
                source: e,
            })?
            .len();
        if on_disk != expected {
            return Err(SyncError::SizeMismatch {
                path: entry.relative_path().to_string(),
                expected,
                actual: on_disk,
            });
        }

        Ok(TransferReport {
            start_offset: offset,
            bytes_written: written,
            final_size,
            restarted,
        })
    }

    /// Open the remote body, falling back to a full fetch once when the
    /// range is refused or ignored.
    fn open_body(
        &self,
        entry: &FileEntry,
        offset: &mut u64,
        restarted: &mut bool,
    ) -> SyncResult<RemoteBody> {
        let body = match self.source.open(entry, *offset) {
            Ok(body) => body,
            Err(SyncError::RangeUnsupported { .. }) if *offset > 0 => {
                warn!(
                    path = entry.relative_path(),
                    offset = *offset,
                    "Range request refused, restarting from the beginning"
                );
                *offset = 0;
                *restarted = true;
                self.source.open(entry, 0)?
            }
            Err(e) => return Err(e),
        };

        match body.kind {
            BodyKind::Full if *offset > 0 => {
                warn!(
                    path = entry.relative_path(),
                    offset = *offset,
                    "Server ignored range request, restarting from the beginning"
                );
                *offset = 0;
                *restarted = true;
                Ok(body)
            }
            BodyKind::Partial { start } if start != *offset => {
                Err(SyncError::RangeUnsupported {
                    path: entry.relative_path().to_string(),
                    offset: *offset,
                })
            }
            _ => Ok(body),
        }
    }

    /// Stream the body into the file, never writing past `expected_size`.
    fn stream_body(
        &self,
        entry: &FileEntry,
        mut body: RemoteBody,
        file: File,
        dest: &Path,
        offset: u64,
        progress: Option<Progress<'_>>,
    ) -> SyncResult<u64> {
        let expected = entry.expected_size();
        let write_err = |e| SyncError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        };

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut position = offset;

        let outcome = loop {
            if self.interrupt.is_triggered() {
                break Err(SyncError::Interrupted);
            }

            let bytes_read = match body.reader.read(&mut buffer) {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    break Err(SyncError::RemoteUnavailable {
                        path: entry.relative_path().to_string(),
                        reason: format!("read error: {}", e),
                    })
                }
            };

            let room = expected - position;
            let take = (bytes_read as u64).min(room) as usize;
            if let Err(e) = writer.write_all(&buffer[..take]) {
                break Err(write_err(e));
            }
            position += take as u64;
            progress::report(progress, position, expected);

            if take < bytes_read {
                warn!(
                    path = entry.relative_path(),
                    expected, "Remote sent more bytes than expected, stopping at the boundary"
                );
                break Ok(());
            }
        };

        // Whatever reached the buffer is a valid resume point
        writer.flush().map_err(write_err)?;
        outcome?;

        Ok(position - offset)
    }
}

/// Open `dest` for writing at `offset`, discarding anything past it.
fn open_destination(dest: &Path, offset: u64) -> SyncResult<File> {
    let write_err = |e| SyncError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(dest)
        .map_err(write_err)?;
    file.set_len(offset).map_err(write_err)?;
    file.seek(SeekFrom::Start(offset)).map_err(write_err)?;
    Ok(file)
}
