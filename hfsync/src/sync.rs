//! Sync engine.
//!
//! Drives the inspector, verifier and transfer executor over a whole
//! manifest, one file at a time in manifest order. UI concerns stay behind
//! the [`SyncObserver`] trait.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::inspect::{inspect, FileStatus, LocalFileState};
use crate::manifest::{FileEntry, Manifest};
use crate::progress::InterruptFlag;
use crate::report::{
    build_plan, Assessment, DownloadPlan, ForcePolicy, PlanAction, PlannedTransfer,
    RestartReason, StatusAggregator, StatusReport,
};
use crate::transfer::{RemoteSource, TransferExecutor, TransferReport};
use crate::verify::checksum::verify_checksum;
use crate::verify::IntegrityVerifier;

/// Receives engine events. Every method defaults to doing nothing.
pub trait SyncObserver {
    /// A file is about to be processed (`index` is 1-based).
    fn file_started(&self, _index: usize, _total: usize, _transfer: &PlannedTransfer) {}

    /// Transfer progress: `done` includes the resume offset.
    fn transfer_progress(&self, _entry: &FileEntry, _done: u64, _total: u64) {}

    /// A checksum pass is starting.
    fn verify_started(&self, _entry: &FileEntry) {}

    fn verify_progress(&self, _entry: &FileEntry, _done: u64, _total: u64) {}

    fn verify_finished(&self, _entry: &FileEntry) {}

    fn file_finished(
        &self,
        _index: usize,
        _total: usize,
        _entry: &FileEntry,
        _outcome: &FileOutcome,
    ) {
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// Result of processing one file in download mode.
#[derive(Debug)]
pub enum FileOutcome {
    /// Bytes were transferred. `verified` is true when the checksum was checked.
    Downloaded {
        report: TransferReport,
        verified: bool,
    },
    /// Already complete.
    Skipped,
    /// The file could not be brought up to date; partial bytes stay on disk.
    Failed { error: SyncError },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Per-file outcomes of a download run.
#[derive(Debug)]
pub struct SyncSummary {
    pub root: PathBuf,
    pub outcomes: Vec<(String, FileOutcome)>,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Downloaded or skipped files.
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> Vec<(&str, &SyncError)> {
        self.outcomes
            .iter()
            .filter_map(|(path, outcome)| match outcome {
                FileOutcome::Failed { error } => Some((path.as_str(), error)),
                _ => None,
            })
            .collect()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                FileOutcome::Downloaded { report, .. } => report.bytes_written,
                _ => 0,
            })
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_success())
    }
}

/// Synchronises one repository snapshot into a local directory.
#[derive(Debug)]
pub struct SyncEngine<S> {
    root: PathBuf,
    executor: TransferExecutor<S>,
    verifier: IntegrityVerifier,
    verify_after_transfer: bool,
    interrupt: InterruptFlag,
}

impl<S: RemoteSource> SyncEngine<S> {
    /// Create an engine writing below `root`.
    pub fn new(source: S, root: PathBuf, config: &SyncConfig, interrupt: InterruptFlag) -> Self {
        Self {
            root,
            executor: TransferExecutor::new(source, interrupt.clone())
                .with_chunk_size(config.chunk_size),
            verifier: IntegrityVerifier::new(config.zero_scan.clone(), interrupt.clone())
                .with_chunk_size(config.chunk_size),
            verify_after_transfer: config.verify_after_transfer,
            interrupt,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify every file by size and decide what to transfer.
    ///
    /// No checksums are computed here. A path that cannot be stat'ed is
    /// planned as missing; the transfer will then report the real failure.
    pub fn plan(&self, manifest: &Manifest, force: &ForcePolicy) -> DownloadPlan {
        let states = manifest
            .iter()
            .map(|entry| {
                inspect(entry, &self.root).unwrap_or_else(|e| {
                    warn!(path = entry.relative_path(), error = %e, "Cannot inspect local file");
                    LocalFileState::classify(None, entry.expected_size())
                })
            })
            .collect();

        let plan = build_plan(manifest, states, force);
        for path in &plan.unknown_forced {
            warn!(path = %path, "Forced file is not part of the repository");
        }
        plan
    }

    /// Plan and execute in one call.
    pub fn sync(
        &self,
        manifest: &Manifest,
        force: &ForcePolicy,
        observer: &dyn SyncObserver,
    ) -> SyncResult<SyncSummary> {
        let plan = self.plan(manifest, force);
        self.execute(&plan, observer)
    }

    /// Transfer every file of `plan` that needs bytes.
    ///
    /// A failing file is recorded and the run moves on. Returns an error only
    /// when the destination root cannot be created or the run is interrupted.
    pub fn execute(
        &self,
        plan: &DownloadPlan,
        observer: &dyn SyncObserver,
    ) -> SyncResult<SyncSummary> {
        fs::create_dir_all(&self.root).map_err(|e| SyncError::DestinationUnwritable {
            path: self.root.clone(),
            source: e,
        })?;

        let total = plan.total_files();
        let mut outcomes = Vec::with_capacity(total);

        for (i, transfer) in plan.transfers.iter().enumerate() {
            let index = i + 1;
            if self.interrupt.is_triggered() {
                return Err(SyncError::Interrupted);
            }

            observer.file_started(index, total, transfer);
            let outcome = match self.process(transfer, observer) {
                Ok(outcome) => outcome,
                Err(SyncError::Interrupted) => {
                    info!(path = transfer.entry.relative_path(), "Interrupted");
                    return Err(SyncError::Interrupted);
                }
                Err(error) => {
                    warn!(path = transfer.entry.relative_path(), error = %error, "Transfer failed");
                    FileOutcome::Failed { error }
                }
            };
            observer.file_finished(index, total, &transfer.entry, &outcome);
            outcomes.push((transfer.entry.relative_path().to_string(), outcome));
        }

        let summary = SyncSummary {
            root: self.root.clone(),
            outcomes,
        };
        info!(
            successful = summary.successful(),
            total = summary.total(),
            bytes = summary.bytes_transferred(),
            "Sync finished"
        );
        Ok(summary)
    }

    fn process(
        &self,
        transfer: &PlannedTransfer,
        observer: &dyn SyncObserver,
    ) -> SyncResult<FileOutcome> {
        let entry = &transfer.entry;
        let dest = entry.local_path(&self.root);

        let bytes_on_disk = match transfer.action {
            PlanAction::Skip => return Ok(FileOutcome::Skipped),
            PlanAction::Fetch { from } => from,
            PlanAction::Restart {
                reason: RestartReason::Forced,
            } => {
                remove_local(&dest)?;
                0
            }
            PlanAction::Restart {
                reason: RestartReason::Oversized { bytes_on_disk },
            } => bytes_on_disk,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let on_progress = |done: u64, total: u64| observer.transfer_progress(entry, done, total);
        let report = self
            .executor
            .transfer(entry, &dest, bytes_on_disk, Some(&on_progress))?;

        let verified = match entry.expected_checksum() {
            Some(expected) if self.verify_after_transfer => {
                observer.verify_started(entry);
                let on_verify =
                    |done: u64, total: u64| observer.verify_progress(entry, done, total);
                let result = verify_checksum(
                    &dest,
                    entry.relative_path(),
                    expected,
                    Some(&on_verify),
                    &self.interrupt,
                );
                observer.verify_finished(entry);
                result?;
                debug!(path = entry.relative_path(), "Checksum verified");
                true
            }
            _ => false,
        };

        Ok(FileOutcome::Downloaded { report, verified })
    }

    /// Inspect and verify every file without transferring anything.
    ///
    /// Size-complete files are checksummed when the manifest has a digest and
    /// otherwise run through the zero-byte heuristic. Files that cannot be
    /// read are reported as unreadable instead of aborting the report.
    pub fn check(
        &self,
        manifest: &Manifest,
        observer: &dyn SyncObserver,
    ) -> SyncResult<StatusReport> {
        let mut entries: Vec<&FileEntry> = manifest.iter().collect();
        entries.sort_by(|a, b| a.relative_path().cmp(b.relative_path()));

        let mut aggregator = StatusAggregator::new();
        for entry in entries {
            if self.interrupt.is_triggered() {
                return Err(SyncError::Interrupted);
            }
            let assessment = match self.assess(entry, observer) {
                Ok(assessment) => assessment,
                Err(SyncError::Interrupted) => return Err(SyncError::Interrupted),
                Err(e) => {
                    warn!(path = entry.relative_path(), error = %e, "Cannot check file");
                    Assessment::Unreadable(io_reason(&e))
                }
            };
            aggregator.record(entry, assessment);
        }

        Ok(aggregator.finish())
    }

    fn assess(&self, entry: &FileEntry, observer: &dyn SyncObserver) -> SyncResult<Assessment> {
        let state = inspect(entry, &self.root)?;
        if matches!(state.status(), FileStatus::Missing | FileStatus::Incomplete) {
            return Ok(Assessment::Assessed {
                state,
                verdict: None,
            });
        }

        let hashing = entry.expected_checksum().is_some() && state.status().is_complete();
        if hashing {
            observer.verify_started(entry);
        }
        let on_verify = |done: u64, total: u64| observer.verify_progress(entry, done, total);
        let verdict = self
            .verifier
            .verify(entry, &self.root, &state, Some(&on_verify));
        if hashing {
            observer.verify_finished(entry);
        }

        Ok(Assessment::Assessed {
            state,
            verdict: Some(verdict?),
        })
    }
}

fn remove_local(path: &Path) -> SyncResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed local copy");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Short reason for an unreadable file: the I/O cause when there is one.
fn io_reason(error: &SyncError) -> String {
    match error {
        SyncError::ReadFailed { source, .. } | SyncError::WriteFailed { source, .. } => {
            source.to_string()
        }
        other => other.to_string(),
    }
}
