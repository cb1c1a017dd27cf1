//! Status Report Aggregator.
//!
//! Turns per-file classifications and verdicts into the two things the
//! operator sees: a [`DownloadPlan`] before transferring, and a
//! [`StatusReport`] in check mode. Everything here is pure; the filesystem
//! and network work happens in [`crate::sync`].

use std::collections::BTreeSet;
use std::fmt;

use crate::inspect::{FileStatus, LocalFileState, VerificationDetail};
use crate::manifest::{FileEntry, Manifest};
use crate::verify::Verdict;

/// Format a byte count with 1024-based units and one decimal, e.g. `1.5 GB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

// =============================================================================
// Download plan
// =============================================================================

/// Which files must be refetched from offset 0 regardless of local state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForcePolicy {
    #[default]
    None,
    All,
    Files(BTreeSet<String>),
}

impl ForcePolicy {
    /// Force the named relative paths. An empty list forces nothing.
    pub fn files<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = paths.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Self::None
        } else {
            Self::Files(set)
        }
    }

    pub fn is_forced(&self, relative_path: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Files(set) => set.contains(relative_path),
        }
    }

    /// Forced names that match no manifest entry.
    pub fn unknown_paths(&self, manifest: &Manifest) -> Vec<String> {
        match self {
            Self::Files(set) => set
                .iter()
                .filter(|path| !manifest.contains(path))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Why a file is refetched from offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Requested by `--force` or `--force-files`.
    Forced,
    /// Local file is larger than the manifest size.
    Oversized { bytes_on_disk: u64 },
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "forced"),
            Self::Oversized { bytes_on_disk } => {
                write!(f, "corrupted: {} bytes on disk", bytes_on_disk)
            }
        }
    }
}

/// What the engine will do with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// Size already matches.
    Skip,
    /// Fetch from `from` (0 for a missing file).
    Fetch { from: u64 },
    /// Delete local bytes and fetch everything.
    Restart { reason: RestartReason },
}

/// One manifest entry together with its local state and planned action.
#[derive(Debug, Clone)]
pub struct PlannedTransfer {
    pub entry: FileEntry,
    pub state: LocalFileState,
    pub action: PlanAction,
}

impl PlannedTransfer {
    /// Bytes this action will pull from the remote.
    pub fn bytes_to_transfer(&self) -> u64 {
        let expected = self.entry.expected_size();
        match self.action {
            PlanAction::Skip => 0,
            PlanAction::Fetch { from } => expected.saturating_sub(from),
            PlanAction::Restart { .. } => expected,
        }
    }
}

/// Count and byte total of one plan bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket {
    pub files: usize,
    pub bytes: u64,
}

impl Bucket {
    fn add(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }
}

/// The per-file actions of a download run, in manifest order.
#[derive(Debug, Clone, Default)]
pub struct DownloadPlan {
    pub transfers: Vec<PlannedTransfer>,
    /// Forced names that matched nothing.
    pub unknown_forced: Vec<String>,
}

impl DownloadPlan {
    pub fn total_files(&self) -> usize {
        self.transfers.len()
    }

    pub fn total_size(&self) -> u64 {
        self.transfers.iter().map(|t| t.entry.expected_size()).sum()
    }

    /// Files that need any bytes.
    pub fn pending(&self) -> impl Iterator<Item = &PlannedTransfer> {
        self.transfers
            .iter()
            .filter(|t| t.action != PlanAction::Skip)
    }

    pub fn files_to_transfer(&self) -> usize {
        self.pending().count()
    }

    /// Bytes still to pull across all files.
    pub fn remaining_bytes(&self) -> u64 {
        self.transfers.iter().map(|t| t.bytes_to_transfer()).sum()
    }

    /// Nothing to transfer.
    pub fn is_noop(&self) -> bool {
        self.files_to_transfer() == 0
    }

    /// Missing files fetched from 0.
    pub fn new_files(&self) -> Bucket {
        self.bucket(|a| matches!(a, PlanAction::Fetch { from: 0 }))
    }

    /// Incomplete files resumed from their current size.
    pub fn resumed_files(&self) -> Bucket {
        self.bucket(|a| matches!(a, PlanAction::Fetch { from } if *from > 0))
    }

    /// Oversized files refetched from 0.
    pub fn oversized_files(&self) -> Bucket {
        self.bucket(|a| {
            matches!(
                a,
                PlanAction::Restart {
                    reason: RestartReason::Oversized { .. }
                }
            )
        })
    }

    /// Forced files refetched from 0.
    pub fn forced_files(&self) -> Bucket {
        self.bucket(|a| {
            matches!(
                a,
                PlanAction::Restart {
                    reason: RestartReason::Forced
                }
            )
        })
    }

    fn bucket(&self, pred: impl Fn(&PlanAction) -> bool) -> Bucket {
        let mut bucket = Bucket::default();
        for t in self.transfers.iter().filter(|t| pred(&t.action)) {
            bucket.add(t.bytes_to_transfer());
        }
        bucket
    }
}

/// Decide the action for every file.
///
/// `states` are the size-only classifications, in manifest order. Forced
/// files always restart; otherwise missing and incomplete files are fetched
/// from their current size and oversized files restart.
pub fn build_plan(
    manifest: &Manifest,
    states: Vec<LocalFileState>,
    force: &ForcePolicy,
) -> DownloadPlan {
    let transfers = manifest
        .iter()
        .zip(states)
        .map(|(entry, state)| {
            let action = if force.is_forced(entry.relative_path()) {
                PlanAction::Restart {
                    reason: RestartReason::Forced,
                }
            } else {
                match state.status() {
                    FileStatus::Missing => PlanAction::Fetch { from: 0 },
                    FileStatus::Incomplete => PlanAction::Fetch {
                        from: state.bytes_on_disk(),
                    },
                    FileStatus::Suspicious => PlanAction::Restart {
                        reason: RestartReason::Oversized {
                            bytes_on_disk: state.bytes_on_disk(),
                        },
                    },
                    FileStatus::CompleteUnverified | FileStatus::CompleteVerified => {
                        PlanAction::Skip
                    }
                }
            };
            PlannedTransfer {
                entry: entry.clone(),
                state,
                action,
            }
        })
        .collect();

    DownloadPlan {
        transfers,
        unknown_forced: force.unknown_paths(manifest),
    }
}

// =============================================================================
// Status report
// =============================================================================

/// Status column of the check-mode table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusLabel {
    Complete,
    Missing,
    Incomplete { percent: f64 },
    Suspicious,
    Unreadable,
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "Complete"),
            Self::Missing => write!(f, "Missing"),
            Self::Incomplete { percent } => write!(f, "Incomplete ({:.1}%)", percent),
            Self::Suspicious => write!(f, "Suspicious"),
            Self::Unreadable => write!(f, "Unreadable"),
        }
    }
}

/// Integrity column of the check-mode table.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityLabel {
    /// Nothing was checked (incomplete, small or missing file).
    NotChecked,
    /// SHA-256 matched.
    Verified,
    /// Heuristic ran and found nothing alarming.
    Plausible { zero_fraction: f64 },
    Suspicious(VerificationDetail),
    Unreadable(String),
}

impl fmt::Display for IntegrityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotChecked => Ok(()),
            Self::Verified => write!(f, "SHA256 verified"),
            Self::Plausible { zero_fraction } => {
                write!(f, "{:.1}% zeros", zero_fraction * 100.0)
            }
            Self::Suspicious(detail) => write!(f, "{}", detail),
            Self::Unreadable(reason) => write!(f, "check failed: {}", reason),
        }
    }
}

/// One line of the check-mode table.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    /// 1-based position in the path-sorted table.
    pub index: usize,
    pub label: StatusLabel,
    pub path: String,
    /// Expected size in bytes.
    pub size: u64,
    pub integrity: IntegrityLabel,
}

/// An incomplete file in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteFile {
    pub path: String,
    pub bytes_on_disk: u64,
    pub expected_size: u64,
}

impl IncompleteFile {
    pub fn remaining_bytes(&self) -> u64 {
        self.expected_size.saturating_sub(self.bytes_on_disk)
    }

    pub fn percent(&self) -> f64 {
        if self.expected_size == 0 {
            100.0
        } else {
            self.bytes_on_disk as f64 / self.expected_size as f64 * 100.0
        }
    }
}

/// Check-mode result for a whole repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub rows: Vec<StatusRow>,
    /// `(path, expected_size)`
    pub missing: Vec<(String, u64)>,
    pub incomplete: Vec<IncompleteFile>,
    /// `(path, detail)`
    pub suspicious: Vec<(String, VerificationDetail)>,
    /// `(path, reason)`
    pub unreadable: Vec<(String, String)>,
    pub verified_count: usize,
    pub total_size: u64,
}

impl StatusReport {
    pub fn missing_bytes(&self) -> u64 {
        self.missing.iter().map(|(_, size)| size).sum()
    }

    /// Bytes still to transfer over missing and incomplete files.
    ///
    /// This is not the repository size: complete bytes are not counted.
    pub fn remaining_bytes(&self) -> u64 {
        self.missing_bytes()
            + self
                .incomplete
                .iter()
                .map(IncompleteFile::remaining_bytes)
                .sum::<u64>()
    }

    /// Bytes a forced refetch of every suspicious file would pull.
    pub fn suspicious_bytes(&self) -> u64 {
        self.rows
            .iter()
            .filter(|row| row.label == StatusLabel::Suspicious)
            .map(|row| row.size)
            .sum()
    }

    /// Paths to pass to `--force-files`.
    pub fn suspicious_paths(&self) -> Vec<&str> {
        self.suspicious.iter().map(|(p, _)| p.as_str()).collect()
    }

    /// Every file is size-complete and none is suspicious or unreadable.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.incomplete.is_empty()
            && self.suspicious.is_empty()
            && self.unreadable.is_empty()
    }
}

/// Result of inspecting and possibly verifying one file.
#[derive(Debug, Clone)]
pub enum Assessment {
    Assessed {
        state: LocalFileState,
        verdict: Option<Verdict>,
    },
    /// The file could not be stat'ed or read.
    Unreadable(String),
}

/// Collects per-file assessments into a [`StatusReport`].
#[derive(Debug, Default)]
pub struct StatusAggregator {
    report: StatusReport,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file.
    pub fn record(&mut self, entry: &FileEntry, assessment: Assessment) {
        let path = entry.relative_path().to_string();
        let expected = entry.expected_size();
        self.report.total_size += expected;

        let (label, integrity) = match assessment {
            Assessment::Unreadable(reason) => {
                self.report.unreadable.push((path.clone(), reason.clone()));
                (StatusLabel::Unreadable, IntegrityLabel::Unreadable(reason))
            }
            Assessment::Assessed { state, verdict } => {
                let state = match verdict {
                    Some(ref v) => v.apply(state),
                    None => state,
                };
                self.classify(&path, expected, &state, verdict.as_ref())
            }
        };

        self.report.rows.push(StatusRow {
            index: 0,
            label,
            path,
            size: expected,
            integrity,
        });
    }

    fn classify(
        &mut self,
        path: &str,
        expected: u64,
        state: &LocalFileState,
        verdict: Option<&Verdict>,
    ) -> (StatusLabel, IntegrityLabel) {
        match state.status() {
            FileStatus::Missing => {
                self.report.missing.push((path.to_string(), expected));
                (StatusLabel::Missing, IntegrityLabel::NotChecked)
            }
            FileStatus::Incomplete => {
                self.report.incomplete.push(IncompleteFile {
                    path: path.to_string(),
                    bytes_on_disk: state.bytes_on_disk(),
                    expected_size: expected,
                });
                (
                    StatusLabel::Incomplete {
                        percent: state.percent_complete(expected),
                    },
                    IntegrityLabel::NotChecked,
                )
            }
            FileStatus::Suspicious => {
                let detail = state
                    .detail()
                    .cloned()
                    .unwrap_or(VerificationDetail::TrailingData {
                        excess: state.bytes_on_disk().saturating_sub(expected),
                    });
                self.report
                    .suspicious
                    .push((path.to_string(), detail.clone()));
                (StatusLabel::Suspicious, IntegrityLabel::Suspicious(detail))
            }
            FileStatus::CompleteVerified => {
                self.report.verified_count += 1;
                (StatusLabel::Complete, IntegrityLabel::Verified)
            }
            FileStatus::CompleteUnverified => {
                let integrity = match verdict {
                    Some(Verdict::Unverified {
                        profile: Some(profile),
                    }) => IntegrityLabel::Plausible {
                        zero_fraction: profile.zero_fraction(),
                    },
                    _ => IntegrityLabel::NotChecked,
                };
                (StatusLabel::Complete, integrity)
            }
        }
    }

    /// Sort rows by path, number them, and return the report.
    pub fn finish(mut self) -> StatusReport {
        self.report.rows.sort_by(|a, b| a.path.cmp(&b.path));
        for (i, row) in self.report.rows.iter_mut().enumerate() {
            row.index = i + 1;
        }
        self.report.missing.sort();
        self.report
            .incomplete
            .sort_by(|a, b| a.path.cmp(&b.path));
        self.report.suspicious.sort_by(|a, b| a.0.cmp(&b.0));
        self.report.unreadable.sort();
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::heuristics::ZeroProfile;

    const GB: u64 = 1_000_000_000;

    fn manifest() -> Manifest {
        Manifest::new(vec![
            FileEntry::new("config.json", 500),
            FileEntry::new("tokenizer.json", 2_000),
            FileEntry::new("model.bin", 5 * GB).with_checksum("abc"),
        ])
        .unwrap()
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0.0 B");
        assert_eq!(human_size(512), "512.0 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
        assert_eq!(human_size(2 * 1024u64.pow(4)), "2.0 TB");
    }

    #[test]
    fn test_force_policy() {
        assert!(!ForcePolicy::None.is_forced("a"));
        assert!(ForcePolicy::All.is_forced("a"));
        let policy = ForcePolicy::files(["model.bin"]);
        assert!(policy.is_forced("model.bin"));
        assert!(!policy.is_forced("config.json"));
        assert_eq!(ForcePolicy::files(Vec::<String>::new()), ForcePolicy::None);
    }

    #[test]
    fn test_unknown_forced_paths() {
        let policy = ForcePolicy::files(["model.bin", "nope.bin"]);
        assert_eq!(policy.unknown_paths(&manifest()), vec!["nope.bin"]);
    }

    #[test]
    fn test_plan_fresh_download() {
        let m = manifest();
        let states = m
            .iter()
            .map(|e| LocalFileState::classify(None, e.expected_size()))
            .collect();

        let plan = build_plan(&m, states, &ForcePolicy::None);

        assert_eq!(plan.files_to_transfer(), 3);
        assert_eq!(plan.remaining_bytes(), 5 * GB + 2_500);
        assert_eq!(plan.new_files().files, 3);
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_plan_partial_resume() {
        let m = manifest();
        let states = vec![
            LocalFileState::classify(Some(500), 500),
            LocalFileState::classify(Some(2_000), 2_000),
            LocalFileState::classify(Some(3 * GB), 5 * GB),
        ];

        let plan = build_plan(&m, states, &ForcePolicy::None);

        assert_eq!(plan.transfers[0].action, PlanAction::Skip);
        assert_eq!(plan.transfers[2].action, PlanAction::Fetch { from: 3 * GB });
        assert_eq!(plan.remaining_bytes(), 2 * GB);
        assert_eq!(
            plan.resumed_files(),
            Bucket {
                files: 1,
                bytes: 2 * GB
            }
        );
    }

    #[test]
    fn test_plan_oversized_restarts() {
        let m = manifest();
        let states = vec![
            LocalFileState::classify(Some(500), 500),
            LocalFileState::classify(Some(2_000), 2_000),
            LocalFileState::classify(Some(5 * GB + 100), 5 * GB),
        ];

        let plan = build_plan(&m, states, &ForcePolicy::None);

        assert_eq!(
            plan.transfers[2].action,
            PlanAction::Restart {
                reason: RestartReason::Oversized {
                    bytes_on_disk: 5 * GB + 100
                }
            }
        );
        assert_eq!(plan.oversized_files().bytes, 5 * GB);
    }

    #[test]
    fn test_plan_all_complete_is_noop() {
        let m = manifest();
        let states = m
            .iter()
            .map(|e| LocalFileState::classify(Some(e.expected_size()), e.expected_size()))
            .collect();

        let plan = build_plan(&m, states, &ForcePolicy::None);
        assert!(plan.is_noop());
        assert_eq!(plan.remaining_bytes(), 0);
    }

    #[test]
    fn test_plan_force_files_only_touches_named() {
        let m = manifest();
        let states = m
            .iter()
            .map(|e| LocalFileState::classify(Some(e.expected_size()), e.expected_size()))
            .collect();

        let plan = build_plan(&m, states, &ForcePolicy::files(["tokenizer.json"]));

        assert_eq!(plan.transfers[0].action, PlanAction::Skip);
        assert_eq!(
            plan.transfers[1].action,
            PlanAction::Restart {
                reason: RestartReason::Forced
            }
        );
        assert_eq!(plan.transfers[2].action, PlanAction::Skip);
        assert_eq!(plan.forced_files().bytes, 2_000);
    }

    #[test]
    fn test_status_report_buckets() {
        let m = manifest();
        let mut agg = StatusAggregator::new();
        let entries: Vec<&FileEntry> = m.iter().collect();

        agg.record(
            entries[0],
            Assessment::Assessed {
                state: LocalFileState::classify(Some(500), 500),
                verdict: None,
            },
        );
        agg.record(
            entries[1],
            Assessment::Assessed {
                state: LocalFileState::classify(None, 2_000),
                verdict: None,
            },
        );
        agg.record(
            entries[2],
            Assessment::Assessed {
                state: LocalFileState::classify(Some(3 * GB), 5 * GB),
                verdict: None,
            },
        );

        let report = agg.finish();

        assert_eq!(report.missing, vec![("tokenizer.json".to_string(), 2_000)]);
        assert_eq!(report.incomplete.len(), 1);
        assert_eq!(report.incomplete[0].percent(), 60.0);
        assert_eq!(report.remaining_bytes(), 2 * GB + 2_000);
        assert_eq!(report.total_size, 5 * GB + 2_500);
        assert!(!report.is_clean());

        // Sorted by path
        let paths: Vec<&str> = report.rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["config.json", "model.bin", "tokenizer.json"]);
        assert_eq!(report.rows[1].index, 2);
        assert_eq!(report.rows[1].label.to_string(), "Incomplete (60.0%)");
    }

    #[test]
    fn test_status_report_verdicts() {
        let m = manifest();
        let entries: Vec<&FileEntry> = m.iter().collect();
        let mut agg = StatusAggregator::new();

        agg.record(
            entries[0],
            Assessment::Assessed {
                state: LocalFileState::classify(Some(500), 500),
                verdict: Some(Verdict::Unverified {
                    profile: Some(ZeroProfile {
                        sampled_bytes: 100,
                        zero_bytes: 3,
                        trailing_zeros: 0,
                    }),
                }),
            },
        );
        agg.record(entries[1], Assessment::Unreadable("permission denied".into()));
        agg.record(
            entries[2],
            Assessment::Assessed {
                state: LocalFileState::classify(Some(5 * GB), 5 * GB),
                verdict: Some(Verdict::Suspicious(VerificationDetail::ChecksumMismatch {
                    expected: "abc".into(),
                    actual: "def".into(),
                })),
            },
        );

        let report = agg.finish();

        assert_eq!(report.rows[0].integrity.to_string(), "3.0% zeros");
        assert_eq!(report.rows[1].label, StatusLabel::Suspicious);
        assert_eq!(report.rows[1].integrity.to_string(), "checksum mismatch");
        assert_eq!(report.rows[2].label, StatusLabel::Unreadable);
        assert_eq!(report.suspicious_paths(), vec!["model.bin"]);
        assert_eq!(report.suspicious_bytes(), 5 * GB);
        assert_eq!(report.verified_count, 0);
        assert_eq!(report.remaining_bytes(), 0);
    }

    #[test]
    fn test_clean_report() {
        let m = manifest();
        let mut agg = StatusAggregator::new();
        for entry in &m {
            agg.record(
                entry,
                Assessment::Assessed {
                    state: LocalFileState::classify(
                        Some(entry.expected_size()),
                        entry.expected_size(),
                    ),
                    verdict: entry.expected_checksum().map(|_| Verdict::Verified),
                },
            );
        }

        let report = agg.finish();
        assert!(report.is_clean());
        assert_eq!(report.verified_count, 1);
    }
}
