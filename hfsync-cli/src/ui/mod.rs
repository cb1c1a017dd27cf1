//! Console output for the download and check commands.

pub mod table;

use std::cell::RefCell;
use std::fmt::Write as _;

use console::style;
use hfsync::report::{PlannedTransfer, RestartReason};
use hfsync::{
    human_size, DownloadPlan, FileEntry, FileOutcome, PlanAction, SyncObserver, SyncSummary,
};
use indicatif::{ProgressBar, ProgressStyle};

/// Files at least this large get a byte progress bar.
pub const PROGRESS_BAR_MIN_SIZE: u64 = 10 * 1024 * 1024;

const TRANSFER_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const VERIFY_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec})";

fn bar(len: u64, position: u64, template: &str, message: String) -> ProgressBar {
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    let pb = ProgressBar::new(len);
    pb.set_style(style);
    pb.set_position(position);
    pb.set_message(message);
    pb
}

/// Observer printing per-file lines and byte progress bars.
#[derive(Default)]
pub struct ConsoleObserver {
    bar: RefCell<Option<ProgressBar>>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn replace_bar(&self, new: Option<ProgressBar>) {
        if let Some(old) = self.bar.replace(new) {
            old.finish_and_clear();
        }
    }

    fn set_position(&self, done: u64) {
        if let Some(ref pb) = *self.bar.borrow() {
            pb.set_position(done);
        }
    }
}

impl Drop for ConsoleObserver {
    fn drop(&mut self) {
        if let Some(pb) = self.bar.get_mut().take() {
            pb.abandon();
        }
    }
}

impl SyncObserver for ConsoleObserver {
    fn file_started(&self, index: usize, total: usize, transfer: &PlannedTransfer) {
        println!(
            "Downloading files {}/{}: {}",
            index,
            total,
            describe_action(transfer)
        );

        let size = transfer.entry.expected_size();
        let start = match transfer.action {
            PlanAction::Skip => return,
            PlanAction::Fetch { from } => from,
            PlanAction::Restart { .. } => 0,
        };
        if size >= PROGRESS_BAR_MIN_SIZE {
            let name = transfer.entry.relative_path().to_string();
            self.replace_bar(Some(bar(size, start, TRANSFER_TEMPLATE, name)));
        }
    }

    fn transfer_progress(&self, _entry: &FileEntry, done: u64, _total: u64) {
        self.set_position(done);
    }

    fn verify_started(&self, entry: &FileEntry) {
        let size = entry.expected_size();
        let pb = (size >= PROGRESS_BAR_MIN_SIZE).then(|| {
            let message = format!("Computing SHA256 {}", entry.relative_path());
            bar(size, 0, VERIFY_TEMPLATE, message)
        });
        self.replace_bar(pb);
    }

    fn verify_progress(&self, _entry: &FileEntry, done: u64, _total: u64) {
        self.set_position(done);
    }

    fn verify_finished(&self, _entry: &FileEntry) {
        self.replace_bar(None);
    }

    fn file_finished(&self, index: usize, total: usize, entry: &FileEntry, outcome: &FileOutcome) {
        self.replace_bar(None);
        if let FileOutcome::Failed { error } = outcome {
            println!(
                "Downloading files {}/{}: {} {} - {}",
                index,
                total,
                style("Failed:").red().bold(),
                entry.relative_path(),
                error
            );
        }
    }
}

/// One-line description of what happens to a file.
pub fn describe_action(transfer: &PlannedTransfer) -> String {
    let path = transfer.entry.relative_path();
    let size = transfer.entry.expected_size();
    match transfer.action {
        PlanAction::Skip => format!("Skipping {} (already complete)", path),
        PlanAction::Fetch { from: 0 } => format!("Downloading {} ({})", path, human_size(size)),
        PlanAction::Fetch { from } => format!(
            "Resuming {} from {} ({} remaining)",
            path,
            human_size(from),
            human_size(size.saturating_sub(from))
        ),
        PlanAction::Restart {
            reason: RestartReason::Forced,
        } => format!("Re-downloading {} (forced, {})", path, human_size(size)),
        PlanAction::Restart {
            reason: RestartReason::Oversized { bytes_on_disk },
        } => format!(
            "Re-downloading {} (corrupted: {} on disk, expected {})",
            path,
            human_size(bytes_on_disk),
            human_size(size)
        ),
    }
}

/// Preview printed before any transfer.
pub fn render_plan(plan: &DownloadPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Found {} files ({} total)",
        plan.total_files(),
        human_size(plan.total_size())
    );

    for path in &plan.unknown_forced {
        let _ = writeln!(
            out,
            "{} {} is not part of the repository",
            style("Warning:").yellow(),
            path
        );
    }

    if plan.is_noop() {
        let _ = writeln!(out, "{}", style("All files already exist with correct sizes!").green());
        return out;
    }

    let _ = writeln!(
        out,
        "Need to download {} files ({} remaining)",
        plan.files_to_transfer(),
        human_size(plan.remaining_bytes())
    );
    let buckets = [
        ("New/missing", plan.new_files()),
        ("Resume/incomplete", plan.resumed_files()),
        ("Oversized, restarting", plan.oversized_files()),
        ("Forced", plan.forced_files()),
    ];
    for (label, bucket) in buckets {
        if bucket.files > 0 {
            let _ = writeln!(
                out,
                "  - {}: {} files ({})",
                label,
                bucket.files,
                human_size(bucket.bytes)
            );
        }
    }
    out
}

/// Final summary of a download run.
pub fn render_summary(summary: &SyncSummary) -> String {
    let mut out = String::new();
    let failed = summary.failed();

    if failed.is_empty() {
        let _ = writeln!(out, "\n{}", style("Download completed!").green().bold());
    } else {
        let _ = writeln!(out, "\n{}", style("Download finished with errors").red().bold());
    }
    let _ = writeln!(
        out,
        "Successfully downloaded: {}/{} files ({} transferred)",
        summary.successful(),
        summary.total(),
        human_size(summary.bytes_transferred())
    );
    if !failed.is_empty() {
        let _ = writeln!(out, "Failed files:");
        for (path, error) in &failed {
            let _ = writeln!(out, "  - {}: {}", path, error);
        }
        if failed.iter().any(|(_, error)| error.is_resumable()) {
            let _ = writeln!(out, "Partial files were kept; run the same command again to resume.");
        }
    }
    let _ = writeln!(out, "Files saved to: {}", summary.root.display());
    out
}
