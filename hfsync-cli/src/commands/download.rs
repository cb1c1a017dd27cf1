//! Download command: plan, transfer, summarise.

use hfsync::{ForcePolicy, InterruptFlag};
use tracing::info;

use super::common::{RepoArgs, Session};
use crate::error::CliError;
use crate::ui::{self, ConsoleObserver};

/// Bring the local copy of the repository up to date.
pub fn run(args: &RepoArgs, force: ForcePolicy, interrupt: InterruptFlag) -> Result<(), CliError> {
    let session = Session::open(args)?;
    println!("Downloading {} to {}", session.repo(), session.root.display());

    let manifest = session.fetch_manifest()?;
    let engine = session.engine(interrupt)?;
    let plan = engine.plan(&manifest, &force);

    print!("{}", ui::render_plan(&plan));
    if plan.is_noop() {
        info!(root = %session.root.display(), "Nothing to download");
        return Ok(());
    }
    println!();

    let observer = ConsoleObserver::new();
    let summary = engine.execute(&plan, &observer)?;
    drop(observer);

    print!("{}", ui::render_summary(&summary));
    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            failed: summary.total() - summary.successful(),
            total: summary.total(),
        })
    }
}
