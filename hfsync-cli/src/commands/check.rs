//! Check command: status and integrity report without transferring.

use hfsync::InterruptFlag;

use super::common::{RepoArgs, RepoKind, Session};
use crate::error::CliError;
use crate::ui::table::render_report;
use crate::ui::ConsoleObserver;

/// Print the status table for the local copy of the repository.
pub fn run(args: &RepoArgs, interrupt: InterruptFlag) -> Result<(), CliError> {
    let session = Session::open(args)?;
    let repo = session.repo();
    println!("Repository: {}", repo);
    println!("Organization: {}", repo.org());
    println!("Name: {}", repo.name());
    println!("Revision: {}", session.location.revision());
    println!("Download path: {}", session.root.display());
    if !session.root.exists() {
        println!("Download path does not exist yet");
    }

    let manifest = session.fetch_manifest()?;
    let engine = session.engine(interrupt)?;
    let observer = ConsoleObserver::new();
    let report = engine.check(&manifest, &observer)?;
    drop(observer);

    print!("{}", render_report(&report, &rerun_command(args)));
    Ok(())
}

/// The command line that repeats this run as a download.
fn rerun_command(args: &RepoArgs) -> String {
    let mut cmd = format!("hfsync {}", args.repo_id);
    if let Some(ref path) = args.local_path {
        cmd.push_str(&format!(" {}", path.display()));
    }
    if args.repo_type != RepoKind::Model {
        cmd.push_str(&format!(" --repo-type {}", args.repo_type.as_str()));
    }
    if let Some(ref revision) = args.revision {
        cmd.push_str(&format!(" --revision {}", revision));
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> RepoArgs {
        RepoArgs {
            repo_id: "org/name".to_string(),
            local_path: None,
            repo_type: RepoKind::Model,
            revision: None,
            token: Some("secret".to_string()),
            endpoint: None,
        }
    }

    #[test]
    fn rerun_command_for_model_is_minimal() {
        assert_eq!(rerun_command(&args()), "hfsync org/name");
    }

    #[test]
    fn rerun_command_keeps_location_flags_but_not_token() {
        let mut args = args();
        args.local_path = Some(PathBuf::from("/data"));
        args.repo_type = RepoKind::Dataset;
        args.revision = Some("v2".to_string());
        assert_eq!(
            rerun_command(&args),
            "hfsync org/name /data --repo-type dataset --revision v2"
        );
    }
}
