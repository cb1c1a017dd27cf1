//! hfsync CLI - Command-line interface
//!
//! Downloads every file of a HuggingFace repository, resuming partial files
//! and verifying content, or reports local status with `--check`.

mod commands;
mod error;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hfsync::logging::{init_logging, LoggingConfig};
use hfsync::{ForcePolicy, InterruptFlag};
use tracing::debug;

use commands::common::RepoArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "hfsync")]
#[command(version, about = "Resumable, integrity-checked HuggingFace repository downloads")]
#[command(after_help = "Examples:\n  \
    hfsync openai/gpt-oss-120b\n  \
    hfsync openai/gpt-oss-120b /data/hf --check\n  \
    hfsync openai/gpt-oss-120b --force-files model-00001.safetensors model-00002.safetensors")]
struct Cli {
    #[command(flatten)]
    repo: RepoArgs,

    /// Re-download every file from the beginning
    #[arg(short, long)]
    force: bool,

    /// Re-download only these files (relative paths within the repository)
    #[arg(long, value_name = "PATH", num_args = 1..)]
    force_files: Vec<String>,

    /// Report status and integrity of local files without downloading
    #[arg(short, long)]
    check: bool,

    /// Deprecated alias of --check
    #[arg(short, long)]
    preview: bool,

    /// Debug logging and full error chains
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn force_policy(&self) -> ForcePolicy {
        if self.force {
            ForcePolicy::All
        } else {
            ForcePolicy::files(self.force_files.iter().cloned())
        }
    }
}

fn install_interrupt_handler() -> Result<InterruptFlag, CliError> {
    let interrupt = InterruptFlag::new();
    let flag = interrupt.clone();
    ctrlc::set_handler(move || {
        flag.trigger();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;
    Ok(interrupt)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let interrupt = install_interrupt_handler()?;

    if cli.preview {
        eprintln!("Note: --preview is deprecated, use --check instead");
    }

    if cli.check || cli.preview {
        debug!(repo = %cli.repo.repo_id, "Running check");
        commands::check::run(&cli.repo, interrupt)
    } else {
        debug!(repo = %cli.repo.repo_id, "Running download");
        commands::download::run(&cli.repo, cli.force_policy(), interrupt)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::new(cli.verbose);
    if let Some(ref path) = cli.log_file {
        logging = logging.with_log_file(path.clone());
    }
    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = match init_logging(&logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.report(cli.verbose);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_positionals_and_flags() {
        let cli = Cli::parse_from(["hfsync", "org/name", "/data", "-c", "-v"]);
        assert_eq!(cli.repo.repo_id, "org/name");
        assert_eq!(cli.repo.local_path, Some(PathBuf::from("/data")));
        assert!(cli.check);
        assert!(cli.verbose);
        assert!(matches!(cli.force_policy(), ForcePolicy::None));
    }

    #[test]
    fn force_files_take_multiple_paths() {
        let cli = Cli::parse_from(["hfsync", "org/name", "--force-files", "a.bin", "dir/b.bin"]);
        let policy = cli.force_policy();
        assert!(policy.is_forced("a.bin"));
        assert!(policy.is_forced("dir/b.bin"));
        assert!(!policy.is_forced("c.bin"));
    }

    #[test]
    fn force_flag_wins_over_force_files() {
        let cli = Cli::parse_from(["hfsync", "org/name", "-f", "--force-files", "a.bin"]);
        assert!(matches!(cli.force_policy(), ForcePolicy::All));
    }

    #[test]
    fn repo_type_and_revision() {
        let cli = Cli::parse_from([
            "hfsync",
            "org/data",
            "--repo-type",
            "dataset",
            "--revision",
            "refs/pr/1",
        ]);
        assert_eq!(cli.repo.repo_type, commands::common::RepoKind::Dataset);
        assert_eq!(cli.repo.revision.as_deref(), Some("refs/pr/1"));
    }

    #[test]
    fn unknown_repo_type_is_rejected() {
        assert!(Cli::try_parse_from(["hfsync", "org/name", "--repo-type", "bucket"]).is_err());
    }
}
