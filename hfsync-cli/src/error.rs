//! CLI error type.

use std::error::Error;
use std::fmt;

use hfsync::SyncError;

/// Errors that end a CLI run with a non-zero exit status.
#[derive(Debug)]
pub enum CliError {
    /// Invalid arguments or configuration.
    Config(String),
    /// Fatal error from the sync library.
    Sync(SyncError),
    /// The run finished but some files could not be brought up to date.
    Incomplete { failed: usize, total: usize },
    /// The user pressed Ctrl+C.
    Interrupted,
}

impl CliError {
    /// Print the error, with its source chain when `verbose`.
    pub fn report(&self, verbose: bool) {
        match self {
            CliError::Interrupted => eprintln!("\nDownload interrupted by user"),
            CliError::Incomplete { .. } => eprintln!("{}", self),
            _ => {
                eprintln!("Error: {}", self);
                if verbose {
                    let mut source = self.source();
                    while let Some(err) = source {
                        eprintln!("  caused by: {}", err);
                        source = err.source();
                    }
                }
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::Sync(err) => write!(f, "{}", err),
            CliError::Incomplete { failed, total } => {
                write!(f, "{} of {} files failed to download", failed, total)
            }
            CliError::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CliError::Sync(err) => err.source(),
            _ => None,
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Interrupted => CliError::Interrupted,
            other => CliError::Sync(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_sync_error_maps_to_interrupted() {
        assert!(matches!(
            CliError::from(SyncError::Interrupted),
            CliError::Interrupted
        ));
    }

    #[test]
    fn incomplete_message_counts_failures() {
        let err = CliError::Incomplete {
            failed: 2,
            total: 9,
        };
        assert_eq!(err.to_string(), "2 of 9 files failed to download");
    }

    #[test]
    fn sync_errors_keep_their_message() {
        let err = CliError::from(SyncError::InvalidRepoId("nope".to_string()));
        assert!(matches!(err, CliError::Sync(_)));
        assert!(err.to_string().contains("nope"));
    }
}
