//! hfsync - resumable, integrity-checked HuggingFace repository downloads
//!
//! The library classifies every file of a repository snapshot against the
//! local copy, verifies size-complete files, and transfers missing bytes with
//! HTTP range requests so an interrupted run picks up where it stopped.
//!
//! # Example
//!
//! ```ignore
//! use hfsync::{ForcePolicy, HttpSource, HubClient, NoopObserver, RepoId, RepoLocation};
//! use hfsync::{InterruptFlag, RepoType, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::load()?;
//! let repo = RepoId::parse("openai/gpt-oss-120b")?;
//! let location = RepoLocation::new(&config.endpoint, repo.clone(), RepoType::Model, "main")?;
//! let manifest = HubClient::new(&config)?.list_files(&location)?;
//!
//! let root = hfsync::download_root(&config.base_dir, &repo, RepoType::Model);
//! let source = HttpSource::new(location, &config)?;
//! let engine = SyncEngine::new(source, root, &config, InterruptFlag::new());
//! let summary = engine.sync(&manifest, &ForcePolicy::None, &NoopObserver)?;
//! ```

pub mod config;
pub mod error;
pub mod hub;
pub mod inspect;
pub mod logging;
pub mod manifest;
pub mod progress;
pub mod report;
pub mod sync;
pub mod transfer;
pub mod verify;

pub use config::{ConfigFile, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use hub::{download_root, HubClient, RepoId, RepoLocation, RepoType};
pub use inspect::{inspect, FileStatus, LocalFileState, VerificationDetail};
pub use manifest::{FileEntry, Manifest};
pub use progress::{InterruptFlag, Progress};
pub use report::{human_size, DownloadPlan, ForcePolicy, PlanAction, StatusReport};
pub use sync::{FileOutcome, NoopObserver, SyncEngine, SyncObserver, SyncSummary};
pub use transfer::{HttpSource, RemoteSource, TransferExecutor};
pub use verify::{IntegrityVerifier, Verdict};
