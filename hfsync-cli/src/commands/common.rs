//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use hfsync::{
    download_root, HttpSource, HubClient, InterruptFlag, Manifest, RepoId, RepoLocation,
    RepoType, SyncConfig, SyncEngine,
};

use crate::error::CliError;

/// Repository kind selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum RepoKind {
    /// Model repository
    #[default]
    Model,
    /// Dataset repository
    Dataset,
    /// Space repository
    Space,
}

impl RepoKind {
    /// Value as written on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            RepoKind::Model => "model",
            RepoKind::Dataset => "dataset",
            RepoKind::Space => "space",
        }
    }
}

impl From<RepoKind> for RepoType {
    fn from(kind: RepoKind) -> Self {
        match kind {
            RepoKind::Model => RepoType::Model,
            RepoKind::Dataset => RepoType::Dataset,
            RepoKind::Space => RepoType::Space,
        }
    }
}

/// Arguments that identify the repository and where it goes.
#[derive(Debug, Clone, Args)]
pub struct RepoArgs {
    /// Repository id (e.g. openai/gpt-oss-120b)
    #[arg(value_name = "REPO_ID")]
    pub repo_id: String,

    /// Base directory for downloads [default: $HF_HOME, config base_dir, or .]
    #[arg(value_name = "LOCAL_PATH")]
    pub local_path: Option<PathBuf>,

    /// Repository kind
    #[arg(long, value_enum, default_value_t = RepoKind::Model)]
    pub repo_type: RepoKind,

    /// Branch, tag or commit [default: main]
    #[arg(long)]
    pub revision: Option<String>,

    /// Bearer token for gated or private repositories [env: HF_TOKEN]
    #[arg(long)]
    pub token: Option<String>,

    /// Hub endpoint [default: https://huggingface.co, env: HF_ENDPOINT]
    #[arg(long)]
    pub endpoint: Option<String>,
}

/// Apply command-line overrides on top of the file and environment layers.
pub fn resolve_config(args: &RepoArgs, mut config: SyncConfig) -> SyncConfig {
    if let Some(ref path) = args.local_path {
        config.base_dir = path.clone();
    }
    if let Some(ref token) = args.token {
        config.token = Some(token.clone());
    }
    if let Some(ref endpoint) = args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(ref revision) = args.revision {
        config.revision = revision.clone();
    }
    config
}

/// Everything a command needs to talk to one repository.
pub struct Session {
    pub config: SyncConfig,
    pub location: RepoLocation,
    pub root: PathBuf,
}

impl Session {
    /// Resolve configuration and the repository location from the arguments.
    pub fn open(args: &RepoArgs) -> Result<Self, CliError> {
        let config = resolve_config(args, SyncConfig::load()?);
        let repo = RepoId::parse(&args.repo_id)?;
        let repo_type = RepoType::from(args.repo_type);
        let root = download_root(&config.base_dir, &repo, repo_type);
        let location = RepoLocation::new(&config.endpoint, repo, repo_type, &config.revision)?;

        Ok(Self {
            config,
            location,
            root,
        })
    }

    pub fn repo(&self) -> &RepoId {
        self.location.repo()
    }

    /// List the files of the repository.
    pub fn fetch_manifest(&self) -> Result<Manifest, CliError> {
        println!("Fetching file list for {}...", self.repo());
        let manifest = HubClient::new(&self.config)?.list_files(&self.location)?;
        Ok(manifest)
    }

    /// Build an engine writing into this session's download root.
    pub fn engine(&self, interrupt: InterruptFlag) -> Result<SyncEngine<HttpSource>, CliError> {
        let source = HttpSource::new(self.location.clone(), &self.config)?;
        Ok(SyncEngine::new(
            source,
            self.root.clone(),
            &self.config,
            interrupt,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RepoArgs {
        RepoArgs {
            repo_id: "org/name".to_string(),
            local_path: None,
            repo_type: RepoKind::Model,
            revision: None,
            token: None,
            endpoint: None,
        }
    }

    #[test]
    fn flags_override_loaded_config() {
        let loaded = SyncConfig::new(PathBuf::from("/from/env"))
            .with_token("env-token")
            .with_endpoint("https://mirror.example");

        let mut args = args();
        args.local_path = Some(PathBuf::from("/from/flag"));
        args.token = Some("flag-token".to_string());
        args.revision = Some("v1.0".to_string());

        let config = resolve_config(&args, loaded);
        assert_eq!(config.base_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.token.as_deref(), Some("flag-token"));
        assert_eq!(config.endpoint, "https://mirror.example");
        assert_eq!(config.revision, "v1.0");
    }

    #[test]
    fn absent_flags_keep_loaded_values() {
        let loaded = SyncConfig::new(PathBuf::from("/from/env")).with_token("env-token");
        let config = resolve_config(&args(), loaded);
        assert_eq!(config.base_dir, PathBuf::from("/from/env"));
        assert_eq!(config.token.as_deref(), Some("env-token"));
        assert_eq!(config.revision, "main");
    }

    #[test]
    fn repo_kind_maps_to_repo_type() {
        assert_eq!(RepoType::from(RepoKind::Dataset), RepoType::Dataset);
        assert_eq!(RepoType::from(RepoKind::Space), RepoType::Space);
        assert_eq!(RepoType::from(RepoKind::default()), RepoType::Model);
    }
}
