//! Configuration for repository synchronisation.
//!
//! [`SyncConfig`] holds everything the engine and HTTP clients need.
//! [`ConfigFile`] is the optional on-disk layer at
//! `<config_dir>/hfsync/config.ini`. Values are layered as
//! flag > environment > file > default; the CLI applies flags last.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use crate::error::{SyncError, SyncResult};
use crate::hub::{DEFAULT_ENDPOINT, DEFAULT_REVISION};
use crate::transfer::TRANSFER_CHUNK_SIZE;
use crate::verify::heuristics::ZeroScanConfig;

/// Default HTTP request timeout (1 hour; single files can be tens of GB).
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Environment variable for the download base directory.
pub const ENV_HOME: &str = "HF_HOME";

/// Environment variables for the bearer token, in lookup order.
pub const ENV_TOKENS: [&str; 2] = ["HF_TOKEN", "HUGGING_FACE_HUB_TOKEN"];

/// Environment variable for the hub endpoint.
pub const ENV_ENDPOINT: &str = "HF_ENDPOINT";

/// Configuration for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base directory; repositories land in `<base>/<type>s/<org>/<name>`.
    pub base_dir: PathBuf,

    /// Hub endpoint URL.
    pub endpoint: String,

    /// Bearer token for gated or private repositories.
    pub token: Option<String>,

    /// Branch, tag or commit.
    pub revision: String,

    /// Whole-request timeout.
    pub timeout: Duration,

    /// Connect timeout.
    pub connect_timeout: Duration,

    /// Read/write chunk size for transfers and checksum passes.
    pub chunk_size: usize,

    /// Hash files with a manifest checksum right after transferring them.
    pub verify_after_transfer: bool,

    /// Zero-byte heuristic settings.
    pub zero_scan: ZeroScanConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            revision: DEFAULT_REVISION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            chunk_size: TRANSFER_CHUNK_SIZE,
            verify_after_transfer: true,
            zero_scan: ZeroScanConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Create a configuration with the given base directory.
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            ..Default::default()
        }
    }

    /// Build a configuration from the file layer and the environment.
    ///
    /// `env` looks up a variable by name; empty values count as unset.
    pub fn from_sources(file: &ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        file.apply(&mut config);

        if let Some(home) = env(ENV_HOME) {
            config.base_dir = PathBuf::from(home);
        }
        if let Some(token) = ENV_TOKENS.iter().find_map(|name| env(*name)) {
            config.token = Some(token);
        }
        if let Some(endpoint) = env(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        config
    }

    /// Build a configuration from the default config file and the process environment.
    pub fn load() -> SyncResult<Self> {
        let file = ConfigFile::load_default()?;
        Ok(Self::from_sources(&file, |name| std::env::var(name).ok()))
    }

    /// Set the base directory.
    pub fn with_base_dir(mut self, path: PathBuf) -> Self {
        self.base_dir = path;
        self
    }

    /// Set the hub endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the revision.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Enable or disable post-transfer verification.
    pub fn with_verify_after_transfer(mut self, verify: bool) -> Self {
        self.verify_after_transfer = verify;
        self
    }

    /// Set the zero-byte heuristic settings.
    pub fn with_zero_scan(mut self, zero_scan: ZeroScanConfig) -> Self {
        self.zero_scan = zero_scan;
        self
    }

    /// User-Agent sent with every request.
    pub fn user_agent(&self) -> String {
        format!("hfsync/{}", env!("CARGO_PKG_VERSION"))
    }
}

/// Values read from the INI config file. Unset keys are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub base_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub chunk_size: Option<usize>,
    pub verify_after_transfer: Option<bool>,
    pub zero_fraction_threshold: Option<f64>,
    pub trailing_zero_limit: Option<u64>,
    pub heuristic_min_size: Option<u64>,
}

impl ConfigFile {
    /// `<config_dir>/hfsync/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hfsync").join("config.ini"))
    }

    /// Load the default config file; a missing file yields defaults.
    pub fn load_default() -> SyncResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load a config file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| {
            SyncError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_ini(&ini)
    }

    /// Parse config file contents.
    pub fn parse(contents: &str) -> SyncResult<Self> {
        let ini = Ini::load_from_str(contents)
            .map_err(|e| SyncError::InvalidConfig(format!("invalid config file: {}", e)))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> SyncResult<Self> {
        let get = |section: &str, key: &str| {
            ini.section(Some(section))
                .and_then(|s| s.get(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            endpoint: get("hub", "endpoint").map(str::to_string),
            token: get("hub", "token").map(str::to_string),
            base_dir: get("download", "base_dir").map(expand_home),
            timeout_secs: parse_value(get("download", "timeout_secs"), "download.timeout_secs")?,
            connect_timeout_secs: parse_value(
                get("download", "connect_timeout_secs"),
                "download.connect_timeout_secs",
            )?,
            chunk_size: parse_value(get("download", "chunk_size"), "download.chunk_size")?,
            verify_after_transfer: parse_value(
                get("download", "verify_after_transfer"),
                "download.verify_after_transfer",
            )?,
            zero_fraction_threshold: parse_fraction(get("integrity", "zero_fraction_threshold"))?,
            trailing_zero_limit: parse_value(
                get("integrity", "trailing_zero_limit"),
                "integrity.trailing_zero_limit",
            )?,
            heuristic_min_size: parse_value(
                get("integrity", "heuristic_min_size"),
                "integrity.heuristic_min_size",
            )?,
        })
    }

    /// Overlay the values that are set onto `config`.
    pub fn apply(&self, config: &mut SyncConfig) {
        if let Some(ref endpoint) = self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(ref token) = self.token {
            config.token = Some(token.clone());
        }
        if let Some(ref base_dir) = self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size.max(1);
        }
        if let Some(verify) = self.verify_after_transfer {
            config.verify_after_transfer = verify;
        }
        if let Some(threshold) = self.zero_fraction_threshold {
            config.zero_scan.zero_fraction_threshold = threshold;
        }
        if let Some(limit) = self.trailing_zero_limit {
            config.zero_scan.trailing_zero_limit = limit;
        }
        if let Some(min_size) = self.heuristic_min_size {
            config.zero_scan.min_size = min_size;
        }
    }
}

fn parse_value<T: FromStr>(value: Option<&str>, key: &str) -> SyncResult<Option<T>> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| SyncError::InvalidConfig(format!("invalid value '{}' for {}", v, key)))
        })
        .transpose()
}

fn parse_fraction(value: Option<&str>) -> SyncResult<Option<f64>> {
    let key = "integrity.zero_fraction_threshold";
    match parse_value::<f64>(value, key)? {
        Some(f) if !(0.0..=1.0).contains(&f) => Err(SyncError::InvalidConfig(format!(
            "{} must be between 0.0 and 1.0, got {}",
            key, f
        ))),
        other => Ok(other),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}
