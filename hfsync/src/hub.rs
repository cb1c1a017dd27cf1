//! HuggingFace Hub metadata client.
//!
//! Resolves a repository id to its file listing and builds the download URL
//! for each file. Only the parts of the Hub API needed to build a
//! [`Manifest`] are covered.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::LINK;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::manifest::{FileEntry, Manifest};

/// Default Hub endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Default revision.
pub const DEFAULT_REVISION: &str = "main";

/// Kind of repository on the Hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoType {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoType {
    /// Plural name used in API paths and local directory layout.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Dataset => "datasets",
            Self::Space => "spaces",
        }
    }

    /// Prefix of download URLs (`/<prefix>/<org>/<name>/resolve/...`).
    fn url_prefix(self) -> Option<&'static str> {
        match self {
            Self::Model => None,
            Self::Dataset => Some("datasets"),
            Self::Space => Some("spaces"),
        }
    }
}

impl FromStr for RepoType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "model" | "models" => Ok(Self::Model),
            "dataset" | "datasets" => Ok(Self::Dataset),
            "space" | "spaces" => Ok(Self::Space),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown repository type '{}'",
                other
            ))),
        }
    }
}

/// Repository id of the form `organization/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    org: String,
    name: String,
}

impl RepoId {
    /// Parse `organization/name`.
    pub fn parse(id: &str) -> SyncResult<Self> {
        let (org, name) = id
            .split_once('/')
            .ok_or_else(|| SyncError::InvalidRepoId(id.to_string()))?;
        if org.is_empty() || name.is_empty() || name.contains('/') {
            return Err(SyncError::InvalidRepoId(id.to_string()));
        }
        Ok(Self {
            org: org.to_string(),
            name: name.to_string(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}

impl FromStr for RepoId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Local directory for a repository: `<base>/<models|datasets|spaces>/<org>/<name>`.
pub fn download_root(base: &Path, repo: &RepoId, repo_type: RepoType) -> PathBuf {
    base.join(repo_type.plural()).join(repo.org()).join(repo.name())
}

/// A repository snapshot on a specific Hub endpoint.
#[derive(Debug, Clone)]
pub struct RepoLocation {
    endpoint: Url,
    repo: RepoId,
    repo_type: RepoType,
    revision: String,
}

impl RepoLocation {
    /// Create a location. Fails if `endpoint` is not an absolute URL.
    pub fn new(
        endpoint: &str,
        repo: RepoId,
        repo_type: RepoType,
        revision: impl Into<String>,
    ) -> SyncResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            SyncError::InvalidConfig(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(SyncError::InvalidConfig(format!(
                "invalid endpoint '{}'",
                endpoint
            )));
        }
        Ok(Self {
            endpoint,
            repo,
            repo_type,
            revision: revision.into(),
        })
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn repo_type(&self) -> RepoType {
        self.repo_type
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// `{endpoint}/api/{type}/{org}/{name}/tree/{revision}?recursive=true`
    pub fn tree_url(&self) -> Url {
        let mut url = self.join_segments([
            "api",
            self.repo_type.plural(),
            self.repo.org(),
            self.repo.name(),
            "tree",
            self.revision.as_str(),
        ]);
        url.query_pairs_mut().append_pair("recursive", "true");
        url
    }

    /// `{endpoint}/[{type}/]{org}/{name}/resolve/{revision}/{path}`
    pub fn file_url(&self, relative_path: &str) -> Url {
        let segments = self
            .repo_type
            .url_prefix()
            .into_iter()
            .chain([
                self.repo.org(),
                self.repo.name(),
                "resolve",
                self.revision.as_str(),
            ])
            .chain(relative_path.split('/'));
        self.join_segments(segments)
    }

    fn join_segments<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// One item of the Hub tree listing.
#[derive(Debug, Deserialize)]
struct TreeItem {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    lfs: Option<LfsInfo>,
}

#[derive(Debug, Deserialize)]
struct LfsInfo {
    oid: String,
    size: u64,
}

/// Parse one page of a tree listing into file entries.
///
/// Directories are dropped. LFS files take their size and SHA-256 from the
/// `lfs` object; plain git files carry no checksum.
pub fn parse_tree(body: &[u8]) -> SyncResult<Vec<FileEntry>> {
    let items: Vec<TreeItem> =
        serde_json::from_slice(body).map_err(|e| SyncError::MetadataFailed {
            repo: String::from("<tree listing>"),
            reason: format!("unexpected response: {}", e),
        })?;

    Ok(items
        .into_iter()
        .filter(|item| item.kind == "file")
        .map(|item| match item.lfs {
            Some(lfs) => FileEntry::new(item.path, lfs.size).with_checksum(lfs.oid),
            None => FileEntry::new(item.path, item.size.unwrap_or(0)),
        })
        .collect())
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

/// Blocking client for the Hub file listing.
#[derive(Debug)]
pub struct HubClient {
    client: Client,
    token: Option<String>,
    timeout: Duration,
}

impl HubClient {
    /// Create a client using the timeouts and token from `config`.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| {
                SyncError::InvalidConfig(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            token: config.token.clone(),
            timeout: config.timeout,
        })
    }

    /// List every file of the repository snapshot, following pagination.
    pub fn list_files(&self, location: &RepoLocation) -> SyncResult<Manifest> {
        let repo = location.repo().to_string();
        let fail = |reason: String| SyncError::MetadataFailed {
            repo: repo.clone(),
            reason,
        };

        let mut entries = Vec::new();
        let mut next = Some(location.tree_url());

        while let Some(url) = next.take() {
            debug!(url = %url, "Fetching tree listing");
            let mut request = self.client.get(url.clone());
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().map_err(|e| {
                if e.is_timeout() {
                    fail(format!("timed out after {}s", self.timeout.as_secs()))
                } else {
                    fail(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(fail(format!("HTTP {}{}", status, auth_hint(status.as_u16()))));
            }

            next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link)
                .map(|link| Url::parse(&link).or_else(|_| url.join(&link)))
                .transpose()
                .map_err(|e| fail(format!("invalid pagination link: {}", e)))?;

            let body = response
                .bytes()
                .map_err(|e| fail(format!("failed to read response: {}", e)))?;
            let page = parse_tree(&body).map_err(|e| match e {
                SyncError::MetadataFailed { reason, .. } => fail(reason),
                other => other,
            })?;
            entries.extend(page);
        }

        let manifest = Manifest::new(entries)?;
        info!(
            repo = %location.repo(),
            revision = location.revision(),
            files = manifest.len(),
            bytes = manifest.total_size(),
            "Listed repository files"
        );
        Ok(manifest)
    }
}

/// Extra hint appended to authorization failures.
pub(crate) fn auth_hint(status: u16) -> &'static str {
    if status == 401 || status == 403 {
        " (hint: set HF_TOKEN or --token for gated or private repositories)"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(repo_type: RepoType, revision: &str) -> RepoLocation {
        RepoLocation::new(
            "https://huggingface.co",
            RepoId::parse("mlx-community/Qwen3-Embedding-0.6B-8bit").unwrap(),
            repo_type,
            revision,
        )
        .unwrap()
    }

    #[test]
    fn test_repo_id_parse() {
        let repo = RepoId::parse("openai/gpt-oss-120b").unwrap();
        assert_eq!(repo.org(), "openai");
        assert_eq!(repo.name(), "gpt-oss-120b");
        assert_eq!(repo.to_string(), "openai/gpt-oss-120b");
    }

    #[test]
    fn test_repo_id_rejects_malformed() {
        for bad in ["gpt2", "/name", "org/", "a/b/c", ""] {
            assert!(
                matches!(RepoId::parse(bad), Err(SyncError::InvalidRepoId(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_repo_type_from_str() {
        assert_eq!("dataset".parse::<RepoType>().unwrap(), RepoType::Dataset);
        assert_eq!("Models".parse::<RepoType>().unwrap(), RepoType::Model);
        assert!("gist".parse::<RepoType>().is_err());
    }

    #[test]
    fn test_download_root_layout() {
        let repo = RepoId::parse("org/name").unwrap();
        assert_eq!(
            download_root(Path::new("/hf"), &repo, RepoType::Model),
            PathBuf::from("/hf/models/org/name")
        );
        assert_eq!(
            download_root(Path::new("/hf"), &repo, RepoType::Dataset),
            PathBuf::from("/hf/datasets/org/name")
        );
    }

    #[test]
    fn test_tree_url() {
        let url = location(RepoType::Model, "main").tree_url();
        assert_eq!(
            url.as_str(),
            "https://huggingface.co/api/models/mlx-community/Qwen3-Embedding-0.6B-8bit/tree/main?recursive=true"
        );
    }

    #[test]
    fn test_file_url_model_and_dataset() {
        let url = location(RepoType::Model, "main").file_url("metal/model.bin");
        assert_eq!(
            url.as_str(),
            "https://huggingface.co/mlx-community/Qwen3-Embedding-0.6B-8bit/resolve/main/metal/model.bin"
        );

        let url = location(RepoType::Dataset, "main").file_url("data.parquet");
        assert_eq!(
            url.as_str(),
            "https://huggingface.co/datasets/mlx-community/Qwen3-Embedding-0.6B-8bit/resolve/main/data.parquet"
        );
    }

    #[test]
    fn test_revision_with_slash_is_one_segment() {
        let url = location(RepoType::Model, "refs/pr/1").file_url("config.json");
        assert!(url.as_str().contains("/resolve/refs%2Fpr%2F1/config.json"));
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let loc = RepoLocation::new(
            "http://localhost:8080/",
            RepoId::parse("org/name").unwrap(),
            RepoType::Model,
            "main",
        )
        .unwrap();
        assert_eq!(
            loc.file_url("a.txt").as_str(),
            "http://localhost:8080/org/name/resolve/main/a.txt"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = RepoLocation::new(
            "not a url",
            RepoId::parse("org/name").unwrap(),
            RepoType::Model,
            "main",
        );
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_parse_tree_files_and_lfs() {
        let body = br#"[
            {"type": "directory", "oid": "d1", "size": 0, "path": "metal"},
            {"type": "file", "oid": "abc", "size": 120, "path": "config.json"},
            {"type": "file", "oid": "def", "size": 134,
             "lfs": {"oid": "5f2a", "size": 5000000000, "pointerSize": 134},
             "path": "metal/model.bin"}
        ]"#;

        let entries = parse_tree(body).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], FileEntry::new("config.json", 120));
        assert_eq!(
            entries[1],
            FileEntry::new("metal/model.bin", 5_000_000_000).with_checksum("5f2a")
        );
    }

    #[test]
    fn test_parse_tree_rejects_garbage() {
        assert!(matches!(
            parse_tree(b"{\"error\": \"Repository not found\"}"),
            Err(SyncError::MetadataFailed { .. })
        ));
    }

    #[test]
    fn test_next_link() {
        let header = "<https://huggingface.co/api/models/a/b/tree/main?recursive=true&cursor=xyz>; rel=\"next\"";
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://huggingface.co/api/models/a/b/tree/main?recursive=true&cursor=xyz")
        );
        assert_eq!(next_link("<https://x/prev>; rel=\"prev\""), None);
        assert_eq!(
            next_link("<https://x/prev>; rel=\"prev\", <https://x/next>; rel=\"next\"").as_deref(),
            Some("https://x/next")
        );
    }

    #[test]
    fn test_auth_hint() {
        assert!(auth_hint(401).contains("HF_TOKEN"));
        assert!(auth_hint(403).contains("HF_TOKEN"));
        assert_eq!(auth_hint(404), "");
    }
}
