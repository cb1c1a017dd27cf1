//! HTTP source backed by a blocking reqwest client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, RANGE};
use tracing::debug;

use super::source::{interpret_response, RemoteBody, RemoteSource};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::hub::RepoLocation;
use crate::manifest::FileEntry;

/// Fetches file bytes from `resolve` URLs of a repository snapshot.
///
/// Sends `Range: bytes=N-` for any nonzero offset and lets
/// [`interpret_response`] decide whether the server honoured it.
#[derive(Debug)]
pub struct HttpSource {
    client: Client,
    location: RepoLocation,
    token: Option<String>,
    pub(crate) timeout: Duration,
}

impl HttpSource {
    /// Create a source for `location` using the timeouts and token from `config`.
    pub fn new(location: RepoLocation, config: &SyncConfig) -> SyncResult<Self> {
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
            location,
            token: config.token.clone(),
            timeout: config.timeout,
        })
    }

    pub fn location(&self) -> &RepoLocation {
        &self.location
    }
}

impl RemoteSource for HttpSource {
    fn open(&self, entry: &FileEntry, offset: u64) -> SyncResult<RemoteBody> {
        let url = self.location.file_url(entry.relative_path());
        let path = entry.relative_path();

        let mut request = self.client.get(url.clone());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        debug!(url = %url, offset, "Requesting file bytes");
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                SyncError::RemoteUnavailable {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        let kind = interpret_response(
            response.status().as_u16(),
            offset,
            content_range.as_deref(),
            content_length,
            entry.expected_size(),
            path,
        )?;

        Ok(RemoteBody {
            kind,
            content_length,
            reader: Box::new(response),
        })
    }
}
