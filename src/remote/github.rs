//! GitHub REST client.
//!
//! Blocking client used for repository lookups, directory listings and
//! artifact downloads.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ListingEntry, RepositoryHandle, RepositoryProvider};
use crate::error::{RemoteError, UpdateError};

/// Public GitHub API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("modupdater/", env!("CARGO_PKG_VERSION"));

/// GitHub API response for a repository.
#[derive(Debug, Deserialize)]
struct GitHubRepository {
    id: u64,
    name: String,
    owner: GitHubOwner,
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

/// GitHub API response entry for directory contents.
#[derive(Debug, Clone, Deserialize)]
struct GitHubEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    download_url: Option<String>,
}

impl GitHubEntry {
    fn is_file(&self) -> bool {
        self.entry_type == "file"
    }
}

/// Blocking GitHub client.
pub struct GitHubClient {
    /// HTTP client.
    client: Client,
    /// API base URL.
    api_url: String,
    /// Optional basic-auth credentials (user, token).
    credentials: Option<(String, String)>,
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubClient {
    /// Creates an anonymous client for the public API.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_url: GITHUB_API_URL.to_string(),
            credentials: None,
        }
    }

    /// Authenticates API requests with a user and token.
    #[must_use]
    pub fn with_credentials(mut self, user: &str, token: &str) -> Self {
        assert!(!user.is_empty(), "User must not be empty");
        self.credentials = Some((user.to_string(), token.to_string()));
        self
    }

    /// Points the client at another API endpoint (GitHub Enterprise).
    #[must_use]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        assert!(!api_url.is_empty(), "API URL must not be empty");
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, token)) => request.basic_auth(user, Some(token)),
            None => request,
        }
    }

    /// Sends an API GET and maps error statuses.
    fn api_get(&self, url: &str) -> Result<Response, RemoteError> {
        debug!("[GITHUB] GET {}", url);
        let start = Instant::now();

        let response = self
            .authorized(self.client.get(url))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .map_err(|e| {
                warn!("[GITHUB] HTTP request failed: {}", e);
                RemoteError::from(e)
            })?;

        debug!("[GITHUB] Response: {} in {:?}", response.status(), start.elapsed());
        check_status(response, url)
    }
}

/// Maps a non-success response to a [`RemoteError`].
fn check_status(response: Response, url: &str) -> Result<Response, RemoteError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        warn!("[GITHUB] Not found: {}", url);
        return Err(RemoteError::NotFound(url.to_string()));
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        if header("x-ratelimit-remaining").as_deref() == Some("0") {
            let limit = header("x-ratelimit-limit")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            warn!("[GITHUB] Rate limit exceeded (limit {})", limit);
            return Err(RemoteError::RateLimitExceeded { limit });
        }
    }

    warn!("[GITHUB] API error: {} for {}", status, url);
    Err(RemoteError::Transport(format!("GitHub API error: {}", status)))
}

impl RepositoryProvider for GitHubClient {
    fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryHandle, RemoteError> {
        if owner.trim().is_empty() || name.trim().is_empty() {
            return Err(RemoteError::NotFound(format!("{}/{}", owner, name)));
        }

        let url = format!("{}/repos/{}/{}", self.api_url, owner, name);
        let repo: GitHubRepository = self.api_get(&url)?.json()?;

        Ok(RepositoryHandle {
            id: repo.id,
            owner: repo.owner.login,
            name: repo.name,
        })
    }

    fn get_directory_listing(
        &self,
        repository: &RepositoryHandle,
        subfolder: &str,
    ) -> Result<Vec<ListingEntry>, RemoteError> {
        let subfolder = subfolder.trim_matches('/');
        let url = if subfolder.is_empty() {
            format!("{}/repositories/{}/contents", self.api_url, repository.id)
        } else {
            format!(
                "{}/repositories/{}/contents/{}",
                self.api_url, repository.id, subfolder
            )
        };

        let entries: Vec<GitHubEntry> = self.api_get(&url)?.json().map_err(|e| {
            warn!("[GITHUB] Failed to parse listing: {}", e);
            RemoteError::Transport(format!("Failed to parse listing of {}: {}", url, e))
        })?;

        debug!(
            "[GITHUB] {} entries in {}/{}/{}",
            entries.len(),
            repository.owner,
            repository.name,
            subfolder
        );

        Ok(entries
            .into_iter()
            .filter(GitHubEntry::is_file)
            .map(|e| ListingEntry {
                path: e.path,
                download_url: e.download_url,
            })
            .collect())
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), UpdateError> {
        assert!(!url.is_empty(), "URL must not be empty");

        info!("[GITHUB] Downloading {}", url);
        let start = Instant::now();

        let response = self
            .authorized(self.client.get(url))
            .send()
            .map_err(RemoteError::from)?;
        let mut response = check_status(response, url)?;

        let mut file = File::create(dest)?;
        let bytes = response.copy_to(&mut file).map_err(RemoteError::from)?;
        file.flush()?;

        info!(
            "[GITHUB] Downloaded {} bytes to {} in {:?}",
            bytes,
            dest.display(),
            start.elapsed()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GitHubClient::new();
        assert_eq!(client.api_url(), GITHUB_API_URL);
        assert!(client.credentials.is_none());
    }

    #[test]
    fn test_with_credentials_and_api_url() {
        let client = GitHubClient::new()
            .with_credentials("someone", "token")
            .with_api_url("https://git.example.com/api/v3/");
        assert_eq!(client.api_url(), "https://git.example.com/api/v3");
        assert_eq!(
            client.credentials,
            Some(("someone".to_string(), "token".to_string()))
        );
    }

    #[test]
    fn test_blank_repository_is_not_found() {
        let client = GitHubClient::new().with_api_url("http://127.0.0.1:9");
        assert!(matches!(
            client.get_repository("", "repo"),
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(
            client.get_repository("owner", " "),
            Err(RemoteError::NotFound(_))
        ));
    }

    #[test]
    fn test_entry_deserialization() {
        let json = r#"[
            {"name": "a.zip", "path": "dist/a.zip", "type": "file", "size": 10,
             "download_url": "https://raw.githubusercontent.com/o/r/main/dist/a.zip"},
            {"name": "old", "path": "dist/old", "type": "dir", "download_url": null}
        ]"#;

        let entries: Vec<GitHubEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_file());
        assert!(!entries[1].is_file());
        assert!(entries[1].download_url.is_none());
    }

    #[test]
    #[should_panic(expected = "User must not be empty")]
    fn test_empty_user_panics() {
        let _ = GitHubClient::new().with_credentials("", "token");
    }
}
