//! Error types for the updater.
//!
//! Every failure a single package can hit is an [`UpdateError`]. The driver
//! catches these at the package boundary, so none of them abort a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`RepositoryProvider`](crate::remote::RepositoryProvider).
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API refused the request because the hourly quota is spent.
    #[error("GitHub API rate limit exceeded (limit {limit})")]
    RateLimitExceeded {
        /// Requests allowed per window, as reported by the API.
        limit: u32,
    },

    /// Repository or path does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything else on the wire.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Errors that can occur while checking or installing a package update.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Manifest JSON could not be parsed.
    #[error("Manifest error in {path}: {source}")]
    Manifest {
        /// Manifest that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// A version string is not a semantic version.
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    /// Remote listing or download failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The downloaded file is not a readable zip archive.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The file selector does not compile.
    #[error("Invalid file selector: {0}")]
    Pattern(#[from] regex::Error),
}

impl UpdateError {
    /// Returns true if this is a rate-limit failure from the remote API.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::Remote(RemoteError::RateLimitExceeded { .. }))
    }
}

/// Config storage errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// File too large.
    #[error("Config file too large (max {max} bytes)")]
    FileTooLarge {
        /// Size limit in bytes.
        max: u64,
    },
}
