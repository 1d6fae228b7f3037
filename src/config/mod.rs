//! Updater configuration.
//!
//! Settings live in `~/.modupdater/config.toml`. The updater reads them once
//! per run and writes `last_update_check` back afterwards.

mod storage;

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::manifest::DEFAULT_FILE_SELECTOR;

pub use storage::ConfigStorage;

/// Default minutes between update checks.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log retention in hours.
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

/// Name of the scratch download folder inside the data directory.
pub const SCRATCH_DIR_NAME: &str = "Temp";

/// Name of the manual-recovery folder inside the data directory.
pub const MANUAL_DIR_NAME: &str = "Manual";

/// Update source assumed for packages by a trusted author that do not
/// declare one themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedSource {
    /// Value of the manifest `Author` field.
    pub author: String,
    /// GitHub user or organization.
    pub owner: String,
    /// GitHub repository name.
    pub repository: String,
    /// Directory inside the repository.
    #[serde(default)]
    pub subfolder: String,
    /// File selector with a `{PackageFolder}` placeholder.
    pub file_selector: String,
}

impl TrustedSource {
    /// Source used by the Platonymous mod collection.
    #[must_use]
    pub fn platonymous() -> Self {
        Self {
            author: "Platonymous".to_string(),
            owner: "Platonymous".to_string(),
            repository: "Stardew-Valley-Mods".to_string(),
            subfolder: "_releases".to_string(),
            file_selector: DEFAULT_FILE_SELECTOR.to_string(),
        }
    }
}

/// Updater configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes between update checks.
    pub interval: u64,
    /// When the last check ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_check: Option<DateTime<Local>>,
    /// Unique IDs that are never checked.
    pub exclude: BTreeSet<String>,
    /// Accept prerelease versions.
    pub load_prereleases: bool,
    /// Ask the host to restart once updates were applied.
    pub auto_restart: bool,
    /// Arguments passed to the restarted host process.
    pub execution_args: String,
    /// GitHub user for authenticated API calls.
    pub github_user: String,
    /// GitHub token or password for `github_user`.
    pub github_token: String,
    /// Packages directory; overrides the host default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages_dir: Option<PathBuf>,
    /// Host platform version used for compatibility checks.
    pub platform_version: String,
    /// Log level (trace, debug, info, warn, error, off).
    pub log_level: String,
    /// Log retention period in hours.
    pub log_retention_hours: u32,
    /// Conventional update sources for trusted authors.
    pub trusted_sources: Vec<TrustedSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_MINUTES,
            last_update_check: None,
            exclude: BTreeSet::new(),
            load_prereleases: false,
            auto_restart: false,
            execution_args: String::new(),
            github_user: String::new(),
            github_token: String::new(),
            packages_dir: None,
            platform_version: String::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            trusted_sources: vec![TrustedSource::platonymous()],
        }
    }
}

impl Config {
    /// Returns GitHub credentials if a user is configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.github_user.trim().is_empty() {
            None
        } else {
            Some((self.github_user.as_str(), self.github_token.as_str()))
        }
    }
}

/// Returns the updater data directory (`~/.modupdater`).
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".modupdater")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.interval, DEFAULT_INTERVAL_MINUTES);
        assert!(config.last_update_check.is_none());
        assert!(!config.load_prereleases);
        assert_eq!(config.trusted_sources.len(), 1);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_credentials() {
        let config = Config {
            github_user: "someone".to_string(),
            github_token: "secret".to_string(),
            ..Config::default()
        };
        assert_eq!(config.credentials(), Some(("someone", "secret")));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("interval = 5\nexclude = [\"a.b\"]\n").unwrap();
        assert_eq!(config.interval, 5);
        assert!(config.exclude.contains("a.b"));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_data_dir() {
        assert!(data_dir().to_string_lossy().contains(".modupdater"));
    }
}
