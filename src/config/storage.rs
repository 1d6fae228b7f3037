//! Config file persistence.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use super::{Config, data_dir};
use crate::error::ConfigError;

/// Maximum size of the config file (256KB).
const MAX_FILE_SIZE: u64 = 256 * 1024;

/// Loads and saves [`Config`] as TOML.
#[derive(Debug)]
pub struct ConfigStorage {
    /// Path to the config file.
    path: PathBuf,
}

impl ConfigStorage {
    /// Creates a storage manager with the default path.
    ///
    /// Default path: `~/.modupdater/config.toml`
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    /// Creates a storage manager with a custom path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        assert!(!path.as_os_str().is_empty(), "path must not be empty");
        Self { path }
    }

    /// Returns the default config path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        data_dir().join("config.toml")
    }

    /// Returns the config file path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Loads the config, or defaults if the file does not exist yet.
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.path.exists() {
            debug!("[CONFIG] {} not found, using defaults", self.path.display());
            return Ok(Config::default());
        }

        let metadata = fs::metadata(&self.path)?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(ConfigError::FileTooLarge { max: MAX_FILE_SIZE });
        }

        let content = fs::read_to_string(&self.path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the config.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;

        // Write atomically (write to temp, then rename)
        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;

        // The file may hold a GitHub token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }
}

impl Default for ConfigStorage {
    fn default() -> Self {
        Self::new()
    }
}
