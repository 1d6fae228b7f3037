//! Host integration.
//!
//! The updater runs before the host loads its packages. Two hook points let
//! the host react to what was installed:
//!
//! - [`LoaderHook::before_update_check`]: runs before the host's own update
//!   check and may ask for a process restart.
//! - [`LoaderHook::before_package_load`]: runs for each package the host
//!   loads and reports the version that is now on disk.
//!
//! State crosses from the updater to the host in `pending_updates.json`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::driver::UpdateReport;
use crate::error::UpdateError;
use crate::manifest::PackageManifest;
use crate::version::parse_version;

/// File name of the pending-update state.
pub const PENDING_UPDATES_FILE: &str = "pending_updates.json";

/// What the host needs from its environment.
pub trait HostPlatform {
    /// Directory holding installed packages.
    fn packages_dir(&self) -> PathBuf;

    /// Directory for updater state (scratch, manual, logs).
    fn data_dir(&self) -> PathBuf;

    /// Running platform version, if known.
    fn platform_version(&self) -> Option<Version>;
}

/// Host settings for running the updater as a standalone program.
#[derive(Debug, Clone)]
pub struct StandaloneHost {
    packages_dir: PathBuf,
    data_dir: PathBuf,
    platform_version: Option<Version>,
}

impl StandaloneHost {
    /// Builds a host from explicit values.
    #[must_use]
    pub fn new(packages_dir: PathBuf, data_dir: PathBuf, platform_version: Option<Version>) -> Self {
        Self {
            packages_dir,
            data_dir,
            platform_version,
        }
    }

    /// Builds a host from the config, falling back to `default_packages_dir`.
    #[must_use]
    pub fn from_config(config: &Config, data_dir: PathBuf, default_packages_dir: PathBuf) -> Self {
        let platform_version = if config.platform_version.trim().is_empty() {
            None
        } else {
            parse_version(&config.platform_version).ok()
        };

        Self {
            packages_dir: config.packages_dir.clone().unwrap_or(default_packages_dir),
            data_dir,
            platform_version,
        }
    }
}

impl HostPlatform for StandaloneHost {
    fn packages_dir(&self) -> PathBuf {
        self.packages_dir.clone()
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn platform_version(&self) -> Option<Version> {
        self.platform_version.clone()
    }
}

/// Updates applied by the last run, as handed to the host loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdates {
    /// Number of installs.
    pub installed: u32,
    /// Manifests shipped with the installed releases.
    pub updated: Vec<PackageManifest>,
}

impl PendingUpdates {
    /// Builds the pending state from a run report.
    #[must_use]
    pub fn from_report(report: &UpdateReport) -> Self {
        Self {
            installed: report.installed,
            updated: report.updated.clone(),
        }
    }

    /// Path of the state file in `data_dir`.
    #[must_use]
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(PENDING_UPDATES_FILE)
    }

    /// Loads the state file, or an empty state if there is none.
    pub fn load(path: &Path) -> Result<Self, UpdateError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| UpdateError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the state file, replacing any previous one.
    pub fn save(&self, path: &Path) -> Result<(), UpdateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| UpdateError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

        let temp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.flush()?;
        }
        fs::rename(&temp_path, path)?;

        debug!("[HOST] Wrote {} pending updates to {}", self.installed, path.display());
        Ok(())
    }
}

/// A request to relaunch the host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    /// Executable to start.
    pub program: PathBuf,
    /// Arguments for the new process.
    pub args: Vec<String>,
}

impl RestartRequest {
    /// Relaunches `program` with whitespace-separated `execution_args`.
    #[must_use]
    pub fn new(program: PathBuf, execution_args: &str) -> Self {
        Self {
            program,
            args: execution_args.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Builds the command that performs the restart.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Decision returned by [`LoaderHook::before_update_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Let the host continue normally.
    Continue,
    /// Restart the host so the updated packages are loaded.
    Restart(RestartRequest),
}

/// Hook points the host calls during startup.
#[derive(Debug)]
pub struct LoaderHook {
    pending: PendingUpdates,
    auto_restart: bool,
    execution_args: String,
    program: PathBuf,
    restart_issued: bool,
}

impl LoaderHook {
    /// Creates a hook that relaunches `program` when asked to restart.
    #[must_use]
    pub fn new(pending: PendingUpdates, config: &Config, program: PathBuf) -> Self {
        Self {
            pending,
            auto_restart: config.auto_restart,
            execution_args: config.execution_args.clone(),
            program,
            restart_issued: false,
        }
    }

    /// Pending updates this hook reports.
    #[must_use]
    pub fn pending(&self) -> &PendingUpdates {
        &self.pending
    }

    /// Called before the host runs its own update check.
    ///
    /// Requests a restart once if updates were installed and auto-restart
    /// is enabled.
    pub fn before_update_check(&mut self) -> HookDecision {
        if self.pending.installed == 0 || !self.auto_restart || self.restart_issued {
            return HookDecision::Continue;
        }

        self.restart_issued = true;
        info!("[HOST] Restarting to load {} updated package(s)", self.pending.installed);
        HookDecision::Restart(RestartRequest::new(self.program.clone(), &self.execution_args))
    }

    /// Called before the host loads `unique_id`; returns the installed
    /// version if the package was updated.
    #[must_use]
    pub fn before_package_load(&self, unique_id: &str) -> Option<Version> {
        if self.pending.installed == 0 {
            return None;
        }

        self.pending
            .updated
            .iter()
            .rev()
            .filter(|m| m.unique_id == unique_id)
            .find_map(|m| parse_version(&m.version).ok())
    }

    /// Notice shown after startup when updates were installed.
    #[must_use]
    pub fn restart_notice(&self) -> Option<String> {
        (self.pending.installed > 0).then(|| {
            format!(
                "{} package(s) were updated. A restart is recommended.",
                self.pending.installed
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(id: &str, version: &str) -> PackageManifest {
        PackageManifest {
            unique_id: id.to_string(),
            version: version.to_string(),
            ..PackageManifest::default()
        }
    }

    fn pending() -> PendingUpdates {
        PendingUpdates {
            installed: 2,
            updated: vec![
                manifest("a.pkg", "1.1.0"),
                manifest("b.pkg", "2.0.0"),
                manifest("a.pkg", "1.2.0"),
            ],
        }
    }

    #[test]
    fn test_pending_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = PendingUpdates::path(dir.path());
        assert_eq!(PendingUpdates::load(&path).unwrap(), PendingUpdates::default());

        pending().save(&path).unwrap();
        assert_eq!(PendingUpdates::load(&path).unwrap(), pending());
    }

    #[test]
    fn test_restart_requested_once() {
        let config = Config {
            auto_restart: true,
            execution_args: "--skip-intro  --windowed".to_string(),
            ..Config::default()
        };
        let mut hook = LoaderHook::new(pending(), &config, PathBuf::from("/opt/host/run"));

        let HookDecision::Restart(request) = hook.before_update_check() else {
            panic!("expected a restart request");
        };
        assert_eq!(request.args, vec!["--skip-intro", "--windowed"]);
        assert_eq!(request.command().get_program(), "/opt/host/run");
        assert_eq!(hook.before_update_check(), HookDecision::Continue);
    }

    #[test]
    fn test_no_restart_without_auto_restart_or_installs() {
        let mut hook = LoaderHook::new(pending(), &Config::default(), PathBuf::from("run"));
        assert_eq!(hook.before_update_check(), HookDecision::Continue);

        let config = Config {
            auto_restart: true,
            ..Config::default()
        };
        let mut hook = LoaderHook::new(PendingUpdates::default(), &config, PathBuf::from("run"));
        assert_eq!(hook.before_update_check(), HookDecision::Continue);
        assert!(hook.restart_notice().is_none());
    }

    #[test]
    fn test_version_override_later_wins() {
        let hook = LoaderHook::new(pending(), &Config::default(), PathBuf::from("run"));
        assert_eq!(hook.before_package_load("a.pkg"), parse_version("1.2.0").ok());
        assert_eq!(hook.before_package_load("b.pkg"), parse_version("2.0.0").ok());
        assert_eq!(hook.before_package_load("c.pkg"), None);
        assert_eq!(
            hook.restart_notice().as_deref(),
            Some("2 package(s) were updated. A restart is recommended.")
        );
    }

    #[test]
    fn test_standalone_host_from_config() {
        let config = Config {
            platform_version: "4.0".to_string(),
            packages_dir: Some(PathBuf::from("/games/Mods")),
            ..Config::default()
        };
        let host = StandaloneHost::from_config(&config, PathBuf::from("/data"), PathBuf::from("Mods"));
        assert_eq!(host.packages_dir(), PathBuf::from("/games/Mods"));
        assert_eq!(host.platform_version(), parse_version("4.0.0").ok());

        let host = StandaloneHost::from_config(&Config::default(), PathBuf::from("/data"), PathBuf::from("Mods"));
        assert_eq!(host.packages_dir(), PathBuf::from("Mods"));
        assert!(host.platform_version().is_none());
    }
}
