//! Update run orchestration.
//!
//! [`UpdateDriver::run`] scans the packages directory, applies the throttle
//! gate, checks each package against its remote listing and installs the
//! first acceptable release. Failures stay inside the package that caused
//! them; a run always completes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeDelta};
use semver::Version;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::UpdateError;
use crate::installer::{InstallOutcome, Installer, ScratchArea};
use crate::manifest::{LocalPackage, PackageManifest, scan_packages};
use crate::matcher::{SelectionPolicy, match_release};
use crate::remote::{CacheKey, RepositoryCache, RepositoryProvider};
use crate::version::parse_version;

/// Throttle decision for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleState {
    /// Version checks are allowed this run.
    pub may_check: bool,
    /// Time until the next check is allowed (zero when allowed now).
    pub remaining: TimeDelta,
    /// When the next check is allowed.
    pub next_check: DateTime<Local>,
}

/// Minimum-interval gate between update checks.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleGate {
    interval: TimeDelta,
    last_check: Option<DateTime<Local>>,
}

impl ThrottleGate {
    /// Creates a gate for `interval_minutes` since `last_check`.
    #[must_use]
    pub fn new(interval_minutes: u64, last_check: Option<DateTime<Local>>) -> Self {
        let minutes = i64::try_from(interval_minutes).unwrap_or(i64::MAX);
        Self {
            interval: TimeDelta::try_minutes(minutes).unwrap_or(TimeDelta::MAX),
            last_check,
        }
    }

    /// Gate configured from `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.interval, config.last_update_check)
    }

    /// Decides whether a check may run at `now`.
    #[must_use]
    pub fn evaluate(&self, now: DateTime<Local>) -> ThrottleState {
        let Some(last) = self.last_check else {
            return ThrottleState {
                may_check: true,
                remaining: TimeDelta::zero(),
                next_check: now,
            };
        };

        let elapsed = now - last;
        let next_check = last.checked_add_signed(self.interval).unwrap_or(now);

        if elapsed >= self.interval {
            ThrottleState {
                may_check: true,
                remaining: TimeDelta::zero(),
                next_check: now,
            }
        } else {
            ThrottleState {
                may_check: false,
                remaining: self.interval.checked_sub(&elapsed).unwrap_or(TimeDelta::MAX),
                next_check,
            }
        }
    }
}

/// Mutable state of one update run.
#[derive(Debug)]
pub struct RunContext {
    /// Listings fetched so far.
    pub cache: RepositoryCache,
    /// Manifests of releases installed this run.
    pub updated: Vec<PackageManifest>,
    /// Successful installs.
    pub installs: u32,
    /// The next-check notice was already logged.
    pub logged_next_check: bool,
    /// Download scratch space.
    pub scratch: ScratchArea,
}

impl RunContext {
    /// Creates an empty context with its scratch area under `data_dir`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            cache: RepositoryCache::new(),
            updated: Vec::new(),
            installs: 0,
            logged_next_check: false,
            scratch: ScratchArea::new(data_dir),
        }
    }

    fn log_next_check(&mut self, throttle: &ThrottleState) {
        if self.logged_next_check {
            return;
        }
        info!(
            "[UPDATER] Next update check: {} (in {} minutes)",
            throttle.next_check.format("%Y-%m-%dT%H:%M:%S"),
            throttle.remaining.num_minutes()
        );
        self.logged_next_check = true;
    }
}

/// Summary of one update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Number of releases installed.
    pub installed: u32,
    /// Manifests of the installed releases, in install order.
    pub updated: Vec<PackageManifest>,
    /// Packages with an update source.
    pub packages: usize,
    /// Packages whose check failed.
    pub failed: usize,
    /// Wait until the next check when the run was throttled.
    pub next_check_in: Option<TimeDelta>,
}

impl UpdateReport {
    /// One-line outcome for the console.
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.installed, self.failed) {
            (0, 0) => format!("All {} package(s) are up to date.", self.packages),
            (0, failed) => format!(
                "No updates installed. {} of {} package(s) could not be checked.",
                failed, self.packages
            ),
            (installed, 0) => format!("{} package(s) updated.", installed),
            (installed, failed) => format!(
                "{} package(s) updated. {} package(s) could not be checked.",
                installed, failed
            ),
        }
    }

    /// True if anything was installed and the host should restart.
    #[must_use]
    pub fn restart_recommended(&self) -> bool {
        self.installed > 0
    }
}

/// Runs update checks across all installed packages.
pub struct UpdateDriver<'a> {
    provider: &'a dyn RepositoryProvider,
    data_dir: PathBuf,
    platform_version: Option<Version>,
}

impl<'a> UpdateDriver<'a> {
    /// Creates a driver that keeps scratch files under `data_dir`.
    #[must_use]
    pub fn new(provider: &'a dyn RepositoryProvider, data_dir: &Path) -> Self {
        Self {
            provider,
            data_dir: data_dir.to_path_buf(),
            platform_version: None,
        }
    }

    /// Sets the host platform version used for compatibility checks.
    #[must_use]
    pub fn with_platform_version(mut self, version: Option<Version>) -> Self {
        self.platform_version = version;
        self
    }

    /// Checks every package under `root` and installs available updates.
    ///
    /// Updates `config.last_update_check` when the throttle allows a check;
    /// the caller persists it.
    pub fn run(&self, root: &Path, config: &mut Config, now: DateTime<Local>) -> UpdateReport {
        info!("[UPDATER] Starting");

        let packages: Vec<LocalPackage> = scan_packages(root, &config.exclude)
            .into_iter()
            .filter_map(|mut package| {
                package
                    .resolve_update_info(&config.trusted_sources)
                    .then_some(package)
            })
            .collect();

        let throttle = ThrottleGate::from_config(config).evaluate(now);
        if throttle.may_check {
            config.last_update_check = Some(now);
        }

        let mut ctx = RunContext::new(&self.data_dir);
        let mut report = UpdateReport {
            installed: 0,
            updated: Vec::new(),
            packages: packages.len(),
            failed: 0,
            next_check_in: (!throttle.may_check).then_some(throttle.remaining),
        };

        let forced = packages
            .iter()
            .any(|p| p.manifest.update_info.install);
        if !throttle.may_check && !forced {
            ctx.log_next_check(&throttle);
            Self::purge_scratch(&ctx);
            return report;
        }

        for package in &packages {
            let id = &package.manifest.unique_id;
            match self.check_package(&mut ctx, package, &throttle, config) {
                Ok(installs) => ctx.installs += installs,
                Err(e) if e.is_rate_limit() => {
                    error!("[UPDATER] [{}] Updater failed: {}. Please try again later", id, e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!("[UPDATER] [{}] Updater failed. Please try again later: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        Self::purge_scratch(&ctx);

        if ctx.installs > 0 {
            info!("[UPDATER] {} package(s) updated", ctx.installs);
        } else {
            debug!("[UPDATER] No updates installed");
        }

        report.installed = ctx.installs;
        report.updated = ctx.updated;
        report
    }

    fn purge_scratch(ctx: &RunContext) {
        if let Err(e) = ctx.scratch.purge() {
            warn!(
                "[UPDATER] Could not remove {}: {}",
                ctx.scratch.dir().display(),
                e
            );
        }
    }

    /// Checks one package. Returns the number of installs (0 or 1).
    fn check_package(
        &self,
        ctx: &mut RunContext,
        package: &LocalPackage,
        throttle: &ThrottleState,
        config: &Config,
    ) -> Result<u32, UpdateError> {
        let manifest = &package.manifest;
        let info = &manifest.update_info;
        let policy = SelectionPolicy {
            force_install: info.install,
            may_check: throttle.may_check,
            allow_prereleases: config.load_prereleases,
        };

        if !policy.may_check && !policy.force_install {
            ctx.log_next_check(throttle);
            return Ok(0);
        }

        let key = CacheKey::for_update(info);
        let listing = ctx.cache.get_or_fetch(&key, self.provider)?.to_vec();

        info!("[UPDATER] Checking for updates: {}", manifest.label());
        info!("[UPDATER] Current version: {}", manifest.version);

        let installed = parse_version(&manifest.version).ok();
        let candidates = match_release(info, &listing, installed.as_ref(), policy);
        let installer = Installer::new(self.provider, self.platform_version.as_ref());

        for candidate in candidates {
            match installer.install(package, &candidate, &ctx.scratch)? {
                InstallOutcome::Installed(updated) => {
                    ctx.updated.push(updated);
                    return Ok(1);
                }
                InstallOutcome::NotAnUpdate | InstallOutcome::Incompatible { .. } => {}
                InstallOutcome::ManualFallback { .. } => return Ok(0),
            }
        }

        Ok(0)
    }
}
