//! modupdater
//!
//! Keeps locally installed packages current with releases published in
//! GitHub repositories.
//!
//! # Architecture
//!
//! - **Manifest Module**: discovers and parses package manifests
//! - **Remote Module**: GitHub listing and download client, per-run cache
//! - **Matcher Module**: file selector matching and candidate selection
//! - **Installer Module**: download, compatibility check, archive merge
//! - **Driver Module**: throttle gate and the per-run update loop
//! - **Host Module**: restart and version hooks for the host loader
//!
//! # Usage
//!
//! ```no_run
//! use modupdater::{Config, GitHubClient, UpdateDriver};
//! use std::path::Path;
//!
//! let mut config = Config::default();
//! let client = GitHubClient::new();
//! let driver = UpdateDriver::new(&client, Path::new("/tmp/modupdater"));
//! let report = driver.run(Path::new("Mods"), &mut config, chrono::Local::now());
//! println!("{} package(s) updated", report.installed);
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod installer;
pub mod logging;
pub mod manifest;
pub mod matcher;
pub mod remote;
pub mod version;

// Re-export main types
pub use config::{Config, ConfigStorage, TrustedSource};
pub use driver::{RunContext, ThrottleGate, UpdateDriver, UpdateReport};
pub use error::{ConfigError, RemoteError, UpdateError};
pub use host::{HookDecision, HostPlatform, LoaderHook, PendingUpdates, StandaloneHost};
pub use installer::{InstallOutcome, Installer, ScratchArea};
pub use manifest::{LocalPackage, PackageManifest, UpdateInfo, scan_packages};
pub use remote::{GitHubClient, RepositoryCache, RepositoryProvider};
