//! modupdater - Main entry point.
//!
//! Usage: modupdater [OPTIONS]
//!
//! Options:
//!   --version, -v               Show version
//!   --help, -h                  Show this help
//!   --root <DIR>                Packages directory to update
//!   --config <FILE>             Config file (default ~/.modupdater/config.toml)
//!   --platform-version <VER>    Host platform version for compatibility checks
//!   --force                     Ignore the check interval for this run
//!   --no-log-file               Log to stderr only

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, warn};

use modupdater::config::{ConfigStorage, data_dir};
use modupdater::host::{HostPlatform, PendingUpdates, StandaloneHost};
use modupdater::logging::{self, LogConfig};
use modupdater::version::parse_version;
use modupdater::{GitHubClient, LoaderHook, UpdateDriver};

/// Crate version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = "\
Usage: modupdater [OPTIONS]

Options:
  --version, -v               Show version
  --help, -h                  Show this help
  --root <DIR>                Packages directory to update
  --config <FILE>             Config file (default ~/.modupdater/config.toml)
  --platform-version <VER>    Host platform version for compatibility checks
  --force                     Ignore the check interval for this run
  --no-log-file               Log to stderr only";

/// Parsed command line.
#[derive(Debug, Default)]
struct CliArgs {
    root: Option<PathBuf>,
    config: Option<PathBuf>,
    platform_version: Option<String>,
    force: bool,
    no_log_file: bool,
}

/// Returns the value following `flag`, or an error if it is missing.
fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next()
        .filter(|v| !v.starts_with("--"))
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--root" => cli.root = Some(PathBuf::from(flag_value(&mut args, &arg)?)),
            "--config" => cli.config = Some(PathBuf::from(flag_value(&mut args, &arg)?)),
            "--platform-version" => cli.platform_version = Some(flag_value(&mut args, &arg)?),
            "--force" => cli.force = true,
            "--no-log-file" => cli.no_log_file = true,
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    Ok(cli)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("modupdater v{}", VERSION);
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", HELP);
        return ExitCode::SUCCESS;
    }

    let cli = match parse_args(args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}\n\n{}", e, HELP);
            return ExitCode::from(2);
        }
    };

    let data_dir = data_dir();
    let storage = cli
        .config
        .clone()
        .map_or_else(ConfigStorage::new, ConfigStorage::with_path);

    let mut config = match storage.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", storage.path().display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut log_config = LogConfig::from_config(&config, &data_dir);
    log_config.file_output = !cli.no_log_file;
    if let Err(e) = logging::init(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let default_root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let configured = StandaloneHost::from_config(&config, data_dir.clone(), default_root);

    // Command line values apply to this run only and are not saved
    let platform_version = match &cli.platform_version {
        Some(version) => match parse_version(version) {
            Ok(version) => Some(version),
            Err(e) => {
                error!("[MAIN] {}", e);
                return ExitCode::from(2);
            }
        },
        None => configured.platform_version(),
    };
    let packages_dir = cli.root.clone().unwrap_or_else(|| configured.packages_dir());
    let host = StandaloneHost::new(packages_dir, data_dir, platform_version);

    let client = match config.credentials() {
        Some((user, token)) => GitHubClient::new().with_credentials(user, token),
        None => GitHubClient::new(),
    };

    if cli.force {
        config.last_update_check = None;
    }

    let driver =
        UpdateDriver::new(&client, &host.data_dir()).with_platform_version(host.platform_version());
    let report = driver.run(&host.packages_dir(), &mut config, chrono::Local::now());

    if let Err(e) = storage.save(&config) {
        warn!("[MAIN] Failed to save {}: {}", storage.path().display(), e);
    }

    let pending = PendingUpdates::from_report(&report);
    if let Err(e) = pending.save(&PendingUpdates::path(&host.data_dir())) {
        warn!("[MAIN] Failed to write pending updates: {}", e);
    }

    let program = env::current_exe().unwrap_or_else(|_| PathBuf::from("modupdater"));
    let hook = LoaderHook::new(pending, &config, program);
    match (hook.restart_notice(), report.next_check_in) {
        (Some(notice), _) => warn!("[MAIN] {}", notice),
        (None, Some(wait)) => println!("Next update check in {} minutes.", wait.num_minutes()),
        (None, None) => println!("{}", report.summary()),
    }

    ExitCode::SUCCESS
}
