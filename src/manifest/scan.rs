//! Manifest discovery.
//!
//! Walks the packages directory and loads every `manifest.json`, skipping
//! disabled folders (any folder whose name starts with `.`) and packages
//! excluded by configuration.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;

use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

use super::{LocalPackage, load_manifest};

/// File name of a package manifest (matched case-insensitively).
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Prefix that marks a folder as disabled.
const DISABLED_MARKER: char = '.';

/// Returns true if `name` is a manifest file name.
#[must_use]
pub fn is_manifest_file(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.eq_ignore_ascii_case(MANIFEST_FILE_NAME))
}

/// Returns true if a directory below the root is disabled.
fn is_disabled_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(DISABLED_MARKER))
}

/// Finds and parses all package manifests under `root`.
///
/// A manifest that fails to parse is logged and skipped; it never aborts the
/// scan. Packages are returned in path order.
pub fn scan_packages(root: &Path, exclude: &BTreeSet<String>) -> Vec<LocalPackage> {
    let mut packages = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_disabled_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("[SCAN] Skipping unreadable path: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_manifest_file(entry.file_name()) {
            continue;
        }

        let Some(dir) = entry.path().parent() else {
            continue;
        };

        let manifest = match load_manifest(entry.path()) {
            Ok(m) => m,
            Err(e) => {
                warn!("[SCAN] Could not read {}: {}", entry.path().display(), e);
                continue;
            }
        };

        if exclude.contains(&manifest.unique_id) {
            debug!("[SCAN] [{}] Excluded by configuration", manifest.unique_id);
            continue;
        }

        trace!(
            "[SCAN] Found {} {} in {}",
            manifest.unique_id,
            manifest.version,
            dir.display()
        );

        packages.push(LocalPackage {
            manifest,
            dir: dir.to_path_buf(),
        });
    }

    debug!("[SCAN] {} package(s) under {}", packages.len(), root.display());
    packages
}

/// Looks up a package by unique ID. With duplicates, the later one wins.
#[must_use]
pub fn find_by_id<'a>(packages: &'a [LocalPackage], unique_id: &str) -> Option<&'a LocalPackage> {
    packages
        .iter()
        .rev()
        .find(|p| p.manifest.unique_id == unique_id)
}
