//! Package manifests.
//!
//! Parses the `manifest.json` file that describes each installed package,
//! including the optional update block the package author supplies.

mod scan;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::trace;

use crate::config::TrustedSource;
use crate::error::UpdateError;

pub use scan::{MANIFEST_FILE_NAME, find_by_id, is_manifest_file, scan_packages};

/// Placeholder in a file selector that is replaced by the package folder.
pub const FOLDER_PLACEHOLDER: &str = "{PackageFolder}";

/// Older spelling of [`FOLDER_PLACEHOLDER`], still found in published manifests.
pub const LEGACY_FOLDER_PLACEHOLDER: &str = "{ModFolder}";

/// Selector used when a manifest names a repository but no pattern.
pub const DEFAULT_FILE_SELECTOR: &str = r"{PackageFolder}-(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)";

/// Metadata manifest of an installed package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageManifest {
    /// Identifier, unique within one scan.
    #[serde(rename = "UniqueID")]
    pub unique_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Author name.
    #[serde(default)]
    pub author: String,
    /// Installed semantic version.
    #[serde(default)]
    pub version: String,
    /// Lowest host platform version the package runs on.
    #[serde(
        default,
        alias = "MinimumApiVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_platform_version: Option<String>,
    /// Entry point file name (e.g. `Package.dll`).
    #[serde(default, alias = "EntryDll", skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Where and how to look for updates.
    #[serde(default, alias = "ModUpdater")]
    pub update_info: UpdateInfo,
}

impl PackageManifest {
    /// Returns the display label used in log lines.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.unique_id
        } else {
            &self.name
        }
    }

    /// Returns the entry point without its extension, if declared.
    #[must_use]
    pub fn entry_stem(&self) -> Option<String> {
        self.entry_point
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .and_then(|e| Path::new(e).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
    }
}

/// Update source declared by a package author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UpdateInfo {
    /// GitHub user or organization.
    #[serde(alias = "User")]
    pub repository_owner: String,
    /// GitHub repository name.
    #[serde(alias = "Repository")]
    pub repository_name: String,
    /// Directory inside the repository holding release archives.
    #[serde(alias = "Directory")]
    pub repository_subfolder: String,
    /// Folder name substituted for the selector placeholder.
    #[serde(alias = "ModFolder")]
    pub package_folder: String,
    /// Pattern with one capture group for the version token.
    #[serde(alias = "FileSelector")]
    pub file_selector_pattern: String,
    /// Install the first matching artifact regardless of version or throttle.
    pub install: bool,
    /// File names never overwritten when they already exist.
    #[serde(deserialize_with = "null_as_empty")]
    pub do_not_replace: Vec<String>,
    /// Files removed from the package before extraction.
    #[serde(deserialize_with = "null_as_empty")]
    pub delete_files: Vec<String>,
    /// Folders removed from the package before extraction.
    #[serde(deserialize_with = "null_as_empty")]
    pub delete_folders: Vec<String>,
}

/// Reads a list where authors sometimes write `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl UpdateInfo {
    /// Returns true if a repository is declared.
    #[must_use]
    pub fn has_repository(&self) -> bool {
        !self.repository_owner.trim().is_empty() && !self.repository_name.trim().is_empty()
    }

    /// Builds the update block for a package published by a trusted author.
    #[must_use]
    pub fn from_trusted(source: &TrustedSource, package_folder: String) -> Self {
        Self {
            repository_owner: source.owner.clone(),
            repository_name: source.repository.clone(),
            repository_subfolder: source.subfolder.clone(),
            package_folder,
            file_selector_pattern: source.file_selector.clone(),
            ..Self::default()
        }
    }

    /// Returns true if `file_name` is protected from overwrite.
    #[must_use]
    pub fn protects(&self, file_name: &str) -> bool {
        self.do_not_replace.iter().any(|n| n == file_name)
    }
}

/// A package found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    /// Parsed manifest.
    pub manifest: PackageManifest,
    /// Directory containing the manifest.
    pub dir: PathBuf,
}

impl LocalPackage {
    /// Fills in the derived parts of the update block.
    ///
    /// Derives the package folder from the entry point (or the directory
    /// name), and synthesizes an update block for trusted authors that did
    /// not declare one. Returns false if the package has no update source.
    pub fn resolve_update_info(&mut self, trusted: &[TrustedSource]) -> bool {
        let entry_stem = self.manifest.entry_stem();

        if !self.manifest.update_info.has_repository() {
            let Some(stem) = entry_stem.clone() else {
                trace!(
                    "[SCAN] [{}] No update source declared",
                    self.manifest.unique_id
                );
                return false;
            };

            let Some(source) = trusted.iter().find(|t| t.author == self.manifest.author) else {
                trace!(
                    "[SCAN] [{}] No update source declared",
                    self.manifest.unique_id
                );
                return false;
            };

            let info = UpdateInfo::from_trusted(source, stem);
            if !info.has_repository() {
                trace!(
                    "[SCAN] [{}] Trusted source for {} has no repository",
                    self.manifest.unique_id,
                    source.author
                );
                return false;
            }
            self.manifest.update_info = info;
        }

        let info = &mut self.manifest.update_info;
        if info.package_folder.trim().is_empty() {
            info.package_folder = entry_stem.unwrap_or_else(|| {
                self.dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
        }
        if info.file_selector_pattern.trim().is_empty() {
            info.file_selector_pattern = DEFAULT_FILE_SELECTOR.to_string();
        }

        true
    }
}

/// Parses manifest JSON. A leading byte-order mark is ignored.
pub fn parse_manifest(content: &str, path: &Path) -> Result<PackageManifest, UpdateError> {
    let content = content.trim_start_matches('\u{feff}');
    serde_json::from_str(content).map_err(|source| UpdateError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a manifest file.
pub fn load_manifest(path: &Path) -> Result<PackageManifest, UpdateError> {
    let content = fs::read_to_string(path)?;
    parse_manifest(&content, path)
}
