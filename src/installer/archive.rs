//! Release archive handling.
//!
//! Release archives wrap the package in one top-level folder, which is
//! stripped on extraction: `Pkg/assets/a.png` lands at `<package>/assets/a.png`.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, trace, warn};
use zip::ZipArchive;

use crate::error::UpdateError;
use crate::manifest::{PackageManifest, UpdateInfo, is_manifest_file, parse_manifest};

/// Opened release archive.
pub struct ReleaseArchive {
    path: PathBuf,
    zip: ZipArchive<File>,
}

/// Why extraction stopped part way.
#[derive(Debug)]
pub struct ExtractFailure {
    /// Entries written before the failure.
    pub extracted: usize,
    /// Filesystem error that stopped extraction.
    pub source: io::Error,
}

impl ReleaseArchive {
    /// Opens the zip archive at `path`.
    pub fn open(path: &Path) -> Result<Self, UpdateError> {
        let file = File::open(path)?;
        let zip = ZipArchive::new(file)?;
        Ok(Self {
            path: path.to_path_buf(),
            zip,
        })
    }

    /// Path of the archive file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the package manifest at the top level of the archive.
    ///
    /// Returns `None` if there is none or it does not parse.
    pub fn embedded_manifest(&mut self) -> Result<Option<PackageManifest>, UpdateError> {
        for i in 0..self.zip.len() {
            let mut entry = self.zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            let Some(relative) = entry.enclosed_name().and_then(|p| relative_target(&p, false))
            else {
                continue;
            };

            if relative.components().count() != 1 || !is_manifest_file(relative.as_os_str()) {
                continue;
            }

            let mut content = String::new();
            if let Err(e) = entry.read_to_string(&mut content) {
                trace!("[ARCHIVE] Unreadable manifest in {}: {}", self.path.display(), e);
                return Ok(None);
            }

            return match parse_manifest(&content, Path::new(entry.name())) {
                Ok(manifest) => Ok(Some(manifest)),
                Err(e) => {
                    trace!("[ARCHIVE] {}", e);
                    Ok(None)
                }
            };
        }

        Ok(None)
    }

    /// Extracts every entry into `dest`, overwriting existing files.
    ///
    /// Existing files whose name `rules` protects are left untouched.
    /// Extraction stops at the first filesystem error; entries written
    /// before it stay in place.
    pub fn extract_into(
        &mut self,
        dest: &Path,
        rules: &UpdateInfo,
        label: &str,
    ) -> Result<Result<usize, ExtractFailure>, UpdateError> {
        let mut extracted = 0;

        for i in 0..self.zip.len() {
            let mut entry = self.zip.by_index(i)?;
            let is_dir = entry.is_dir();

            let Some(enclosed) = entry.enclosed_name() else {
                warn!("[ARCHIVE] [{}] Skipping unsafe entry: {}", label, entry.name());
                continue;
            };
            let Some(relative) = relative_target(&enclosed, is_dir) else {
                continue;
            };
            let target = dest.join(&relative);

            if is_dir {
                if let Err(source) = fs::create_dir_all(&target) {
                    return Ok(Err(ExtractFailure { extracted, source }));
                }
                continue;
            }

            let protected = target
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| rules.protects(n));
            if protected && target.exists() {
                debug!("[ARCHIVE] [{}] Keeping {}", label, target.display());
                continue;
            }

            info!("[ARCHIVE] [{}] Updating file: {}", label, target.display());
            if let Err(source) = write_entry(&mut entry, &target) {
                return Ok(Err(ExtractFailure { extracted, source }));
            }
            extracted += 1;
        }

        Ok(Ok(extracted))
    }
}

fn write_entry(entry: &mut impl Read, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(target)?;
    io::copy(entry, &mut out)?;
    Ok(())
}

/// Maps an archive path to its place inside the package folder.
///
/// The first segment is the wrapper folder and is dropped when the entry
/// has more than one segment. The wrapper folder entry itself maps to
/// nothing.
fn relative_target(enclosed: &Path, is_dir: bool) -> Option<PathBuf> {
    let segments: Vec<_> = enclosed
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();

    match segments.len() {
        0 => None,
        1 if is_dir => None,
        1 => Some(segments.iter().collect()),
        _ => Some(segments[1..].iter().collect()),
    }
}

/// Joins a manifest-supplied relative path onto `base`.
///
/// Returns `None` for absolute paths or paths that climb out of `base`.
#[must_use]
pub fn safe_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let normalized = relative.replace('\\', "/");
    let mut joined = base.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (depth > 0).then_some(joined)
}

/// Applies `DeleteFiles` and `DeleteFolders` to the package folder.
///
/// Best effort: missing paths are ignored, failures are logged.
pub fn apply_delete_directives(dest: &Path, rules: &UpdateInfo, label: &str) {
    for file in &rules.delete_files {
        let Some(path) = safe_join(dest, file) else {
            warn!("[ARCHIVE] [{}] Refusing to delete outside the package: {}", label, file);
            continue;
        };
        if path.is_file() {
            info!("[ARCHIVE] [{}] Deleting file: {}", label, file);
            if let Err(e) = fs::remove_file(&path) {
                warn!("[ARCHIVE] [{}] Could not delete {}: {}", label, path.display(), e);
            }
        }
    }

    for folder in &rules.delete_folders {
        let Some(path) = safe_join(dest, folder) else {
            warn!("[ARCHIVE] [{}] Refusing to delete outside the package: {}", label, folder);
            continue;
        };
        if path.is_dir() {
            info!("[ARCHIVE] [{}] Deleting folder: {}", label, folder);
            if let Err(e) = fs::remove_dir_all(&path) {
                warn!("[ARCHIVE] [{}] Could not delete {}: {}", label, path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("release.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(relative_target(Path::new("Pkg/a.txt"), false), Some(PathBuf::from("a.txt")));
        assert_eq!(
            relative_target(Path::new("Pkg/assets/b.png"), false),
            Some(PathBuf::from("assets/b.png"))
        );
        assert_eq!(relative_target(Path::new("Pkg"), true), None);
        assert_eq!(relative_target(Path::new("loose.txt"), false), Some(PathBuf::from("loose.txt")));
    }

    #[test]
    fn test_safe_join() {
        let base = Path::new("/mods/Pkg");
        assert_eq!(safe_join(base, "old/x.dll"), Some(base.join("old").join("x.dll")));
        assert_eq!(safe_join(base, "old\\x.dll"), Some(base.join("old").join("x.dll")));
        assert_eq!(safe_join(base, "../Other"), None);
        assert_eq!(safe_join(base, "/etc/passwd"), None);
        assert_eq!(safe_join(base, "."), None);
        assert_eq!(safe_join(base, ""), None);
    }

    #[test]
    fn test_embedded_manifest() {
        let dir = TempDir::new().unwrap();
        let path = build_zip(
            dir.path(),
            &[
                ("Pkg/", ""),
                ("Pkg/assets/manifest.json", "{\"UniqueID\": \"nested\"}"),
                ("Pkg/Manifest.JSON", "{\"UniqueID\": \"a.pkg\", \"Version\": \"1.1.0\"}"),
            ],
        );

        let mut archive = ReleaseArchive::open(&path).unwrap();
        let manifest = archive.embedded_manifest().unwrap().unwrap();
        assert_eq!(manifest.unique_id, "a.pkg");
    }

    #[test]
    fn test_embedded_manifest_missing_or_broken() {
        let dir = TempDir::new().unwrap();
        let path = build_zip(dir.path(), &[("Pkg/readme.txt", "hi")]);
        assert!(ReleaseArchive::open(&path).unwrap().embedded_manifest().unwrap().is_none());

        let broken = TempDir::new().unwrap();
        let path = build_zip(broken.path(), &[("Pkg/manifest.json", "{ not json")]);
        assert!(ReleaseArchive::open(&path).unwrap().embedded_manifest().unwrap().is_none());
    }

    #[test]
    fn test_extract_strips_wrapper_and_protects() {
        let dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(dest.path().join("config.json"), "local").unwrap();

        let path = build_zip(
            dir.path(),
            &[
                ("Pkg/", ""),
                ("Pkg/config.json", "remote"),
                ("Pkg/settings.json", "fresh"),
                ("Pkg/assets/", ""),
                ("Pkg/assets/a.png", "png"),
            ],
        );
        let rules = UpdateInfo {
            do_not_replace: vec!["config.json".to_string(), "settings.json".to_string()],
            ..UpdateInfo::default()
        };

        let mut archive = ReleaseArchive::open(&path).unwrap();
        let extracted = archive.extract_into(dest.path(), &rules, "a.pkg").unwrap().unwrap();

        assert_eq!(extracted, 2);
        assert_eq!(fs::read_to_string(dest.path().join("config.json")).unwrap(), "local");
        // Protection only applies to files that already exist
        assert_eq!(fs::read_to_string(dest.path().join("settings.json")).unwrap(), "fresh");
        assert_eq!(fs::read_to_string(dest.path().join("assets/a.png")).unwrap(), "png");
        assert!(!dest.path().join("Pkg").exists());
    }

    #[test]
    fn test_extract_stops_at_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::create_dir_all(dest.path().join("blocked.txt")).unwrap();

        let path = build_zip(
            dir.path(),
            &[("Pkg/first.txt", "1"), ("Pkg/blocked.txt", "2"), ("Pkg/last.txt", "3")],
        );

        let mut archive = ReleaseArchive::open(&path).unwrap();
        let failure = archive
            .extract_into(dest.path(), &UpdateInfo::default(), "a.pkg")
            .unwrap()
            .unwrap_err();

        assert_eq!(failure.extracted, 1);
        assert!(dest.path().join("first.txt").is_file());
        assert!(!dest.path().join("last.txt").exists());
    }

    #[test]
    fn test_delete_directives() {
        let dest = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(dest.path().join("old.dll"), "x").unwrap();
        fs::create_dir_all(dest.path().join("legacy/sub")).unwrap();
        fs::write(outside.path().join("keep.txt"), "x").unwrap();

        let escape = format!("../{}/keep.txt", outside.path().file_name().unwrap().to_string_lossy());
        let rules = UpdateInfo {
            delete_files: vec!["old.dll".to_string(), "missing.dll".to_string(), escape],
            delete_folders: vec!["legacy".to_string()],
            ..UpdateInfo::default()
        };

        apply_delete_directives(dest.path(), &rules, "a.pkg");

        assert!(!dest.path().join("old.dll").exists());
        assert!(!dest.path().join("legacy").exists());
        assert!(outside.path().join("keep.txt").exists());
    }
}
