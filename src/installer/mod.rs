//! Artifact download and installation.
//!
//! Downloads a matched release into the scratch area, checks the manifest
//! embedded in it, and merges the archive into the package folder.

mod archive;
mod scratch;

use std::path::{Path, PathBuf};

use semver::Version;
use tracing::{debug, error, info, trace, warn};

use crate::error::{RemoteError, UpdateError};
use crate::manifest::{LocalPackage, PackageManifest};
use crate::matcher::ReleaseCandidate;
use crate::remote::RepositoryProvider;
use crate::version::parse_version;

pub use archive::{ExtractFailure, ReleaseArchive, apply_delete_directives, safe_join};
pub use scratch::ScratchArea;

/// Result of installing one release artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Archive merged; carries the manifest shipped with the release.
    Installed(PackageManifest),
    /// Archive has no readable package manifest.
    NotAnUpdate,
    /// Release needs a newer host platform.
    Incompatible {
        /// Package the release belongs to.
        unique_id: String,
        /// Minimum platform version it declares.
        required: String,
    },
    /// Merge failed; the artifact was copied for manual installation.
    ManualFallback {
        /// Where the artifact copy was placed.
        manual_path: PathBuf,
        /// Filesystem error that stopped the merge.
        reason: String,
    },
}

impl InstallOutcome {
    /// Number of installs this outcome counts as.
    #[must_use]
    pub fn installs(&self) -> u32 {
        u32::from(matches!(self, Self::Installed(_)))
    }
}

/// Installs release artifacts into package folders.
pub struct Installer<'a> {
    provider: &'a dyn RepositoryProvider,
    platform_version: Option<&'a Version>,
}

impl<'a> Installer<'a> {
    /// Creates an installer. `platform_version` is the running host version;
    /// `None` skips compatibility checks.
    #[must_use]
    pub fn new(provider: &'a dyn RepositoryProvider, platform_version: Option<&'a Version>) -> Self {
        Self {
            provider,
            platform_version,
        }
    }

    /// Downloads `candidate` and installs it over `package`.
    pub fn install(
        &self,
        package: &LocalPackage,
        candidate: &ReleaseCandidate,
        scratch: &ScratchArea,
    ) -> Result<InstallOutcome, UpdateError> {
        let url = candidate
            .entry
            .download_url
            .as_deref()
            .ok_or_else(|| RemoteError::NotFound(candidate.entry.path.clone()))?;

        let artifact = scratch.artifact_path(candidate.entry.file_name())?;
        self.provider.download(url, &artifact)?;

        let outcome = self.apply(package, &artifact, scratch)?;
        if let InstallOutcome::Installed(_) = outcome {
            info!(
                "[INSTALL] [{}] {} was successfully updated to version {}",
                package.manifest.unique_id,
                package.manifest.label(),
                candidate.version_token
            );
        }
        Ok(outcome)
    }

    /// Installs an already downloaded artifact over `package`.
    pub fn apply(
        &self,
        package: &LocalPackage,
        artifact: &Path,
        scratch: &ScratchArea,
    ) -> Result<InstallOutcome, UpdateError> {
        let id = package.manifest.unique_id.as_str();
        let mut archive = ReleaseArchive::open(artifact)?;

        let Some(embedded) = archive.embedded_manifest()? else {
            trace!("[INSTALL] [{}] {} has no manifest", id, artifact.display());
            return Ok(InstallOutcome::NotAnUpdate);
        };

        if let Some(required) = self.unmet_requirement(&embedded) {
            error!(
                "[INSTALL] [{}] Could not update to version {}. Needs at least platform version {}",
                embedded.unique_id, embedded.version, required
            );
            return Ok(InstallOutcome::Incompatible {
                unique_id: embedded.unique_id,
                required,
            });
        }

        let rules = &embedded.update_info;
        apply_delete_directives(&package.dir, rules, id);

        match archive.extract_into(&package.dir, rules, id)? {
            Ok(extracted) => {
                debug!("[INSTALL] [{}] Extracted {} files", id, extracted);
                Ok(InstallOutcome::Installed(embedded))
            }
            Err(failure) => {
                let file_name = artifact
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let manual_path = scratch.keep_for_manual(archive.path())?;

                warn!(
                    "[INSTALL] [{}] Updating {} failed. Please try again later or do it manually",
                    id, file_name
                );
                warn!(
                    "[INSTALL] [{}] The update files were moved to '{}'",
                    id,
                    scratch.manual_dir().display()
                );
                warn!("[INSTALL] [{}] Caused by: {}", id, failure.source);

                Ok(InstallOutcome::ManualFallback {
                    manual_path,
                    reason: failure.source.to_string(),
                })
            }
        }
    }

    /// Returns the required platform version if the host is too old.
    fn unmet_requirement(&self, embedded: &PackageManifest) -> Option<String> {
        let required = embedded.minimum_platform_version.as_deref()?;
        let Ok(required_version) = parse_version(required) else {
            debug!(
                "[INSTALL] [{}] Ignoring unparsable minimum version '{}'",
                embedded.unique_id, required
            );
            return None;
        };

        let Some(platform) = self.platform_version else {
            debug!(
                "[INSTALL] [{}] Platform version unknown, skipping compatibility check",
                embedded.unique_id
            );
            return None;
        };

        (*platform < required_version).then(|| required.to_string())
    }
}
