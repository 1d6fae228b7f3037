//! Remote repository access.
//!
//! The updater only needs three things from the hosting service: resolve a
//! repository, list one of its directories, and download a file. Those are
//! the [`RepositoryProvider`] trait; [`GitHubClient`] implements it against
//! the GitHub REST API.

mod cache;
mod github;

use std::path::Path;

use crate::error::{RemoteError, UpdateError};

pub use cache::{CacheKey, RepositoryCache};
pub use github::{GitHubClient, GITHUB_API_URL};

/// A resolved remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    /// Numeric repository ID.
    pub id: u64,
    /// Owner login.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// Raw download URL (files only).
    pub download_url: Option<String>,
}

impl ListingEntry {
    /// Creates a file entry.
    #[must_use]
    pub fn file(path: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            download_url: Some(download_url.into()),
        }
    }

    /// Returns the last path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Returns the file name without its extension.
    #[must_use]
    pub fn base_name(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }
}

/// Hosting service operations used by the updater.
pub trait RepositoryProvider {
    /// Resolves `owner/name` to a repository.
    fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryHandle, RemoteError>;

    /// Lists the files in `subfolder` (empty for the repository root).
    fn get_directory_listing(
        &self,
        repository: &RepositoryHandle,
        subfolder: &str,
    ) -> Result<Vec<ListingEntry>, RemoteError>;

    /// Downloads `url` into the file at `dest`, replacing it.
    fn download(&self, url: &str, dest: &Path) -> Result<(), UpdateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_entry_names() {
        let entry = ListingEntry::file("_releases/Fancy [CP]-1.2.0.zip", "https://x/y.zip");
        assert_eq!(entry.file_name(), "Fancy [CP]-1.2.0.zip");
        assert_eq!(entry.base_name(), "Fancy [CP]-1.2.0");

        let entry = ListingEntry::file("Package-1.0.0.tar.gz", "u");
        assert_eq!(entry.base_name(), "Package-1.0.0.tar");

        let entry = ListingEntry::file(".hidden", "u");
        assert_eq!(entry.base_name(), ".hidden");
    }
}
