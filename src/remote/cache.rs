//! Per-run cache of repository listings.
//!
//! Several packages usually live in the same repository folder, so each
//! listing is fetched once per run. There is no expiry: the cache belongs
//! to a single run and is dropped with it.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::{ListingEntry, RepositoryProvider};
use crate::error::RemoteError;
use crate::manifest::UpdateInfo;

/// Identifies one remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Directory inside the repository.
    pub subfolder: String,
}

impl CacheKey {
    /// Builds the key for a package's update source.
    #[must_use]
    pub fn for_update(info: &UpdateInfo) -> Self {
        Self {
            owner: info.repository_owner.clone(),
            repository: info.repository_name.clone(),
            subfolder: info.repository_subfolder.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}>{}", self.owner, self.repository, self.subfolder)
    }
}

/// Listing cache scoped to one update run.
#[derive(Debug, Default)]
pub struct RepositoryCache {
    listings: HashMap<CacheKey, Vec<ListingEntry>>,
}

impl RepositoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached listing for `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<&[ListingEntry]> {
        self.listings.get(key).map(Vec::as_slice)
    }

    /// Stores a listing.
    pub fn put(&mut self, key: CacheKey, entries: Vec<ListingEntry>) {
        self.listings.insert(key, entries);
    }

    /// Returns the listing for `key`, fetching it on first use.
    pub fn get_or_fetch(
        &mut self,
        key: &CacheKey,
        provider: &dyn RepositoryProvider,
    ) -> Result<&[ListingEntry], RemoteError> {
        if !self.listings.contains_key(key) {
            let repository = provider.get_repository(&key.owner, &key.repository)?;
            let entries = provider.get_directory_listing(&repository, &key.subfolder)?;
            debug!("[CACHE] Cached {} entries for {}", entries.len(), key);
            self.put(key.clone(), entries);
        }

        Ok(self.get(key).unwrap_or(&[]))
    }

    /// Number of cached listings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}
