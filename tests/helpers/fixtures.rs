//! Package trees, release archives and an offline repository provider.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use modupdater::error::{RemoteError, UpdateError};
use modupdater::remote::{ListingEntry, RepositoryHandle, RepositoryProvider};
use serde_json::{Value, json};
use zip::write::SimpleFileOptions;

/// Repository every fixture package points at.
pub const OWNER: &str = "someone";
pub const REPO: &str = "packages";
pub const SUBFOLDER: &str = "_releases";

/// Builds a zip archive in memory. Names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
        } else {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Manifest JSON for a package updated from the fixture repository.
pub fn manifest_json(id: &str, version: &str, entry_point: &str) -> Value {
    json!({
        "UniqueID": id,
        "Name": id,
        "Author": "Someone",
        "Version": version,
        "EntryPoint": entry_point,
        "UpdateInfo": {
            "RepositoryOwner": OWNER,
            "RepositoryName": REPO,
            "RepositorySubfolder": SUBFOLDER
        }
    })
}

/// Writes `manifest` into `root/<folder>/manifest.json` and returns the folder.
pub fn write_package(root: &Path, folder: &str, manifest: &Value) -> PathBuf {
    let dir = root.join(folder);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("manifest.json"), serde_json::to_string_pretty(manifest).unwrap()).unwrap();
    dir
}

/// Offline provider serving one listing per (owner, repository, subfolder).
#[derive(Default)]
pub struct FakeProvider {
    listings: HashMap<(String, String, String), Vec<ListingEntry>>,
    artifacts: HashMap<String, Vec<u8>>,
    rate_limited: Vec<String>,
    /// Number of provider calls of any kind.
    pub calls: Cell<usize>,
    /// Number of `get_repository` calls.
    pub repository_calls: Cell<usize>,
    /// URLs downloaded, in order.
    pub downloads: RefCell<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `file_name` with `bytes` in the fixture repository.
    pub fn publish(&mut self, file_name: &str, bytes: Vec<u8>) {
        self.publish_in(OWNER, REPO, SUBFOLDER, file_name, bytes);
    }

    /// Publishes a file in an arbitrary repository folder.
    pub fn publish_in(&mut self, owner: &str, repo: &str, subfolder: &str, file_name: &str, bytes: Vec<u8>) {
        let url = format!("https://dl.test/{}/{}/{}/{}", owner, repo, subfolder, file_name);
        self.listings
            .entry((owner.to_string(), repo.to_string(), subfolder.to_string()))
            .or_default()
            .push(ListingEntry::file(format!("{}/{}", subfolder, file_name), url.clone()));
        self.artifacts.insert(url, bytes);
    }

    /// Makes every request for `repo` fail with a rate-limit error.
    pub fn rate_limit(&mut self, repo: &str) {
        self.rate_limited.push(repo.to_string());
    }

    fn count(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl RepositoryProvider for FakeProvider {
    fn get_repository(&self, owner: &str, name: &str) -> Result<RepositoryHandle, RemoteError> {
        self.count();
        self.repository_calls.set(self.repository_calls.get() + 1);

        if self.rate_limited.iter().any(|r| r == name) {
            return Err(RemoteError::RateLimitExceeded { limit: 60 });
        }
        if !self.listings.keys().any(|(o, r, _)| o == owner && r == name) {
            return Err(RemoteError::NotFound(format!("{}/{}", owner, name)));
        }

        Ok(RepositoryHandle {
            id: 7,
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    fn get_directory_listing(
        &self,
        repository: &RepositoryHandle,
        subfolder: &str,
    ) -> Result<Vec<ListingEntry>, RemoteError> {
        self.count();
        let key = (
            repository.owner.clone(),
            repository.name.clone(),
            subfolder.to_string(),
        );
        self.listings
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(subfolder.to_string()))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), UpdateError> {
        self.count();
        self.downloads.borrow_mut().push(url.to_string());
        let bytes = self
            .artifacts
            .get(url)
            .ok_or_else(|| RemoteError::NotFound(url.to_string()))?;
        fs::write(dest, bytes)?;
        Ok(())
    }
}
