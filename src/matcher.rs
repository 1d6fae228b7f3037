//! Release artifact matching.
//!
//! A package's file selector is a regular expression with a folder
//! placeholder and one capture group for the version token. The matcher
//! turns it into a [`Regex`], runs it over a repository listing and decides
//! which candidates are worth installing.

use regex::{Regex, RegexBuilder};
use semver::Version;
use tracing::{debug, trace};

use crate::manifest::{FOLDER_PLACEHOLDER, LEGACY_FOLDER_PLACEHOLDER, UpdateInfo};
use crate::remote::ListingEntry;
use crate::version::{is_newer, is_prerelease, parse_version};

/// Capture groups a usable selector has: the whole match plus the version.
const SELECTOR_GROUPS: usize = 2;

/// A listing entry whose name matched the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    /// Matched listing entry.
    pub entry: ListingEntry,
    /// Version text captured from the file name.
    pub version_token: String,
    /// Parsed version, if the token is a valid version.
    pub version: Option<Version>,
}

/// What a run allows for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Install regardless of version and throttle.
    pub force_install: bool,
    /// The throttle allows a version check this run.
    pub may_check: bool,
    /// Prerelease versions may be installed.
    pub allow_prereleases: bool,
}

impl SelectionPolicy {
    /// Returns true if a candidate with `version` should be installed over
    /// `installed`.
    #[must_use]
    pub fn accepts(&self, version: &Version, installed: Option<&Version>) -> bool {
        if is_prerelease(version) && !self.allow_prereleases {
            return false;
        }

        if self.force_install {
            return true;
        }

        self.may_check && installed.is_some_and(|current| is_newer(version, current))
    }
}

/// Substitutes the package folder into `pattern` and compiles it.
///
/// The folder is escaped, so names like `Fancy [CP]` match literally.
pub fn build_selector(pattern: &str, package_folder: &str) -> Result<Regex, regex::Error> {
    let folder = regex::escape(package_folder);
    let source = pattern
        .replace(FOLDER_PLACEHOLDER, &folder)
        .replace(LEGACY_FOLDER_PLACEHOLDER, &folder);

    RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

/// Finds all listing entries matching `selector`, in listing order.
///
/// Selectors without exactly one capture group never match.
#[must_use]
pub fn find_candidates(selector: &Regex, listing: &[ListingEntry]) -> Vec<ReleaseCandidate> {
    if selector.captures_len() != SELECTOR_GROUPS {
        debug!(
            "[MATCH] Selector '{}' has {} capture groups, expected one",
            selector.as_str(),
            selector.captures_len() - 1
        );
        return Vec::new();
    }

    listing
        .iter()
        .filter_map(|entry| {
            let captures = selector.captures(entry.base_name())?;
            let token = captures.get(1)?.as_str().to_string();
            Some(ReleaseCandidate {
                entry: entry.clone(),
                version: parse_version(&token).ok(),
                version_token: token,
            })
        })
        .collect()
}

/// Returns the candidates `policy` accepts over `installed`, in listing order.
#[must_use]
pub fn accepted_candidates(
    candidates: Vec<ReleaseCandidate>,
    installed: Option<&Version>,
    policy: SelectionPolicy,
) -> Vec<ReleaseCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| match &candidate.version {
            Some(version) => policy.accepts(version, installed),
            None => {
                trace!(
                    "[MATCH] Ignoring {}: '{}' is not a version",
                    candidate.entry.path,
                    candidate.version_token
                );
                false
            }
        })
        .collect()
}

/// Returns the first accepted candidate.
#[must_use]
pub fn select_candidate(
    candidates: Vec<ReleaseCandidate>,
    installed: Option<&Version>,
    policy: SelectionPolicy,
) -> Option<ReleaseCandidate> {
    accepted_candidates(candidates, installed, policy)
        .into_iter()
        .next()
}

/// Builds the selector for `info` and returns its accepted candidates.
///
/// A selector that does not compile yields no candidates.
#[must_use]
pub fn match_release(
    info: &UpdateInfo,
    listing: &[ListingEntry],
    installed: Option<&Version>,
    policy: SelectionPolicy,
) -> Vec<ReleaseCandidate> {
    let selector = match build_selector(&info.file_selector_pattern, &info.package_folder) {
        Ok(selector) => selector,
        Err(e) => {
            debug!(
                "[MATCH] Invalid selector '{}': {}",
                info.file_selector_pattern, e
            );
            return Vec::new();
        }
    };

    let candidates = find_candidates(&selector, listing);
    if candidates.is_empty() {
        trace!("[MATCH] File not found: {}", selector.as_str());
    }

    accepted_candidates(candidates, installed, policy)
}
