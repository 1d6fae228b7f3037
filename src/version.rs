//! Semantic version comparison.
//!
//! Thin layer over [`semver`] that accepts the looser version strings found
//! in package manifests: a leading `v`, and missing minor or patch numbers.

use semver::Version;

use crate::error::UpdateError;

/// Parses a version string.
///
/// `1.2` is read as `1.2.0` and `v1.2.3-beta` as `1.2.3-beta`.
pub fn parse_version(input: &str) -> Result<Version, UpdateError> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    // Split off prerelease/build suffix before padding the numeric core
    let core_end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(core_end);
    let parts: Vec<&str> = core.split('.').collect();

    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(UpdateError::InvalidVersion(input.to_string()));
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|_| UpdateError::InvalidVersion(input.to_string()))
}

/// Returns true if `a` has higher precedence than `b`.
#[must_use]
pub fn is_newer(a: &Version, b: &Version) -> bool {
    a.cmp_precedence(b).is_gt()
}

/// Returns true if `a` parses and is newer than `b`.
///
/// An unparsable string on either side never counts as newer.
#[must_use]
pub fn is_newer_str(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Ok(a), Ok(b)) => is_newer(&a, &b),
        _ => false,
    }
}

/// Returns true if the version carries a prerelease tag.
#[must_use]
pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}
