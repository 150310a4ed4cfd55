//! Version resolution against a vendor catalog.
//!
//! Catalogs are plain lists of version strings whose positions line up with
//! out-of-band metadata (download URL, checksum) kept by the plugin. The
//! resolver therefore always reports the *original* index of the match, never
//! the index into its internal sorted copy.
//!
//! ## Example
//!
//! ```rust,ignore
//! let (version, index) = find_version("20.0", &["v20.0.1", "v20.0.2"])?;
//! assert_eq!(version.as_str(), "v20.0.2");
//! assert_eq!(index, 1);
//! ```

use std::cmp::Ordering;

use tracing::debug;

use crate::errors::{Result, ToolmanError};
use crate::software::version::Version;

/// Finds the newest catalog entry satisfying `query`.
///
/// Every candidate is parsed first, so a single malformed catalog entry fails
/// the whole call. Candidates are then ordered newest first with a stable
/// sort and the first one the query matches wins; duplicates therefore
/// resolve to their first occurrence.
///
/// # Returns
///
/// The matched version and its index in `candidates`.
///
/// # Errors
///
/// Returns `ToolmanError::Parse` if the query or any candidate cannot be
/// parsed, or `ToolmanError::NotFound` if nothing matches.
pub fn find_version<S: AsRef<str>>(query: &str, candidates: &[S]) -> Result<(Version, usize)> {
    let mut parsed = candidates
        .iter()
        .enumerate()
        .map(|(index, text)| Version::parse(text.as_ref()).map(|version| (version, index)))
        .collect::<Result<Vec<_>>>()?;

    parsed.sort_by(|(a, _), (b, _)| newest_first(a, b));

    let wanted = Version::parse(query)?;
    debug!(
        query,
        major = ?wanted.major(),
        minor = ?wanted.minor(),
        patch = ?wanted.patch(),
        build = ?wanted.build(),
        candidates = parsed.len(),
        "resolving version"
    );

    let found = parsed
        .into_iter()
        .find(|(candidate, _)| wanted.matches(candidate))
        .ok_or_else(|| ToolmanError::not_found(query))?;

    debug!(query, resolved = %found.0, index = found.1, "resolved version");
    Ok(found)
}

/// Returns the catalog versions ordered newest first, skipping unparsable entries.
#[must_use]
pub fn sorted_newest_first<S: AsRef<str>>(candidates: &[S]) -> Vec<Version> {
    let mut versions: Vec<Version> = candidates
        .iter()
        .filter_map(|text| Version::parse(text.as_ref()).ok())
        .collect();
    versions.sort_by(newest_first);
    versions
}

fn newest_first(a: &Version, b: &Version) -> Ordering {
    if Version::compare_descending(a, b) {
        Ordering::Less
    } else if Version::compare_descending(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_returns_newest_with_original_index() {
        let (version, index) = find_version("", &["v1.0.0", "v2.0.0"]).expect("Should resolve");
        assert_eq!(version.as_str(), "v2.0.0");
        assert_eq!(index, 1);
    }

    #[test]
    fn partial_query_picks_newest_match() {
        let (version, index) =
            find_version("20.0", &["v20.0.1", "v20.0.2"]).expect("Should resolve");
        assert_eq!(version.as_str(), "v20.0.2");
        assert_eq!(index, 1);
    }

    #[test]
    fn partial_query_ignores_newer_non_matching_entries() {
        let catalog = ["1.22.0", "1.21.3", "1.21.10", "1.20.7"];
        let (version, index) = find_version("1.21", &catalog).expect("Should resolve");
        assert_eq!(version.as_str(), "1.21.10");
        assert_eq!(index, 2);
    }

    #[test]
    fn no_match_is_not_found() {
        let err = find_version("99", &["v1.0.0", "v2.0.0"]).unwrap_err();
        assert!(matches!(err, ToolmanError::NotFound { .. }));
        assert_eq!(err.to_string(), "no version found for 99");
    }

    #[test]
    fn empty_catalog_is_not_found() {
        let catalog: [&str; 0] = [];
        assert!(matches!(
            find_version("", &catalog),
            Err(ToolmanError::NotFound { .. })
        ));
    }

    #[test]
    fn unparsable_candidate_fails_the_call() {
        let err = find_version("1", &["1.0.0", "nightly"]).unwrap_err();
        assert!(matches!(err, ToolmanError::Parse { .. }));
    }

    #[test]
    fn duplicates_resolve_to_first_occurrence() {
        let (_, index) = find_version("", &["1.0.0", "2.0.0", "v2.0.0"]).expect("Should resolve");
        assert_eq!(index, 1);
    }

    #[test]
    fn release_preferred_over_release_candidate() {
        let (version, _) =
            find_version("1.21", &["1.21.0-rc2", "1.21.0", "1.21.0-rc1"]).expect("Should resolve");
        assert_eq!(version.as_str(), "1.21.0");
    }

    #[test]
    fn sorted_newest_first_skips_garbage() {
        let sorted = sorted_newest_first(&["1.0", "junk", "2.0", "1.5"]);
        let texts: Vec<&str> = sorted.iter().map(Version::as_str).collect();
        assert_eq!(texts, ["2.0", "1.5", "1.0"]);
    }
}
