// src/version.rs

//! Version parsing and comparison for pkgsrc version strings
//!
//! pkgsrc appends a local revision marker `nbN` to upstream versions
//! (`2.40nb2` is the second rebuild of upstream `2.40`). A [`VersionKey`]
//! keeps the first three numeric components plus that revision, and its
//! derived ordering is the total order used for sorting listings and for
//! outdated detection.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Placeholder used when a version cannot be determined
pub const UNKNOWN_VERSION: &str = "unknown";

/// Comparable key derived from a raw version string
///
/// Field order matters: the derived `Ord` compares the main version first,
/// then revision presence (`None` sorts before `Some`), then the revision
/// number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionKey {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: Option<u64>,
}

impl VersionKey {
    /// Parse a raw version string. Never fails.
    ///
    /// Non-numeric components count as 0, missing components are padded
    /// with 0, and `unknown`/empty strings yield the lowest key.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(UNKNOWN_VERSION) {
            return Self::default();
        }

        let (main, revision) = split_revision(raw);

        let mut parts = [0u64; 3];
        for (slot, segment) in parts.iter_mut().zip(main.split('.')) {
            *slot = parse_component(segment);
        }

        Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            revision,
        }
    }

    /// Lowest possible key, used for unknown versions
    pub fn lowest() -> Self {
        Self::default()
    }
}

impl From<&str> for VersionKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(rev) = self.revision {
            write!(f, "nb{}", rev)?;
        }
        Ok(())
    }
}

/// Compare two raw version strings by their [`VersionKey`]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::parse(a).cmp(&VersionKey::parse(b))
}

/// Split an installed package identifier `name-version` at its last dash
///
/// Returns `None` for the version when there is no dash.
pub fn split_pkgname(pkgname: &str) -> (&str, Option<&str>) {
    match pkgname.rsplit_once('-') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() => (name, Some(version)),
        _ => (pkgname, None),
    }
}

/// Separate a trailing `nb<digits>` marker from the main version
fn split_revision(raw: &str) -> (&str, Option<u64>) {
    if let Some(pos) = raw.rfind("nb") {
        let digits = &raw[pos + 2..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return (&raw[..pos], Some(digits.parse().unwrap_or(0)));
        }
    }
    (raw, None)
}

fn parse_component(segment: &str) -> u64 {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    segment.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_revision() {
        let key = VersionKey::parse("2.40nb2");
        assert_eq!(key.major, 2);
        assert_eq!(key.minor, 40);
        assert_eq!(key.patch, 0);
        assert_eq!(key.revision, Some(2));
    }

    #[test]
    fn test_parse_pads_missing_components() {
        assert_eq!(VersionKey::parse("1.2"), VersionKey::parse("1.2.0"));
        assert_eq!(VersionKey::parse("3"), VersionKey::parse("3.0.0"));
    }

    #[test]
    fn test_non_numeric_component_is_zero() {
        let key = VersionKey::parse("1.2a.3");
        assert_eq!((key.major, key.minor, key.patch), (1, 0, 3));
    }

    #[test]
    fn test_unknown_sorts_lowest() {
        assert_eq!(VersionKey::parse("unknown"), VersionKey::lowest());
        assert_eq!(VersionKey::parse(""), VersionKey::lowest());
        assert!(VersionKey::parse("unknown") < VersionKey::parse("0.0.1"));
    }

    #[test]
    fn test_revision_ordering() {
        assert!(VersionKey::parse("1.2") < VersionKey::parse("1.2nb1"));
        assert!(VersionKey::parse("1.2nb1") < VersionKey::parse("1.3"));
        assert!(VersionKey::parse("2.40nb2") > VersionKey::parse("2.40nb1"));
        assert_eq!(compare_versions("6.2", "6.3"), Ordering::Less);
    }

    #[test]
    fn test_only_three_components_count() {
        assert_eq!(VersionKey::parse("1.2.3.4"), VersionKey::parse("1.2.3"));
    }

    #[test]
    fn test_nb_without_digits_is_not_a_revision() {
        let key = VersionKey::parse("1.2nb");
        assert_eq!(key.revision, None);
    }

    #[test]
    fn test_sort_is_reversible() {
        let mut versions = vec!["1.3", "unknown", "1.2nb1", "2.40nb2", "1.2", "2.40nb1"];
        versions.sort_by_key(|v| VersionKey::parse(v));
        let ascending = versions.clone();
        versions.sort_by_key(|v| std::cmp::Reverse(VersionKey::parse(v)));
        let mut reversed = ascending.clone();
        reversed.reverse();
        assert_eq!(versions, reversed);
        assert_eq!(ascending, vec!["unknown", "1.2", "1.2nb1", "1.3", "2.40nb1", "2.40nb2"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(VersionKey::parse("2.40nb2").to_string(), "2.40.0nb2");
    }

    #[test]
    fn test_split_pkgname() {
        assert_eq!(split_pkgname("py39-six-1.16.0"), ("py39-six", Some("1.16.0")));
        assert_eq!(split_pkgname("bash"), ("bash", None));
        assert_eq!(split_pkgname("trailing-"), ("trailing-", None));
    }
}
