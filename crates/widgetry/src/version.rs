//! Semantic version helpers

use semver::Version;
use std::cmp::Ordering;

/// Parse a strict semantic version (no `v` prefix, no leading zeros)
pub fn parse(version: &str) -> Result<Version, semver::Error> {
    Version::parse(version)
}

/// Compare two versions by semver precedence
///
/// Build metadata does not take part in precedence, so `1.0.0+a` and
/// `1.0.0+b` compare equal here even though `Version`'s own `Ord` does not.
pub fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

/// Whether moving from `base` to `head` is a strict version increase
pub fn is_increment(base: &Version, head: &Version) -> bool {
    cmp_precedence(base, head) == Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        parse(s).unwrap()
    }

    #[test]
    fn test_strict_increase() {
        assert!(is_increment(&v("1.2.3"), &v("1.2.4")));
        assert!(is_increment(&v("1.2.3"), &v("2.0.0")));
        assert!(!is_increment(&v("1.2.3"), &v("1.2.3")));
        assert!(!is_increment(&v("1.2.3"), &v("1.2.0")));
    }

    #[test]
    fn test_prerelease_precedes_release() {
        assert!(is_increment(&v("1.0.0-rc.1"), &v("1.0.0")));
        assert!(is_increment(&v("1.0.0-alpha"), &v("1.0.0-beta")));
        assert!(!is_increment(&v("1.0.0"), &v("1.0.0-rc.1")));
    }

    #[test]
    fn test_build_metadata_is_not_an_increment() {
        assert!(!is_increment(&v("1.0.0+build.1"), &v("1.0.0+build.2")));
    }

    #[test]
    fn test_rejects_non_semver() {
        for s in ["1.0", "v1.0.0", "01.0.0", "1.0.0.0", "latest"] {
            assert!(parse(s).is_err(), "{s}");
        }
    }
}
