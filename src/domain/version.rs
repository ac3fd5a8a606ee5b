use crate::error::{ReleaseError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)\.([0-9]+)\.([0-9]+)$").expect("static regex"));

/// Semantic version limited to MAJOR.MINOR.PATCH
///
/// Release branches carry exactly this triple as their name, so pre-release
/// and build metadata are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion(semver::Version);

impl SemanticVersion {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemanticVersion(semver::Version::new(major, minor, patch))
    }

    /// Parse a strict `MAJOR.MINOR.PATCH` string (no prefix, no whitespace)
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || ReleaseError::InvalidVersionFormat(input.to_string());
        let captures = VERSION_RE.captures(input).ok_or_else(invalid)?;

        let component = |i: usize| captures[i].parse::<u64>().map_err(|_| invalid());

        Ok(SemanticVersion::new(component(1)?, component(2)?, component(3)?))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Compare against another version: major, then minor, then patch
    pub fn compare(&self, other: &SemanticVersion) -> Ordering {
        self.cmp(other)
    }

    /// Bump version according to bump type
    pub fn bump(&self, bump_type: VersionBump) -> Self {
        match bump_type {
            VersionBump::Major => SemanticVersion::new(self.major() + 1, 0, 0),
            VersionBump::Minor => SemanticVersion::new(self.major(), self.minor() + 1, 0),
            VersionBump::Patch => {
                SemanticVersion::new(self.major(), self.minor(), self.patch() + 1)
            }
        }
    }

    /// The conventional next versions: patch, minor and major bumps
    pub fn suggestions(&self) -> Vec<SemanticVersion> {
        [VersionBump::Patch, VersionBump::Minor, VersionBump::Major]
            .into_iter()
            .map(|bump| self.bump(bump))
            .collect()
    }
}

impl Default for SemanticVersion {
    fn default() -> Self {
        SemanticVersion::new(0, 0, 0)
    }
}

impl FromStr for SemanticVersion {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        SemanticVersion::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version bump type decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

/// Decide which version a run releases.
///
/// An explicit argument always wins. Without one the recorded marker is
/// re-released; with neither the caller has to supply a version.
pub fn effective_version(
    explicit: Option<&str>,
    recorded: Option<&SemanticVersion>,
    marker_path: &Path,
) -> Result<SemanticVersion> {
    match (explicit, recorded) {
        (Some(input), _) => SemanticVersion::parse(input),
        (None, Some(recorded)) => Ok(recorded.clone()),
        (None, None) => Err(ReleaseError::MissingVersion(marker_path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = SemanticVersion::parse("1.2.3").unwrap();
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.patch(), 3);
    }

    #[test]
    fn test_version_parse_round_trips() {
        for input in ["0.0.0", "0.1.3", "10.20.30", "18446744073709551615.0.1"] {
            let v = SemanticVersion::parse(input).unwrap();
            assert_eq!(v.to_string(), input);
            assert_eq!(SemanticVersion::parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn test_version_parse_invalid() {
        let inputs = [
            "",
            "1",
            "1.2",
            "1.2.3.4",
            "v1.2.3",
            "-1.2.3",
            "1.-2.3",
            "1.2.x",
            "a.b.c",
            " 1.2.3",
            "1.2.3 ",
            "1..3",
            "1.2.3-rc.1",
            "1.2.3+build",
            "18446744073709551616.0.0",
        ];
        for input in inputs {
            let result = SemanticVersion::parse(input);
            assert!(
                matches!(result, Err(ReleaseError::InvalidVersionFormat(ref s)) if s == input),
                "expected InvalidVersionFormat for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_compare_is_lexicographic() {
        let a = SemanticVersion::new(0, 1, 3);
        assert_eq!(a.compare(&SemanticVersion::new(0, 1, 2)), Ordering::Greater);
        assert_eq!(a.compare(&SemanticVersion::new(0, 2, 0)), Ordering::Less);
        assert_eq!(a.compare(&SemanticVersion::new(1, 0, 0)), Ordering::Less);
        assert_eq!(a.compare(&a.clone()), Ordering::Equal);
        assert_eq!(
            SemanticVersion::new(0, 10, 0).compare(&SemanticVersion::new(0, 9, 99)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_compare_is_total_and_transitive() {
        let versions: Vec<SemanticVersion> = ["0.0.0", "0.0.1", "0.1.0", "0.1.3", "1.0.0", "1.0.1"]
            .iter()
            .map(|s| SemanticVersion::parse(s).unwrap())
            .collect();

        for a in &versions {
            assert_eq!(a.compare(a), Ordering::Equal);
            for b in &versions {
                assert_eq!(a.compare(b), b.compare(a).reverse());
                for c in &versions {
                    if a.compare(b) == Ordering::Less && b.compare(c) == Ordering::Less {
                        assert_eq!(a.compare(c), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn test_version_bump() {
        let v = SemanticVersion::new(1, 2, 3);
        assert_eq!(v.bump(VersionBump::Major), SemanticVersion::new(2, 0, 0));
        assert_eq!(v.bump(VersionBump::Minor), SemanticVersion::new(1, 3, 0));
        assert_eq!(v.bump(VersionBump::Patch), SemanticVersion::new(1, 2, 4));
    }

    #[test]
    fn test_suggestions_order() {
        let v = SemanticVersion::new(0, 1, 3);
        assert_eq!(
            v.suggestions(),
            vec![
                SemanticVersion::new(0, 1, 4),
                SemanticVersion::new(0, 2, 0),
                SemanticVersion::new(1, 0, 0),
            ]
        );
    }

    #[test]
    fn test_effective_version() {
        let marker = Path::new("VERSION");
        let recorded = SemanticVersion::new(0, 3, 1);

        assert_eq!(
            effective_version(Some("1.0.0"), Some(&recorded), marker).unwrap(),
            SemanticVersion::new(1, 0, 0)
        );
        assert_eq!(effective_version(None, Some(&recorded), marker).unwrap(), recorded);
        assert!(matches!(
            effective_version(None, None, marker),
            Err(ReleaseError::MissingVersion(_))
        ));
        assert!(matches!(
            effective_version(Some("1.0"), Some(&recorded), marker),
            Err(ReleaseError::InvalidVersionFormat(_))
        ));
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(SemanticVersion::default().to_string(), "0.0.0");
    }
}
