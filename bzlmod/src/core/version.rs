use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// A module version, in the relaxed format accepted by module files.
///
/// A version is a dot-separated sequence of release identifiers, optionally
/// followed by `-` and a pre-release part, optionally followed by `+` and
/// build metadata. Unlike semver, any number of release identifiers is
/// accepted and identifiers may be alphanumeric.
///
/// Ordering rules:
/// * release identifiers compare numerically when both are numeric,
///   lexicographically when both are alphanumeric; a numeric identifier
///   orders below an alphanumeric one;
/// * a version with a pre-release part orders below the same release
///   without one;
/// * a shorter release sequence orders below a longer one sharing its
///   prefix;
/// * build metadata does not participate in precedence;
/// * [`Version::EMPTY`] orders above every non-empty version. It stands in
///   for modules whose version is dictated by a non-registry override, and
///   doubles as the unbounded ceiling in allowed-version sets.
#[derive(Clone)]
pub struct Version {
    release: Vec<Identifier>,
    prerelease: Vec<Identifier>,
    build: SmolStr,
    original: SmolStr,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Identifier {
    // Variant order gives numeric identifiers lower precedence than
    // alphanumeric ones.
    Num(u64),
    Alpha(SmolStr),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid module version `{version}`: {reason}")]
pub struct VersionParseError {
    pub version: String,
    pub reason: String,
}

impl VersionParseError {
    fn new(version: &str, reason: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            reason: reason.into(),
        }
    }
}

impl Version {
    /// The sentinel empty version, greater than every non-empty version.
    pub const EMPTY: Self = Self {
        release: Vec::new(),
        prerelease: Vec::new(),
        build: SmolStr::new_inline(""),
        original: SmolStr::new_inline(""),
    };

    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        if text.is_empty() {
            return Ok(Self::EMPTY);
        }

        let (precedence, build) = match text.split_once('+') {
            Some((precedence, build)) => {
                if build.is_empty() {
                    return Err(VersionParseError::new(text, "empty build metadata"));
                }
                (precedence, build)
            }
            None => (text, ""),
        };

        if !build.is_empty() {
            for part in build.split('.') {
                if part.is_empty() {
                    return Err(VersionParseError::new(text, "empty build metadata identifier"));
                }
                if !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                    return Err(VersionParseError::new(
                        text,
                        format!("invalid character in build metadata `{part}`"),
                    ));
                }
            }
        }

        let (release, prerelease) = match precedence.split_once('-') {
            Some((release, prerelease)) => (release, Some(prerelease)),
            None => (precedence, None),
        };

        let release = parse_identifiers(text, release, "release")?;
        let prerelease = match prerelease {
            Some(prerelease) => parse_identifiers(text, prerelease, "pre-release")?,
            None => Vec::new(),
        };

        Ok(Self {
            release,
            prerelease,
            build: build.into(),
            original: text.into(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.release.is_empty()
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.original.as_str()
    }
}

fn parse_identifiers(
    version: &str,
    text: &str,
    part: &str,
) -> Result<Vec<Identifier>, VersionParseError> {
    text.split('.')
        .map(|ident| {
            if ident.is_empty() {
                return Err(VersionParseError::new(
                    version,
                    format!("empty identifier in {part} part"),
                ));
            }
            if !ident.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(VersionParseError::new(
                    version,
                    format!("invalid character in identifier `{ident}`"),
                ));
            }
            if ident.chars().all(|c| c.is_ascii_digit()) {
                ident.parse::<u64>().map(Identifier::Num).map_err(|_| {
                    VersionParseError::new(version, format!("numeric identifier `{ident}` is too large"))
                })
            } else {
                Ok(Identifier::Alpha(ident.into()))
            }
        })
        .collect()
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.release == other.release
            && self.prerelease == other.prerelease
            && self.build == other.build
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.release.hash(state);
        self.prerelease.hash(state);
        self.build.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        self.release
            .cmp(&other.release)
            .then_with(|| match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.prerelease.cmp(&other.prerelease),
            })
            // Build metadata has no precedence, but breaking the remaining
            // tie keeps the total order consistent with equality.
            .then_with(|| self.build.cmp(&other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<&str> for Version {
    type Error = VersionParseError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

impl TryFrom<SmolStr> for Version {
    type Error = VersionParseError;

    fn try_from(text: SmolStr) -> Result<Self, Self::Error> {
        Self::parse(text.as_str())
    }
}

impl From<Version> for SmolStr {
    fn from(version: Version) -> Self {
        version.original
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = SmolStr::deserialize(d)?;
        Self::try_from(text).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.original, f)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Version(<empty>)")
        } else {
            write!(f, "Version({self})")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use test_case::test_case;

    use super::Version;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test_case("1.0")]
    #[test_case("1.0.0")]
    #[test_case("2022.01.10")]
    #[test_case("1.0-pre")]
    #[test_case("1.0-pre.2")]
    #[test_case("1.0.0-rc.1+build.5")]
    #[test_case("4")]
    #[test_case("1.0.patch3")]
    #[test_case("")]
    fn roundtrip(text: &str) {
        let version = v(text);
        assert_eq!(Version::parse(&version.to_string()).unwrap(), version);
        assert_eq!(version.to_string(), text);
    }

    #[test_case("-abc"; "leading dash")]
    #[test_case("1..0"; "empty release identifier")]
    #[test_case("1.0-"; "empty prerelease")]
    #[test_case("1.0-pre..1"; "empty prerelease identifier")]
    #[test_case("1.0+"; "empty build")]
    #[test_case("1_0"; "underscore")]
    #[test_case("1.0 "; "trailing space")]
    #[test_case("über"; "non ascii")]
    #[test_case("99999999999999999999999999"; "numeric overflow")]
    fn rejects(text: &str) {
        assert!(Version::parse(text).is_err());
    }

    #[test_case("1.0", "1.0", Ordering::Equal)]
    #[test_case("1.0", "1.1", Ordering::Less)]
    #[test_case("2", "1.9.9", Ordering::Greater)]
    #[test_case("1.2", "1.2.0", Ordering::Less; "shorter release orders below")]
    #[test_case("1.0", "1.0-pre", Ordering::Greater; "prerelease orders below release")]
    #[test_case("1.0-pre.1", "1.0-pre.2", Ordering::Less)]
    #[test_case("1.0-pre", "1.0-pre.1", Ordering::Less)]
    #[test_case("1.0-2", "1.0-rc", Ordering::Less; "numeric below alphanumeric")]
    #[test_case("1.0-10", "1.0-9", Ordering::Greater; "numeric identifiers compare numerically")]
    #[test_case("1.0.patch3", "1.0.patch10", Ordering::Greater; "alphanumeric identifiers compare lexicographically")]
    #[test_case("1.0+build1", "1.0+build2", Ordering::Less; "build metadata only breaks full ties")]
    #[test_case("", "999.999", Ordering::Greater; "empty is greater than all")]
    #[test_case("", "", Ordering::Equal)]
    fn ordering(left: &str, right: &str, expected: Ordering) {
        assert_eq!(v(left).cmp(&v(right)), expected);
        assert_eq!(v(right).cmp(&v(left)), expected.reverse());
    }

    #[test]
    fn empty_is_greatest() {
        let empty = Version::EMPTY;
        for text in ["0", "1.0", "99999.99999", "1.0-pre", "2024.12.31+meta"] {
            assert!(empty > v(text), "EMPTY should be greater than {text}");
        }
        assert_eq!(empty, v(""));
        assert!(empty.is_empty());
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(v("1.0"), v("1.00"));
        assert_ne!(v("1.0"), v("1.0.0"));
        assert_ne!(v("1.0"), v("1.0-pre"));
    }

    #[test]
    fn serde_as_string() {
        let version = v("1.2.3-rc.1");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, r#""1.2.3-rc.1""#);
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }
}
