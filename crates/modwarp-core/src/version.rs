//! Dotted-numeric versions and version-range matching
//!
//! Mod and host versions are dotted numeric strings with an arbitrary
//! number of segments (e.g. `2.0.0` or `0.2.2.0.32914`); they are not
//! semver. Missing trailing segments compare as zero, so `1.0` == `1`.
//! Range bounds may be the wildcard `"*"`, meaning unbounded on that side.

use crate::error::{Error, Result};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A dotted-numeric version
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    /// Create a version from raw segments
    pub fn new(segments: Vec<u64>) -> Self {
        Self { segments }
    }

    /// The raw segments of this version
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_version(s));
        }

        let segments = trimmed
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::invalid_version(s))?;

        Ok(Self { segments })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{text}")
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An inclusive `[min, max]` version range; either bound may be the
/// wildcard `"*"` meaning unbounded on that side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    /// Lower bound, inclusive; `None` (serialized `"*"`) = unbounded
    #[serde(
        default,
        serialize_with = "serialize_bound",
        deserialize_with = "deserialize_bound"
    )]
    pub min: Option<Version>,

    /// Upper bound, inclusive; `None` (serialized `"*"`) = unbounded
    #[serde(
        default,
        serialize_with = "serialize_bound",
        deserialize_with = "deserialize_bound"
    )]
    pub max: Option<Version>,
}

impl VersionRange {
    /// The unbounded range that matches every version
    pub fn any() -> Self {
        Self::default()
    }

    /// Create a range with both bounds set
    pub fn between(min: Version, max: Version) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Whether `version` falls inside this range
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(min) = &self.min {
            if version < min {
                return false;
            }
        }
        if let Some(max) = &self.max {
            if version > max {
                return false;
            }
        }
        true
    }

    /// Whether the version string falls inside this range.
    ///
    /// An unparsable version fails closed: it is reported as a warning and
    /// treated as unsupported, never raised.
    pub fn supports(&self, version: &str) -> bool {
        match version.parse::<Version>() {
            Ok(parsed) => self.contains(&parsed),
            Err(_) => {
                warn!("Unparsable version '{version}'; treating as unsupported");
                false
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min = self
            .min
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "*".to_string());
        let max = self
            .max
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "*".to_string());
        write!(f, "[{min}, {max}]")
    }
}

fn serialize_bound<S: Serializer>(
    bound: &Option<Version>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match bound {
        Some(version) => serializer.serialize_str(&version.to_string()),
        None => serializer.serialize_str("*"),
    }
}

fn deserialize_bound<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Version>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("*") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Manifest spec version (`major.minor`), governing which validation rules
/// apply to a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecVersion {
    pub major: u16,
    pub minor: u16,
}

impl SpecVersion {
    /// First spec with enforced identity and dependency-aware ordering;
    /// manifests below this are legacy, unordered units
    pub const V1_3: SpecVersion = SpecVersion { major: 1, minor: 3 };

    /// Current spec version
    pub const V2_0: SpecVersion = SpecVersion { major: 2, minor: 0 };

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl FromStr for SpecVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| Error::invalid_version(s))?;
        Ok(Self {
            major: major.parse().map_err(|_| Error::invalid_version(s))?,
            minor: minor.parse().map_err(|_| Error::invalid_version(s))?,
        })
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Serialize for SpecVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SpecVersion {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1.0", "1.0.0" ; "trailing zero segments are equal")]
    #[test_case("2", "2.0" ; "single segment pads")]
    fn test_version_equality(a: &str, b: &str) {
        let a: Version = a.parse().unwrap();
        let b: Version = b.parse().unwrap();
        assert_eq!(a, b);
    }

    #[test_case("1.0", "1.1" ; "minor bump")]
    #[test_case("1.9", "1.10" ; "numeric not lexicographic")]
    #[test_case("0.2.2.0.32914", "0.2.3" ; "deep segments")]
    fn test_version_ordering(lower: &str, higher: &str) {
        let lower: Version = lower.parse().unwrap();
        let higher: Version = higher.parse().unwrap();
        assert!(lower < higher);
    }

    #[test_case("" ; "empty")]
    #[test_case("1.0-beta" ; "non numeric segment")]
    #[test_case("1..0" ; "empty segment")]
    fn test_version_parse_failure(input: &str) {
        assert!(input.parse::<Version>().is_err());
    }

    #[test]
    fn test_range_reflexive_at_boundaries() {
        let v: Version = "1.5".parse().unwrap();
        let range = VersionRange::between("1.5".parse().unwrap(), "1.5".parse().unwrap());
        assert!(range.contains(&v));

        let above = VersionRange {
            min: Some("1.6".parse().unwrap()),
            max: None,
        };
        assert!(!above.contains(&v));
    }

    #[test]
    fn test_range_wildcards() {
        let any = VersionRange::any();
        assert!(any.supports("0.0.1"));
        assert!(any.supports("999.999"));

        let min_only = VersionRange {
            min: Some("2.0".parse().unwrap()),
            max: None,
        };
        assert!(min_only.supports("2.0"));
        assert!(min_only.supports("3.1"));
        assert!(!min_only.supports("1.9"));
    }

    #[test]
    fn test_unparsable_version_fails_closed() {
        assert!(!VersionRange::any().supports("not-a-version"));
    }

    #[test]
    fn test_range_serde_wildcard() {
        let range: VersionRange = serde_json::from_str(r#"{"min":"1.0","max":"*"}"#).unwrap();
        assert!(range.min.is_some());
        assert!(range.max.is_none());

        let json = serde_json::to_string(&range).unwrap();
        assert!(json.contains(r#""max":"*""#));
    }

    #[test]
    fn test_range_serde_missing_bounds() {
        let range: VersionRange = serde_json::from_str("{}").unwrap();
        assert_eq!(range, VersionRange::any());
    }

    #[test]
    fn test_spec_version_ordering() {
        let legacy: SpecVersion = "1.2".parse().unwrap();
        let ordered: SpecVersion = "1.3".parse().unwrap();
        assert!(legacy < SpecVersion::V1_3);
        assert_eq!(ordered, SpecVersion::V1_3);
        assert!(SpecVersion::V2_0 > SpecVersion::V1_3);
    }
}
