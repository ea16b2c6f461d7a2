//! Plugin API versions.
//!
//! A version is a `(major, minor)` pair. On the wire it travels as a single
//! ordered `u32` (`major << 16 | minor`), so comparing raw values orders
//! versions the same way as comparing the pairs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Version of the plugin API spoken by this SDK.
pub const API_VERSION: Version = Version::new(1, 0);

/// A `(major, minor)` plugin API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Decode the single-value wire form.
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            major: (raw >> 16) as u16,
            minor: (raw & 0xFFFF) as u16,
        }
    }

    /// Encode as the single-value wire form.
    pub const fn as_raw(self) -> u32 {
        ((self.major as u32) << 16) | self.minor as u32
    }

    /// Take major and minor from a semantic version, dropping the patch.
    pub fn from_semver(version: &semver::Version) -> Result<Self, VersionParseError> {
        let major = u16::try_from(version.major)
            .map_err(|_| VersionParseError::OutOfRange(version.to_string()))?;
        let minor = u16::try_from(version.minor)
            .map_err(|_| VersionParseError::OutOfRange(version.to_string()))?;
        Ok(Self::new(major, minor))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Error parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Invalid version: {0:?} (expected \"major.minor\")")]
    Invalid(String),

    #[error("Version component out of range: {0}")]
    OutOfRange(String),
}

impl FromStr for Version {
    type Err = VersionParseError;

    /// Accepts `"major.minor"` or a full semantic version (patch ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(full) = semver::Version::parse(s) {
            return Self::from_semver(&full);
        }

        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| VersionParseError::Invalid(s.to_string()))?;
        let parse = |part: &str| -> Result<u16, VersionParseError> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionParseError::Invalid(s.to_string()));
            }
            part.parse()
                .map_err(|_| VersionParseError::OutOfRange(s.to_string()))
        };
        Ok(Self::new(parse(major)?, parse(minor)?))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive `[min, max]` range of acceptable versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionWindow {
    pub min: Version,
    pub max: Version,
}

impl VersionWindow {
    pub const fn new(min: Version, max: Version) -> Self {
        Self { min, max }
    }

    /// Window accepting exactly one version.
    pub const fn exact(version: Version) -> Self {
        Self::new(version, version)
    }

    pub fn contains(&self, version: Version) -> bool {
        self.min <= version && version <= self.max
    }

    /// A window with `min > max` accepts nothing.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl fmt::Display for VersionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip_preserves_order() {
        let a = Version::new(1, 9);
        let b = Version::new(2, 0);
        assert!(a < b);
        assert!(a.as_raw() < b.as_raw());
        assert_eq!(Version::from_raw(b.as_raw()), b);
    }

    #[test]
    fn test_parse() {
        assert_eq!("1.2".parse::<Version>().unwrap(), Version::new(1, 2));
        assert_eq!("3.4.5".parse::<Version>().unwrap(), Version::new(3, 4));
        assert!("1".parse::<Version>().is_err());
        assert!("a.b".parse::<Version>().is_err());
        assert!("1.".parse::<Version>().is_err());
        assert!(matches!(
            "70000.0".parse::<Version>(),
            Err(VersionParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_window_is_inclusive() {
        let window = VersionWindow::new(Version::new(1, 0), Version::new(1, 3));
        assert!(window.contains(Version::new(1, 0)));
        assert!(window.contains(Version::new(1, 3)));
        assert!(!window.contains(Version::new(1, 4)));
        assert!(!window.contains(Version::new(0, 9)));
        assert_eq!(window.to_string(), "[1.0, 1.3]");
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&Version::new(2, 1)).unwrap();
        assert_eq!(json, "\"2.1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::new(2, 1));
    }
}
