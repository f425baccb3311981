//! Schema versioning for the persisted index.
//!
//! A reader accepts any file whose major version equals its own. Older
//! major versions are accepted down to [`MIN_COMPAT_SCHEMA`]; newer ones
//! never are.

use std::fmt;
use std::str::FromStr;

/// Version written by this build.
pub const INDEX_SCHEMA: SchemaVersion = SchemaVersion::new(2, 1, 0);

/// Oldest version this build can read.
pub const MIN_COMPAT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 2, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether an index written with this version can be loaded.
    pub fn is_compatible(&self) -> bool {
        if self.major == INDEX_SCHEMA.major {
            return true;
        }
        self.major < INDEX_SCHEMA.major && *self >= MIN_COMPAT_SCHEMA
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVersionError(String);

impl fmt::Display for ParseVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid schema version {:?}", self.0)
    }
}

impl std::error::Error for ParseVersionError {}

impl FromStr for SchemaVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, ParseVersionError> {
            parts.next().ok_or_else(err)?.parse().map_err(|_| err())
        };
        let version = SchemaVersion::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v: SchemaVersion = "2.1.0".parse().unwrap();
        assert_eq!(v, INDEX_SCHEMA);
        assert_eq!(v.to_string(), "2.1.0");
        assert!("2.1".parse::<SchemaVersion>().is_err());
        assert!("2.1.0.4".parse::<SchemaVersion>().is_err());
        assert!("two.1.0".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_compatibility() {
        assert!(SchemaVersion::new(2, 0, 0).is_compatible());
        assert!(SchemaVersion::new(2, 9, 3).is_compatible());
        assert!(SchemaVersion::new(1, 2, 0).is_compatible());
        assert!(SchemaVersion::new(1, 7, 1).is_compatible());
        assert!(!SchemaVersion::new(1, 1, 9).is_compatible());
        assert!(!SchemaVersion::new(0, 9, 0).is_compatible());
        assert!(!SchemaVersion::new(3, 0, 0).is_compatible());
    }
}
