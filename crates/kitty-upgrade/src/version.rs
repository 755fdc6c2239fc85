//! Project schema versions.
//!
//! A [`Version`] is a `major.minor.patch` triple ordered component-wise. The
//! all-zero version doubles as the "unknown" sentinel returned for directories
//! that carry no recognizable project structure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use kitty_core::KittyError;

/// A project schema version.
///
/// # Examples
///
/// ```
/// use kitty_upgrade::Version;
///
/// let v: Version = "0.4.0".parse().unwrap();
/// assert!(v > Version::new(0, 3, 9));
/// assert_eq!(v.to_string(), "0.4.0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl Version {
    /// The sentinel for "not a recognizable project".
    pub const UNKNOWN: Self = Self::new(0, 0, 0);

    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns `true` for the unknown sentinel.
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = KittyError;

    /// Parses `major.minor.patch`. A leading `v` and a pre-release or build
    /// suffix (`0.6.0-rc1`, `0.6.0+abc`) are accepted and ignored; missing
    /// minor or patch components default to zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();
        if core.is_empty() {
            return Err(KittyError::SerializationError(format!(
                "Invalid version '{s}': empty"
            )));
        }

        let mut parts = [0_u32; 3];
        let mut count = 0;
        for piece in core.split('.') {
            if count == parts.len() {
                return Err(KittyError::SerializationError(format!(
                    "Invalid version '{s}': too many components"
                )));
            }
            parts[count] = piece.parse().map_err(|_| {
                KittyError::SerializationError(format!(
                    "Invalid version '{s}': '{piece}' is not a number"
                ))
            })?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
