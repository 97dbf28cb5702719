//! Identity types shared by the ledger, the registry and the engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author-assigned version number of an update within its lineage
///
/// Versions are unique per lineage but not necessarily contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u32);

impl Version {
    /// Create a version
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Version {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Rejected lineage key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid lineage key: {0:?}")]
pub struct InvalidLineageKey(pub String);

/// Identifier of an independent versioning track
///
/// Never empty. Surrounding whitespace is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LineageKey(String);

impl LineageKey {
    /// Create a lineage key, rejecting blank input
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidLineageKey> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(InvalidLineageKey(key));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LineageKey {
    type Err = InvalidLineageKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LineageKey {
    type Error = InvalidLineageKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LineageKey> for String {
    fn from(value: LineageKey) -> Self {
        value.0
    }
}

impl AsRef<str> for LineageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
