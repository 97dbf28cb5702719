//! Ledger rows
//!
//! Provides [`InstallationRecord`], [`InstallationCeiling`] and [`LegacyDescriptor`].

use crate::id::{LineageKey, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Historical snapshot of one update, as known to a store
///
/// Name, description and authoring time are copied when the record is written
/// so the ledger stays readable after the update's definition is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    /// Update version
    pub version: Version,
    /// Update name at install time
    pub name: String,
    /// Update description at install time
    pub description: String,
    /// Authoring timestamp of the update
    pub created_at: DateTime<Utc>,
    /// Commit timestamp; `None` means not applied yet
    pub installed_at: Option<DateTime<Utc>>,
}

impl InstallationRecord {
    /// Create a pending record
    #[must_use]
    pub fn new(
        version: Version,
        name: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version,
            name: name.into(),
            description: description.into(),
            created_at,
            installed_at: None,
        }
    }

    /// Mark as installed at the given instant
    #[inline]
    #[must_use]
    pub fn installed(mut self, at: DateTime<Utc>) -> Self {
        self.installed_at = Some(at);
        self
    }

    /// Whether the update was committed
    ///
    /// A record without `installed_at` is pending, exactly like a missing record.
    #[inline]
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed_at.is_some()
    }
}

/// Per-store singleton tracking the highest installed version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationCeiling {
    /// Highest version installed so far
    pub current_installed_version: Option<Version>,
    /// Lineage resolved for this store
    pub lineage: Option<LineageKey>,
}

impl InstallationCeiling {
    /// Create an empty ceiling
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful installation
    ///
    /// The version only ever moves up; the lineage is overwritten.
    #[must_use]
    pub fn raise(mut self, version: Version, lineage: LineageKey) -> Self {
        self.current_installed_version = Some(
            self.current_installed_version
                .map_or(version, |current| current.max(version)),
        );
        self.lineage = Some(lineage);
        self
    }

    /// Resolved lineage, if any
    #[inline]
    #[must_use]
    pub fn lineage(&self) -> Option<&LineageKey> {
        self.lineage.as_ref()
    }
}

/// Edition marker of a store that predates the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegacyDescriptor {
    /// Product season
    pub season: u16,
    /// Product episode
    pub episode: u16,
}

impl LegacyDescriptor {
    /// Create a descriptor
    #[inline]
    #[must_use]
    pub const fn new(season: u16, episode: u16) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for LegacyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "season {} episode {}", self.season, self.episode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(s: &str) -> LineageKey {
        LineageKey::new(s).unwrap()
    }

    #[test]
    fn record_pending_until_installed() {
        let record = InstallationRecord::new(Version(3), "fix", "fix drops", Utc::now());
        assert!(!record.is_installed());

        let record = record.installed(Utc::now());
        assert!(record.is_installed());
    }

    #[test]
    fn ceiling_starts_empty() {
        let ceiling = InstallationCeiling::new();
        assert_eq!(ceiling.current_installed_version, None);
        assert!(ceiling.lineage().is_none());
    }

    #[test]
    fn ceiling_ignores_lower_version() {
        let ceiling = InstallationCeiling::new()
            .raise(Version(7), key("Season6"))
            .raise(Version(4), key("Season6"));
        assert_eq!(ceiling.current_installed_version, Some(Version(7)));
    }

    #[test]
    fn descriptor_display() {
        assert_eq!(LegacyDescriptor::new(6, 3).to_string(), "season 6 episode 3");
    }

    proptest! {
        #[test]
        fn prop_ceiling_never_decreases(versions in proptest::collection::vec(0u32..1000, 1..50)) {
            let mut ceiling = InstallationCeiling::new();
            let mut previous = None;
            for v in &versions {
                ceiling = ceiling.raise(Version(*v), key("X"));
                let current = ceiling.current_installed_version;
                prop_assert!(current >= previous);
                previous = current;
            }
            prop_assert_eq!(ceiling.current_installed_version, versions.iter().copied().max().map(Version));
        }
    }
}
