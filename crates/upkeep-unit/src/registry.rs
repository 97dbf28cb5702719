//! Migration registry
//!
//! Provides the [`MigrationRegistry`] contract the planner consumes and
//! [`UnitRegistry`], a reference implementation backed by a central
//! [`UnitTable`] filled during the host's loading phase.

use crate::unit::{UnitMeta, UnitRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use upkeep_ledger::{ConfigurationRoot, LineageKey, Version};

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Loading phase has not finished
    #[error("migration registry is still loading")]
    NotReady,

    /// Two units claim the same version in one lineage
    #[error("duplicate update version {version} in lineage {lineage}")]
    DuplicateVersion {
        /// Lineage of both units
        lineage: LineageKey,
        /// Shared version
        version: Version,
    },

    /// Registration attempted after the loading phase
    #[error("migration registry is sealed; register units before mark_ready")]
    Sealed,
}

/// Loading state of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryState {
    /// Units are still being registered
    #[default]
    Loading,
    /// Loading finished; queries are authoritative
    Ready,
}

/// Source of known units per lineage
pub trait MigrationRegistry<R: ConfigurationRoot>: Send + Sync {
    /// Current loading state
    fn state(&self) -> RegistryState;

    /// All units registered for `lineage`, in no particular order
    ///
    /// # Errors
    /// [`RegistryError::NotReady`] while the registry is loading. An unknown
    /// lineage yields an empty list.
    fn available_units(&self, lineage: &LineageKey) -> Result<Vec<UnitRef<R>>, RegistryError>;
}

/// Central version table: lineage → version → unit
pub struct UnitTable<R: ConfigurationRoot> {
    lineages: HashMap<LineageKey, HashMap<Version, UnitRef<R>>>,
}

impl<R: ConfigurationRoot> UnitTable<R> {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            lineages: HashMap::new(),
        }
    }

    /// Insert a unit, rejecting a second unit with the same lineage and version
    pub fn insert(&mut self, unit: UnitRef<R>) -> Result<(), RegistryError> {
        let meta = unit.meta();
        let versions = self.lineages.entry(meta.lineage.clone()).or_default();
        if versions.contains_key(&meta.version) {
            return Err(RegistryError::DuplicateVersion {
                lineage: meta.lineage.clone(),
                version: meta.version,
            });
        }
        versions.insert(meta.version, unit);
        Ok(())
    }

    /// Units of one lineage
    #[must_use]
    pub fn units(&self, lineage: &LineageKey) -> Vec<UnitRef<R>> {
        self.lineages
            .get(lineage)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Metadata of one lineage, ascending by version
    #[must_use]
    pub fn catalog(&self, lineage: &LineageKey) -> Vec<UnitMeta> {
        let mut metas: Vec<UnitMeta> = self
            .lineages
            .get(lineage)
            .map(|versions| versions.values().map(|u| u.meta().clone()).collect())
            .unwrap_or_default();
        metas.sort_by_key(|m| m.version);
        metas
    }

    /// Registered lineages, sorted
    #[must_use]
    pub fn lineages(&self) -> Vec<LineageKey> {
        let mut keys: Vec<LineageKey> = self.lineages.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Total number of units
    #[must_use]
    pub fn len(&self) -> usize {
        self.lineages.values().map(HashMap::len).sum()
    }

    /// Check if table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: ConfigurationRoot> Default for UnitTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ConfigurationRoot> std::fmt::Debug for UnitTable<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.lineages.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

#[derive(Debug)]
struct RegistryInner<R: ConfigurationRoot> {
    table: UnitTable<R>,
    state: RegistryState,
}

/// Reference registry with an explicit loading phase
///
/// Units are registered while [`RegistryState::Loading`]; [`UnitRegistry::mark_ready`]
/// seals the table.
#[derive(Debug)]
pub struct UnitRegistry<R: ConfigurationRoot> {
    inner: RwLock<RegistryInner<R>>,
}

impl<R: ConfigurationRoot> UnitRegistry<R> {
    /// Create an empty registry in the loading state
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                table: UnitTable::new(),
                state: RegistryState::Loading,
            }),
        }
    }

    /// Build a ready registry from a fixed set of units
    pub fn with_units(units: impl IntoIterator<Item = UnitRef<R>>) -> Result<Self, RegistryError> {
        let registry = Self::new();
        registry.register_all(units)?;
        registry.mark_ready();
        Ok(registry)
    }

    /// Register one unit
    pub fn register(&self, unit: UnitRef<R>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        if inner.state == RegistryState::Ready {
            return Err(RegistryError::Sealed);
        }
        tracing::debug!(unit = %unit.meta(), "registering update");
        inner.table.insert(unit)
    }

    /// Register several units, stopping at the first rejection
    pub fn register_all(&self, units: impl IntoIterator<Item = UnitRef<R>>) -> Result<(), RegistryError> {
        units.into_iter().try_for_each(|unit| self.register(unit))
    }

    /// End the loading phase
    pub fn mark_ready(&self) {
        let mut inner = self.inner.write();
        if inner.state == RegistryState::Loading {
            tracing::info!(units = inner.table.len(), "migration registry ready");
        }
        inner.state = RegistryState::Ready;
    }

    /// Metadata of one lineage, ascending by version
    #[must_use]
    pub fn catalog(&self, lineage: &LineageKey) -> Vec<UnitMeta> {
        self.inner.read().table.catalog(lineage)
    }

    /// Registered lineages, sorted
    #[must_use]
    pub fn lineages(&self) -> Vec<LineageKey> {
        self.inner.read().table.lineages()
    }

    /// Total number of units
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().table.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: ConfigurationRoot> Default for UnitRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ConfigurationRoot> MigrationRegistry<R> for UnitRegistry<R> {
    fn state(&self) -> RegistryState {
        self.inner.read().state
    }

    fn available_units(&self, lineage: &LineageKey) -> Result<Vec<UnitRef<R>>, RegistryError> {
        let inner = self.inner.read();
        if inner.state != RegistryState::Ready {
            return Err(RegistryError::NotReady);
        }
        Ok(inner.table.units(lineage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::FnUnit;

    type Root = Vec<u32>;

    fn key(s: &str) -> LineageKey {
        LineageKey::new(s).unwrap()
    }

    fn unit(lineage: &str, version: u32) -> UnitRef<Root> {
        FnUnit::new(
            UnitMeta::new(version, key(lineage), format!("unit {version}")),
            |_: &mut Root| Ok(()),
        )
        .into_ref()
    }

    #[test]
    fn registry_new_is_loading() {
        let registry = UnitRegistry::<Root>::new();
        assert_eq!(registry.state(), RegistryState::Loading);
        assert!(registry.is_empty());
        assert!(matches!(
            registry.available_units(&key("X")),
            Err(RegistryError::NotReady)
        ));
    }

    #[test]
    fn registry_ready_returns_units() {
        let registry = UnitRegistry::with_units([unit("X", 1), unit("X", 2), unit("Y", 1)]).unwrap();
        assert_eq!(registry.state(), RegistryState::Ready);
        assert_eq!(registry.available_units(&key("X")).unwrap().len(), 2);
        assert_eq!(registry.available_units(&key("Y")).unwrap().len(), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn registry_unknown_lineage_is_empty() {
        let registry = UnitRegistry::with_units([unit("X", 1)]).unwrap();
        assert!(registry.available_units(&key("Z")).unwrap().is_empty());
    }

    #[test]
    fn registry_rejects_duplicate_version() {
        let registry = UnitRegistry::new();
        registry.register(unit("X", 4)).unwrap();
        let err = registry.register(unit("X", 4)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateVersion {
                lineage: key("X"),
                version: Version(4)
            }
        );

        // Same version in another lineage is fine
        assert!(registry.register(unit("Y", 4)).is_ok());
    }

    #[test]
    fn registry_sealed_after_ready() {
        let registry = UnitRegistry::new();
        registry.mark_ready();
        assert_eq!(registry.register(unit("X", 1)).unwrap_err(), RegistryError::Sealed);
    }

    #[test]
    fn registry_catalog_sorted() {
        let registry = UnitRegistry::with_units([unit("X", 7), unit("X", 2), unit("X", 5)]).unwrap();
        let versions: Vec<Version> = registry.catalog(&key("X")).iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![Version(2), Version(5), Version(7)]);
        assert_eq!(registry.lineages(), vec![key("X")]);
    }

    #[test]
    fn table_counts() {
        let mut table = UnitTable::new();
        assert!(table.is_empty());
        table.insert(unit("A", 1)).unwrap();
        table.insert(unit("B", 1)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lineages(), vec![key("A"), key("B")]);
    }

    proptest::proptest! {
        #[test]
        fn prop_catalog_sorted_and_deduplicated(versions in proptest::collection::vec(0u32..64, 0..32)) {
            let registry = UnitRegistry::new();
            let accepted = versions
                .iter()
                .filter(|v| registry.register(unit("X", **v)).is_ok())
                .count();

            let catalog: Vec<u32> = registry.catalog(&key("X")).iter().map(|m| m.version.get()).collect();
            let mut expected = versions.clone();
            expected.sort_unstable();
            expected.dedup();

            proptest::prop_assert_eq!(accepted, expected.len());
            proptest::prop_assert_eq!(catalog, expected);
        }
    }
}
