//! Lineage resolution
//!
//! A store that already carries an installation ceiling knows its lineage.
//! Older stores only carry a [`LegacyDescriptor`]; those are mapped through an
//! explicit [`LineageTable`]. Anything else is refused rather than guessed,
//! because applying one lineage's updates to another lineage's data corrupts it.

use crate::error::{ConfigError, UpdateError};
use serde::{Deserialize, Serialize};
use upkeep_ledger::{ConfigurationRoot, LegacyDescriptor, LineageKey, WorkingContext};

/// Lineage used by the sixth season, third episode edition
pub const SEASON6: &str = "Season6";
/// Lineage used by the 0.75 edition
pub const VERSION075: &str = "Version075";
/// Lineage used by the 0.95d edition
pub const VERSION095D: &str = "Version095d";

/// One descriptor → lineage mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRule {
    /// Product season
    pub season: u16,
    /// Product episode
    pub episode: u16,
    /// Lineage for stores with this descriptor
    pub lineage: LineageKey,
}

impl LineageRule {
    /// Create a rule
    #[must_use]
    pub fn new(season: u16, episode: u16, lineage: LineageKey) -> Self {
        Self {
            season,
            episode,
            lineage,
        }
    }

    /// Descriptor matched by this rule
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> LegacyDescriptor {
        LegacyDescriptor::new(self.season, self.episode)
    }
}

/// Fixed lookup table from legacy descriptors to lineages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageTable {
    rules: Vec<LineageRule>,
}

impl LineageTable {
    /// Build a table, rejecting two rules for one descriptor
    pub fn new(rules: Vec<LineageRule>) -> Result<Self, ConfigError> {
        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|r| r.descriptor() == rule.descriptor()) {
                return Err(ConfigError::DuplicateLineageRule(rule.descriptor()));
            }
        }
        Ok(Self { rules })
    }

    /// Lineage mapped to `descriptor`
    #[must_use]
    pub fn lookup(&self, descriptor: LegacyDescriptor) -> Option<&LineageKey> {
        self.rules
            .iter()
            .find(|r| r.descriptor() == descriptor)
            .map(|r| &r.lineage)
    }

    /// All rules in declaration order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[LineageRule] {
        &self.rules
    }
}

impl Default for LineageTable {
    fn default() -> Self {
        let rules = [(6, 3, SEASON6), (0, 75, VERSION075), (0, 95, VERSION095D)]
            .into_iter()
            .filter_map(|(season, episode, key)| {
                Some(LineageRule::new(season, episode, LineageKey::new(key).ok()?))
            })
            .collect();
        Self { rules }
    }
}

/// Resolves the lineage of a store
#[derive(Debug, Clone, Default)]
pub struct LineageResolver {
    table: LineageTable,
}

impl LineageResolver {
    /// Create a resolver over `table`
    #[inline]
    #[must_use]
    pub fn new(table: LineageTable) -> Self {
        Self { table }
    }

    /// Determine the lineage of the store behind `ctx`
    ///
    /// # Resolution
    /// 1. A ceiling carrying a lineage wins, whatever the descriptor says
    /// 2. Otherwise the legacy descriptor is looked up in the table
    /// 3. A missing or unmapped descriptor fails with
    ///    [`UpdateError::UnresolvableLineage`]
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn resolve<R: ConfigurationRoot>(
        &self,
        ctx: &mut dyn WorkingContext<R>,
    ) -> Result<LineageKey, UpdateError> {
        if let Some(lineage) = ctx.ceiling().await?.and_then(|c| c.lineage) {
            tracing::debug!(%lineage, "lineage taken from installation ceiling");
            return Ok(lineage);
        }

        let descriptor = ctx.legacy_descriptor().await?;
        match descriptor.and_then(|d| self.table.lookup(d)) {
            Some(lineage) => {
                tracing::info!(%lineage, descriptor = ?descriptor, "lineage inferred from legacy descriptor");
                Ok(lineage.clone())
            }
            None => {
                tracing::error!(descriptor = ?descriptor, "cannot resolve configuration lineage");
                Err(UpdateError::UnresolvableLineage { descriptor })
            }
        }
    }
}
