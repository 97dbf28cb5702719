//! Update planning
//!
//! Provides [`UpdatePlanner`], which diffs the registry against the ledger.
//!
//! A unit is pending when its version has no *installed* record. This is a
//! membership test, not a comparison with the ceiling: a fix authored later
//! with a lower version than already-installed units must still be planned.

use crate::error::UpdateError;
use std::collections::HashSet;
use std::sync::Arc;
use upkeep_ledger::{ConfigurationRoot, LineageKey, Version, WorkingContext};
use upkeep_unit::{MigrationRegistry, RegistryError, UnitMeta, UnitRef};

/// How to treat a registry that has not finished loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanMode {
    /// Startup pass that must see every unit; an unready registry is fatal
    #[default]
    Mandatory,
    /// Background check; an unready registry means nothing is pending yet
    BestEffort,
}

/// Ordered pending units of one lineage
pub struct UpdatePlan<R: ConfigurationRoot> {
    lineage: LineageKey,
    units: Vec<UnitRef<R>>,
}

impl<R: ConfigurationRoot> UpdatePlan<R> {
    /// Create a plan from units, sorting them by version
    #[must_use]
    pub fn new(lineage: LineageKey, mut units: Vec<UnitRef<R>>) -> Self {
        units.sort_by_key(|u| u.version());
        Self { lineage, units }
    }

    /// Lineage the plan was computed for
    #[inline]
    #[must_use]
    pub fn lineage(&self) -> &LineageKey {
        &self.lineage
    }

    /// Units ascending by version
    #[inline]
    #[must_use]
    pub fn units(&self) -> &[UnitRef<R>] {
        &self.units
    }

    /// Versions ascending
    #[must_use]
    pub fn versions(&self) -> Vec<Version> {
        self.units.iter().map(|u| u.version()).collect()
    }

    /// Metadata ascending by version
    #[must_use]
    pub fn metas(&self) -> Vec<UnitMeta> {
        self.units.iter().map(|u| u.meta().clone()).collect()
    }

    /// Number of pending units
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Plan restricted to mandatory units
    #[must_use]
    pub fn mandatory(&self) -> Self {
        self.filtered(|u| u.meta().is_mandatory)
    }

    /// Plan restricted to optional units
    #[must_use]
    pub fn optional(&self) -> Self {
        self.filtered(|u| !u.meta().is_mandatory)
    }

    /// Mandatory units plus the optional units an operator picked
    ///
    /// Chosen versions that are not pending are ignored.
    #[must_use]
    pub fn select(&self, chosen: &[Version]) -> Self {
        self.filtered(|u| u.meta().is_mandatory || chosen.contains(&u.version()))
    }

    /// Consume into the ordered units
    #[inline]
    #[must_use]
    pub fn into_units(self) -> Vec<UnitRef<R>> {
        self.units
    }

    fn filtered(&self, keep: impl Fn(&UnitRef<R>) -> bool) -> Self {
        Self {
            lineage: self.lineage.clone(),
            units: self.units.iter().filter(|u| keep(u)).cloned().collect(),
        }
    }
}

impl<R: ConfigurationRoot> Clone for UpdatePlan<R> {
    fn clone(&self) -> Self {
        Self {
            lineage: self.lineage.clone(),
            units: self.units.clone(),
        }
    }
}

impl<R: ConfigurationRoot> std::fmt::Debug for UpdatePlan<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePlan")
            .field("lineage", &self.lineage)
            .field("versions", &self.versions())
            .finish()
    }
}

/// Computes pending units from registry and ledger
pub struct UpdatePlanner<R: ConfigurationRoot> {
    registry: Arc<dyn MigrationRegistry<R>>,
}

impl<R: ConfigurationRoot> UpdatePlanner<R> {
    /// Create a planner over `registry`
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<dyn MigrationRegistry<R>>) -> Self {
        Self { registry }
    }

    /// Pending units of `lineage`, ascending by version
    ///
    /// # Errors
    /// - [`UpdateError::RegistryUnavailable`] in [`PlanMode::Mandatory`] when the
    ///   registry is still loading
    /// - [`UpdateError::Store`] when the ledger cannot be read
    #[tracing::instrument(level = "debug", skip(self, ctx, lineage), fields(lineage = %lineage))]
    pub async fn plan(
        &self,
        ctx: &mut dyn WorkingContext<R>,
        lineage: &LineageKey,
        mode: PlanMode,
    ) -> Result<UpdatePlan<R>, UpdateError> {
        let complete: HashSet<Version> = ctx
            .records()
            .await?
            .into_iter()
            .filter(|r| r.is_installed())
            .map(|r| r.version)
            .collect();

        let available = match self.registry.available_units(lineage) {
            Ok(units) => units,
            Err(RegistryError::NotReady) => match mode {
                PlanMode::Mandatory => {
                    tracing::error!("migration registry not ready for mandatory planning");
                    return Err(UpdateError::RegistryUnavailable {
                        lineage: lineage.clone(),
                    });
                }
                PlanMode::BestEffort => {
                    tracing::warn!("migration registry not ready; reporting no pending updates");
                    return Ok(UpdatePlan::new(lineage.clone(), Vec::new()));
                }
            },
            Err(e) => return Err(e.into()),
        };

        let known = available.len();
        let pending: Vec<UnitRef<R>> = available
            .into_iter()
            .filter(|u| !complete.contains(&u.version()))
            .collect();

        let plan = UpdatePlan::new(lineage.clone(), pending);
        tracing::debug!(
            known,
            installed = complete.len(),
            pending = plan.len(),
            "update plan computed"
        );
        Ok(plan)
    }
}

impl<R: ConfigurationRoot> std::fmt::Debug for UpdatePlanner<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePlanner")
            .field("registry_state", &self.registry.state())
            .finish()
    }
}
