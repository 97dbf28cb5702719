//! Update execution
//!
//! Provides [`UpdateExecutor`]. Each unit runs in its own working context:
//! the unit's mutation, its installation record and the raised ceiling are
//! committed together or not at all. A failing unit stops the batch; units
//! committed before it stay committed.

use crate::error::UpdateError;
use crate::events::{UpdateEvents, UpdatesInstalled};
use crate::progress::{ProgressSink, UpdateProgress};
use crate::report::BatchReport;
use chrono::Utc;
use std::sync::Arc;
use upkeep_ledger::{ConfigurationRoot, ContextProvider, InstallationCeiling, StoreError, Version};
use upkeep_unit::UnitRef;

/// Why a single unit did not commit
enum UnitFailure {
    Apply(anyhow::Error),
    Store(StoreError),
}

impl From<StoreError> for UnitFailure {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Applies planned units one commit at a time
pub struct UpdateExecutor<R: ConfigurationRoot> {
    store: Arc<dyn ContextProvider<R>>,
    events: UpdateEvents,
}

impl<R: ConfigurationRoot> UpdateExecutor<R> {
    /// Create an executor over `store`, publishing to `events`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn ContextProvider<R>>, events: UpdateEvents) -> Self {
        Self { store, events }
    }

    /// Event hub this executor publishes to
    #[inline]
    #[must_use]
    pub fn events(&self) -> &UpdateEvents {
        &self.events
    }

    /// Apply `units` in the given order
    ///
    /// # Workflow
    /// For every unit: report start, open a context, run the unit against a
    /// staged root, raise the ceiling, write the record, commit, report
    /// completion. The first failure ends the batch.
    ///
    /// [`UpdateProgress::Finished`] is reported after the loop in every case.
    /// [`UpdatesInstalled`] is published only when the whole batch committed
    /// and installed at least one unit.
    ///
    /// # Errors
    /// - [`UpdateError::UnitApplicationFailure`] when a unit's `apply` fails
    /// - [`UpdateError::CommitFailed`] when the store rejects a unit's changes
    #[tracing::instrument(level = "info", skip_all, fields(units = units.len()))]
    pub async fn apply(
        &self,
        units: &[UnitRef<R>],
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, UpdateError> {
        let started_at = Utc::now();
        let mut installed = Vec::with_capacity(units.len());
        let mut ceiling = None;

        let outcome = self
            .apply_all(units, sink, &mut installed, &mut ceiling)
            .await;
        sink.report(UpdateProgress::Finished);
        outcome?;

        let lineage = units.last().map(|u| u.meta().lineage.clone());
        let report = BatchReport {
            lineage: lineage.clone(),
            installed,
            ceiling,
            started_at,
            finished_at: Utc::now(),
        };

        if let Some(lineage) = lineage {
            tracing::info!(%lineage, "{}", report.summary());
            self.events.publish(UpdatesInstalled {
                lineage,
                versions: report.installed.clone(),
                ceiling: report.ceiling,
            });
        }
        Ok(report)
    }

    async fn apply_all(
        &self,
        units: &[UnitRef<R>],
        sink: &dyn ProgressSink,
        installed: &mut Vec<Version>,
        ceiling: &mut Option<Version>,
    ) -> Result<(), UpdateError> {
        for unit in units {
            let meta = unit.meta();
            sink.report(UpdateProgress::Started(meta.version));
            tracing::info!(update = %meta, "installing update");

            match self.apply_one(unit, ceiling).await {
                Ok(raised) => {
                    *ceiling = raised.current_installed_version;
                    installed.push(meta.version);
                    sink.report(UpdateProgress::Completed(meta.version));
                }
                Err(UnitFailure::Apply(source)) => {
                    tracing::error!(update = %meta, error = %format!("{source:#}"), "update failed; batch aborted");
                    return Err(UpdateError::UnitApplicationFailure {
                        version: meta.version,
                        name: meta.name.clone(),
                        installed_up_to: *ceiling,
                        source,
                    });
                }
                Err(UnitFailure::Store(source)) => {
                    tracing::error!(update = %meta, error = %source, "update could not be committed; batch aborted");
                    return Err(UpdateError::CommitFailed {
                        version: meta.version,
                        installed_up_to: *ceiling,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Run one unit in its own context and commit it
    ///
    /// `ceiling` is refreshed from the ledger before the unit runs so a failure
    /// reports the true installed version even on the batch's first unit.
    async fn apply_one(
        &self,
        unit: &UnitRef<R>,
        ceiling: &mut Option<Version>,
    ) -> Result<InstallationCeiling, UnitFailure> {
        let meta = unit.meta();
        let mut ctx = self.store.create_context().await?;

        let current = ctx.ceiling().await?.unwrap_or_default();
        *ceiling = current.current_installed_version;

        let mut root = ctx.load_configuration().await?;
        unit.apply(ctx.as_mut(), &mut root)
            .await
            .map_err(UnitFailure::Apply)?;
        ctx.stage_configuration(root)?;

        let raised = current.raise(meta.version, meta.lineage.clone());
        ctx.put_ceiling(raised.clone())?;
        ctx.upsert_record(meta.to_record().installed(Utc::now()))?;
        ctx.save_changes().await?;

        tracing::debug!(
            update = %meta,
            ceiling = ?raised.current_installed_version,
            "update committed"
        );
        Ok(raised)
    }
}

impl<R: ConfigurationRoot> std::fmt::Debug for UpdateExecutor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateExecutor")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
