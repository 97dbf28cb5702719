//! Update service
//!
//! Startup-flow facade: resolve lineage, plan, filter, execute. Hosts hold one
//! [`UpdateService`] per store.

use crate::config::UpdateConfig;
use crate::error::UpdateError;
use crate::events::UpdateEvents;
use crate::executor::UpdateExecutor;
use crate::lineage::LineageResolver;
use crate::planner::{PlanMode, UpdatePlan, UpdatePlanner};
use crate::progress::ProgressSink;
use crate::report::{self, BatchReport, LedgerStatus};
use std::sync::Arc;
use upkeep_ledger::{ConfigurationRoot, ContextProvider, LineageKey};
use upkeep_unit::{MigrationRegistry, UnitMeta, UnitRef};

/// Configuration update service for one store
pub struct UpdateService<R: ConfigurationRoot> {
    store: Arc<dyn ContextProvider<R>>,
    resolver: LineageResolver,
    planner: UpdatePlanner<R>,
    executor: UpdateExecutor<R>,
    config: UpdateConfig,
}

impl<R: ConfigurationRoot> UpdateService<R> {
    /// Wire a service over `store` and `registry`
    ///
    /// # Errors
    /// [`UpdateError::Config`] when the configured lineage rules are invalid.
    pub fn new(
        store: Arc<dyn ContextProvider<R>>,
        registry: Arc<dyn MigrationRegistry<R>>,
        config: UpdateConfig,
    ) -> Result<Self, UpdateError> {
        let resolver = LineageResolver::new(config.lineage_table()?);
        let executor = UpdateExecutor::new(Arc::clone(&store), UpdateEvents::new());
        Ok(Self {
            store,
            resolver,
            planner: UpdatePlanner::new(registry),
            executor,
            config,
        })
    }

    /// Event hub receiving [`crate::UpdatesInstalled`]
    #[inline]
    #[must_use]
    pub fn events(&self) -> &UpdateEvents {
        self.executor.events()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Resolve the store's lineage
    ///
    /// # Errors
    /// [`UpdateError::UnresolvableLineage`] or a store error.
    pub async fn resolve_lineage(&self) -> Result<LineageKey, UpdateError> {
        let mut ctx = self.store.create_context().await?;
        self.resolver.resolve(ctx.as_mut()).await
    }

    /// Resolve the lineage and compute the pending plan
    ///
    /// The context used for planning is discarded; nothing is written.
    ///
    /// # Errors
    /// Resolution errors, or planner errors for `mode`.
    pub async fn plan(&self, mode: PlanMode) -> Result<UpdatePlan<R>, UpdateError> {
        let mut ctx = self.store.create_context().await?;
        let lineage = self.resolver.resolve(ctx.as_mut()).await?;
        self.planner.plan(ctx.as_mut(), &lineage, mode).await
    }

    /// Install a caller-chosen selection of units
    ///
    /// # Errors
    /// The first execution failure of the batch.
    pub async fn install(
        &self,
        units: &[UnitRef<R>],
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, UpdateError> {
        self.executor.apply(units, sink).await
    }

    /// Startup pass
    ///
    /// Plans in [`PlanMode::Mandatory`], keeps the mandatory units (and the
    /// optional ones when `apply_optional_updates` is set) and installs them.
    ///
    /// # Errors
    /// Planning or execution failures.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn install_mandatory(&self, sink: &dyn ProgressSink) -> Result<BatchReport, UpdateError> {
        let plan = self.plan(PlanMode::Mandatory).await?;
        let selected = if self.config.apply_optional_updates {
            plan
        } else {
            let skipped = plan.optional().len();
            if skipped > 0 {
                tracing::info!(skipped, lineage = %plan.lineage(), "optional updates left for the operator");
            }
            plan.mandatory()
        };
        self.executor.apply(selected.units(), sink).await
    }

    /// Background check for pending updates; never applies anything
    ///
    /// A registry that is still loading yields an empty list.
    ///
    /// # Errors
    /// Resolution or store failures.
    pub async fn check_for_updates(&self) -> Result<Vec<UnitMeta>, UpdateError> {
        let plan = self.plan(PlanMode::BestEffort).await?;
        if !plan.is_empty() {
            tracing::info!(lineage = %plan.lineage(), pending = plan.len(), "updates available");
        }
        Ok(plan.metas())
    }

    /// Read the ledger of the store
    ///
    /// # Errors
    /// Store failures.
    pub async fn status(&self) -> Result<LedgerStatus, UpdateError> {
        let mut ctx = self.store.create_context().await?;
        let ceiling = ctx.ceiling().await?.unwrap_or_default();

        let mut installed = Vec::new();
        let mut pending_records = Vec::new();
        for record in ctx.records().await? {
            if record.is_installed() {
                installed.push(record.version);
            } else {
                pending_records.push(record.version);
            }
        }
        installed.sort_unstable();
        pending_records.sort_unstable();

        Ok(LedgerStatus {
            lineage: ceiling.lineage,
            ceiling: ceiling.current_installed_version,
            installed,
            pending_records,
        })
    }

    /// Operator-facing rendering of an execution failure
    #[inline]
    #[must_use]
    pub fn failure_summary(error: &UpdateError) -> String {
        report::failure_summary(error)
    }
}

impl<R: ConfigurationRoot> std::fmt::Debug for UpdateService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateService")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
