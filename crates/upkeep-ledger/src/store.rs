//! Unit-of-work contract between the engine and persistence
//!
//! The engine never queries storage directly. It opens a [`WorkingContext`]
//! through a [`ContextProvider`], reads ledger rows and the configuration root,
//! stages changes, and commits them with [`WorkingContext::save_changes`].
//! Dropping a context without saving discards everything staged in it.

use crate::id::Version;
use crate::record::{InstallationCeiling, InstallationRecord, LegacyDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bound for the configuration object graph a store owns
pub trait ConfigurationRoot: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> ConfigurationRoot for T {}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O failed
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// State could not be (de)serialized
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Commit was rejected by the backend
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// Store holds no configuration root
    #[error("store has no configuration root")]
    MissingConfiguration,

    /// Context was already committed
    #[error("working context already closed")]
    ContextClosed,
}

/// Complete persisted state of a store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "R: Serialize",
    deserialize = "R: serde::de::DeserializeOwned"
))]
pub struct StoreState<R> {
    /// Live configuration root
    pub configuration: Option<R>,
    /// Legacy edition marker
    pub descriptor: Option<LegacyDescriptor>,
    /// Installation records keyed by version
    pub records: BTreeMap<Version, InstallationRecord>,
    /// Installation ceiling
    pub ceiling: Option<InstallationCeiling>,
}

impl<R> Default for StoreState<R> {
    fn default() -> Self {
        Self {
            configuration: None,
            descriptor: None,
            records: BTreeMap::new(),
            ceiling: None,
        }
    }
}

impl<R> StoreState<R> {
    /// Empty state around a configuration root
    #[must_use]
    pub fn with_configuration(configuration: R) -> Self {
        Self {
            configuration: Some(configuration),
            ..Self::default()
        }
    }

    /// With legacy descriptor
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: LegacyDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// With ceiling
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: InstallationCeiling) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// With record (replaces any record of the same version)
    #[must_use]
    pub fn with_record(mut self, record: InstallationRecord) -> Self {
        self.records.insert(record.version, record);
        self
    }

    /// Versions whose record carries an install timestamp
    #[must_use]
    pub fn installed_versions(&self) -> Vec<Version> {
        self.records
            .values()
            .filter(|r| r.is_installed())
            .map(|r| r.version)
            .collect()
    }
}

/// One unit of work against a store
#[async_trait]
pub trait WorkingContext<R: ConfigurationRoot>: Send {
    /// All installation records
    async fn records(&mut self) -> Result<Vec<InstallationRecord>, StoreError>;

    /// The installation ceiling, if one was written
    async fn ceiling(&mut self) -> Result<Option<InstallationCeiling>, StoreError>;

    /// Legacy edition marker, if the store has one
    async fn legacy_descriptor(&mut self) -> Result<Option<LegacyDescriptor>, StoreError>;

    /// Staged copy of the configuration root
    async fn load_configuration(&mut self) -> Result<R, StoreError>;

    /// Replace the staged configuration root
    fn stage_configuration(&mut self, root: R) -> Result<(), StoreError>;

    /// Insert or replace the record for `record.version`
    fn upsert_record(&mut self, record: InstallationRecord) -> Result<(), StoreError>;

    /// Insert or replace the ceiling
    fn put_ceiling(&mut self, ceiling: InstallationCeiling) -> Result<(), StoreError>;

    /// Commit everything staged in this context atomically
    async fn save_changes(&mut self) -> Result<(), StoreError>;
}

/// Factory of working contexts
#[async_trait]
pub trait ContextProvider<R: ConfigurationRoot>: Send + Sync {
    /// Open a fresh context over the latest committed state
    async fn create_context(&self) -> Result<Box<dyn WorkingContext<R>>, StoreError>;
}

/// Commit target behind a [`StagedContext`]
#[async_trait]
pub(crate) trait StateBackend<R>: Send + Sync {
    /// Latest committed state
    fn snapshot(&self) -> StoreState<R>;

    /// Replace committed state
    async fn commit(&self, state: StoreState<R>) -> Result<(), StoreError>;
}

/// Snapshot-isolated context shared by the reference stores
pub(crate) struct StagedContext<R> {
    backend: std::sync::Arc<dyn StateBackend<R>>,
    staged: StoreState<R>,
    closed: bool,
}

impl<R: ConfigurationRoot> StagedContext<R> {
    pub(crate) fn new(backend: std::sync::Arc<dyn StateBackend<R>>) -> Self {
        let staged = backend.snapshot();
        Self {
            backend,
            staged,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::ContextClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl<R: ConfigurationRoot> WorkingContext<R> for StagedContext<R> {
    async fn records(&mut self) -> Result<Vec<InstallationRecord>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.records.values().cloned().collect())
    }

    async fn ceiling(&mut self) -> Result<Option<InstallationCeiling>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.ceiling.clone())
    }

    async fn legacy_descriptor(&mut self) -> Result<Option<LegacyDescriptor>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.descriptor)
    }

    async fn load_configuration(&mut self) -> Result<R, StoreError> {
        self.ensure_open()?;
        self.staged
            .configuration
            .clone()
            .ok_or(StoreError::MissingConfiguration)
    }

    fn stage_configuration(&mut self, root: R) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.staged.configuration = Some(root);
        Ok(())
    }

    fn upsert_record(&mut self, record: InstallationRecord) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.staged.records.insert(record.version, record);
        Ok(())
    }

    fn put_ceiling(&mut self, ceiling: InstallationCeiling) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.staged.ceiling = Some(ceiling);
        Ok(())
    }

    async fn save_changes(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let state = std::mem::take(&mut self.staged);
        self.closed = true;
        self.backend.commit(state).await
    }
}
