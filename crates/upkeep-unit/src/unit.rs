//! Migration unit contract
//!
//! A unit is one versioned, named change to the configuration root. The
//! engine only reads its [`UnitMeta`] and calls [`MigrationUnit::apply`];
//! what the unit does to the root is its own business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use upkeep_ledger::{ConfigurationRoot, InstallationRecord, LineageKey, Version, WorkingContext};

/// Shared handle to a registered unit
pub type UnitRef<R> = Arc<dyn MigrationUnit<R>>;

/// Descriptive metadata of a unit
///
/// Immutable once the unit is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMeta {
    /// Version, unique within the lineage
    pub version: Version,
    /// Lineage this unit belongs to
    pub lineage: LineageKey,
    /// Short name
    pub name: String,
    /// Longer description
    pub description: String,
    /// Advisory flag for callers; the engine plans optional units too
    pub is_mandatory: bool,
    /// Authoring timestamp
    pub created_at: DateTime<Utc>,
}

impl UnitMeta {
    /// Create metadata for a mandatory unit authored now
    #[must_use]
    pub fn new(version: u32, lineage: LineageKey, name: impl Into<String>) -> Self {
        Self {
            version: Version(version),
            lineage,
            name: name.into(),
            description: String::new(),
            is_mandatory: true,
            created_at: Utc::now(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With mandatory flag
    #[inline]
    #[must_use]
    pub fn mandatory(mut self, is_mandatory: bool) -> Self {
        self.is_mandatory = is_mandatory;
        self
    }

    /// With authoring timestamp
    #[inline]
    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Pending ledger record carrying a snapshot of this metadata
    #[must_use]
    pub fn to_record(&self) -> InstallationRecord {
        InstallationRecord::new(
            self.version,
            self.name.clone(),
            self.description.clone(),
            self.created_at,
        )
    }
}

impl fmt::Display for UnitMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.lineage, self.version, self.name)
    }
}

/// One versioned change to the configuration root
///
/// `apply` is called at most once per version and store by the engine; no
/// guarantee is made about calling it twice.
#[async_trait]
pub trait MigrationUnit<R: ConfigurationRoot>: Send + Sync {
    /// Unit metadata
    fn meta(&self) -> &UnitMeta;

    /// Mutate `root` inside `ctx`
    ///
    /// Any error aborts the unit's transaction and the rest of the batch.
    async fn apply(&self, ctx: &mut dyn WorkingContext<R>, root: &mut R) -> anyhow::Result<()>;

    /// Shorthand for `meta().version`
    fn version(&self) -> Version {
        self.meta().version
    }
}

/// Unit backed by a plain closure over the configuration root
///
/// Suits the common case of a unit that only touches the root.
pub struct FnUnit<R, F> {
    meta: UnitMeta,
    body: F,
    _root: PhantomData<fn(&mut R)>,
}

impl<R, F> FnUnit<R, F>
where
    R: ConfigurationRoot,
    F: Fn(&mut R) -> anyhow::Result<()> + Send + Sync + 'static,
{
    /// Create a unit from metadata and body
    #[must_use]
    pub fn new(meta: UnitMeta, body: F) -> Self {
        Self {
            meta,
            body,
            _root: PhantomData,
        }
    }

    /// Box into a shared unit handle
    #[must_use]
    pub fn into_ref(self) -> UnitRef<R> {
        Arc::new(self)
    }
}

impl<R, F> fmt::Debug for FnUnit<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnit").field("meta", &self.meta).finish_non_exhaustive()
    }
}

#[async_trait]
impl<R, F> MigrationUnit<R> for FnUnit<R, F>
where
    R: ConfigurationRoot,
    F: Fn(&mut R) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn meta(&self) -> &UnitMeta {
        &self.meta
    }

    async fn apply(&self, _ctx: &mut dyn WorkingContext<R>, root: &mut R) -> anyhow::Result<()> {
        (self.body)(root)
    }
}
