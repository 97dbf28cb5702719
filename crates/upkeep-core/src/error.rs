//! Error types for Upkeep Core
//!
//! Provides error handling for:
//! - Lineage resolution of stores without ledger state
//! - Planning against a registry that is not ready
//! - Unit application and commit failures
//! - Configuration loading

use upkeep_ledger::{LegacyDescriptor, LineageKey, StoreError, Version};
use upkeep_unit::RegistryError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// No ceiling lineage and no matching legacy descriptor
    #[error("cannot resolve configuration lineage: {}", describe_descriptor(.descriptor.as_ref()))]
    UnresolvableLineage {
        /// Descriptor found on the store, if any
        descriptor: Option<LegacyDescriptor>,
    },

    /// Mandatory planning pass against a registry still loading
    #[error("migration registry unavailable while planning lineage {lineage}")]
    RegistryUnavailable {
        /// Lineage being planned
        lineage: LineageKey,
    },

    /// A unit's `apply` failed; its transaction was discarded
    #[error("update {version} ({name}) failed: {source}")]
    UnitApplicationFailure {
        /// Failing unit version
        version: Version,
        /// Failing unit name
        name: String,
        /// Last version committed in this batch or before it
        installed_up_to: Option<Version>,
        /// Error raised by the unit
        #[source]
        source: anyhow::Error,
    },

    /// A unit applied but its commit was rejected
    #[error("commit of update {version} failed: {source}")]
    CommitFailed {
        /// Version whose commit failed
        version: Version,
        /// Last version committed in this batch or before it
        installed_up_to: Option<Version>,
        /// Store error
        #[source]
        source: StoreError,
    },

    /// Store failure outside a unit commit
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Registry failure other than readiness
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn describe_descriptor(descriptor: Option<&LegacyDescriptor>) -> String {
    match descriptor {
        Some(d) => format!("no lineage mapped for {d}"),
        None => "store has neither a ledger lineage nor a legacy descriptor".to_string(),
    }
}

impl UpdateError {
    /// Check if the error must stop startup
    ///
    /// Resolution and mandatory registry failures need an operator; unit and
    /// commit failures stop the batch but leave earlier commits in place.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnresolvableLineage { .. } | Self::RegistryUnavailable { .. } | Self::Config(_)
        )
    }

    /// Version at which a batch stopped, if this is an execution error
    #[must_use]
    pub fn failed_version(&self) -> Option<Version> {
        match self {
            Self::UnitApplicationFailure { version, .. } | Self::CommitFailed { version, .. } => {
                Some(*version)
            }
            _ => None,
        }
    }

    /// Highest version committed before an execution error
    #[must_use]
    pub fn installed_up_to(&self) -> Option<Version> {
        match self {
            Self::UnitApplicationFailure {
                installed_up_to, ..
            }
            | Self::CommitFailed {
                installed_up_to, ..
            } => *installed_up_to,
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Two lineage rules share a descriptor
    #[error("duplicate lineage rule for {0}")]
    DuplicateLineageRule(LegacyDescriptor),

    /// Logging filter directive rejected
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidLogFilter {
        /// Rejected directive
        filter: String,
        /// Parser message
        reason: String,
    },
}
