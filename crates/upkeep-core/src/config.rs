//! Engine configuration
//!
//! [`UpdateConfig`] is deserialized from TOML; every field has a default so an
//! empty document is a valid configuration.
//!
//! ```toml
//! apply_optional_updates = false
//!
//! [logging]
//! filter = "upkeep=debug,info"
//! json = false
//!
//! [[lineage_rules]]
//! season = 6
//! episode = 3
//! lineage = "Season6"
//! ```

use crate::error::ConfigError;
use crate::lineage::{LineageRule, LineageTable};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Install optional updates during the startup pass
    pub apply_optional_updates: bool,
    /// Legacy descriptor → lineage mapping
    pub lineage_rules: Vec<LineageRule>,
    /// Logging setup
    pub logging: LoggingConfig,
}

impl UpdateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.lineage_table()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// With optional updates included in the startup pass
    #[inline]
    #[must_use]
    pub fn with_optional_updates(mut self, apply: bool) -> Self {
        self.apply_optional_updates = apply;
        self
    }

    /// With lineage rules replacing the defaults
    #[inline]
    #[must_use]
    pub fn with_lineage_rules(mut self, rules: Vec<LineageRule>) -> Self {
        self.lineage_rules = rules;
        self
    }

    /// With logging setup
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Validated lineage table built from the rules
    pub fn lineage_table(&self) -> Result<LineageTable, ConfigError> {
        LineageTable::new(self.lineage_rules.clone())
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            apply_optional_updates: false,
            lineage_rules: LineageTable::default().rules().to_vec(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
