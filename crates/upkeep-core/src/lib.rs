//! Upkeep Core - configuration update engine
//!
//! Brings a store's configuration graph up to date:
//! - Resolves which product lineage the store belongs to
//! - Plans the units of that lineage the ledger has no completed record for
//! - Applies them in version order, one commit per unit
//! - Reports progress and announces installed batches
//!
//! # Example
//!
//! ```rust,ignore
//! use upkeep_core::prelude::*;
//!
//! # async fn example(store: MemoryStore<GameConfig>, registry: UnitRegistry<GameConfig>) -> Result<(), UpdateError> {
//! let config = UpdateConfig::from_file("upkeep.toml")?;
//! init_tracing(&config.logging)?;
//!
//! let service = UpdateService::new(Arc::new(store), Arc::new(registry), config)?;
//! match service.install_mandatory(&TracingSink).await {
//!     Ok(report) => println!("{report}"),
//!     Err(e) => eprintln!("{}", UpdateService::<GameConfig>::failure_summary(&e)),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod lineage;
pub mod planner;
pub mod progress;
pub mod report;
pub mod service;
pub mod telemetry;

pub use config::{LoggingConfig, UpdateConfig};
pub use error::{ConfigError, UpdateError};
pub use events::{UpdateEvents, UpdatesInstalled};
pub use executor::UpdateExecutor;
pub use lineage::{LineageResolver, LineageRule, LineageTable};
pub use planner::{PlanMode, UpdatePlan, UpdatePlanner};
pub use progress::{ChannelSink, NullSink, ProgressSink, RecordingSink, TracingSink, UpdateProgress};
pub use report::{failure_summary, BatchReport, LedgerStatus};
pub use service::UpdateService;
pub use telemetry::init_tracing;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosts embedding the engine
    pub use crate::{
        init_tracing, BatchReport, PlanMode, ProgressSink, TracingSink, UpdateConfig, UpdateError,
        UpdateProgress, UpdateService,
    };
    pub use std::sync::Arc;
    pub use upkeep_ledger::{ContextProvider, JsonFileStore, LineageKey, MemoryStore, StoreState, Version};
    pub use upkeep_unit::{FnUnit, MigrationUnit, UnitMeta, UnitRegistry};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
