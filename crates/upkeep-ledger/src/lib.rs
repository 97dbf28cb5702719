//! Upkeep Installation Ledger
//!
//! Persisted bookkeeping of which configuration updates a store has received.
//!
//! # Core Concepts
//!
//! - [`Version`] / [`LineageKey`]: identity of an update within its lineage
//! - [`InstallationRecord`]: one row per known update; `installed_at` proves completion
//! - [`InstallationCeiling`]: per-store singleton with the highest installed version
//!   and the resolved lineage
//! - [`LegacyDescriptor`]: edition marker carried by stores older than the ledger
//! - [`WorkingContext`] / [`ContextProvider`]: the unit-of-work contract the engine
//!   talks to
//! - [`MemoryStore`] / [`JsonFileStore`]: reference stores implementing that contract
//!
//! # Example
//!
//! ```rust,ignore
//! use upkeep_ledger::{ContextProvider, MemoryStore, StoreState};
//!
//! let store = MemoryStore::new(StoreState::with_configuration(my_root));
//! let mut ctx = store.create_context().await?;
//! let records = ctx.records().await?;
//! ```

#![warn(unreachable_pub)]

mod file;
mod id;
mod memory;
mod record;
mod store;

pub use file::JsonFileStore;
pub use id::{InvalidLineageKey, LineageKey, Version};
pub use memory::MemoryStore;
pub use record::{InstallationCeiling, InstallationRecord, LegacyDescriptor};
pub use store::{ConfigurationRoot, ContextProvider, StoreError, StoreState, WorkingContext};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
