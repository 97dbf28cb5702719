//! Upkeep Migration Units
//!
//! The unit contract and the registry the planner draws units from.
//!
//! # Core Concepts
//!
//! - [`MigrationUnit`]: single-method capability every update implements
//! - [`UnitMeta`]: version, lineage, name, description, mandatory flag, authoring time
//! - [`FnUnit`]: closure-backed unit for updates that only touch the root
//! - [`MigrationRegistry`]: "all known units for a lineage" contract
//! - [`UnitRegistry`]: reference registry over a central [`UnitTable`]
//!
//! # Example
//!
//! ```rust,ignore
//! use upkeep_unit::{FnUnit, UnitMeta, UnitRegistry};
//!
//! let season6 = LineageKey::new("Season6")?;
//! let registry = UnitRegistry::new();
//! registry.register(
//!     FnUnit::new(UnitMeta::new(1, season6, "fix drop rates"), |cfg: &mut GameConfig| {
//!         cfg.drop_rate = 0.3;
//!         Ok(())
//!     })
//!     .into_ref(),
//! )?;
//! registry.mark_ready();
//! ```

#![warn(unreachable_pub)]

mod registry;
mod unit;

pub use registry::{MigrationRegistry, RegistryError, RegistryState, UnitRegistry, UnitTable};
pub use unit::{FnUnit, MigrationUnit, UnitMeta, UnitRef};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
