//! Testing utilities for the Upkeep workspace
//!
//! A toy configuration root, closure-backed units and pre-seeded stores.

#![allow(missing_docs)]

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use upkeep_ledger::{
    InstallationCeiling, InstallationRecord, LegacyDescriptor, LineageKey, MemoryStore, StoreState,
    Version,
};
use upkeep_unit::{FnUnit, UnitMeta, UnitRef};

/// Toy configuration graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Versions in the order their units touched the root
    pub applied: Vec<u32>,
    pub drop_rates: BTreeMap<String, f32>,
    pub item_groups: Vec<String>,
}

pub const SEASON6_DESCRIPTOR: LegacyDescriptor = LegacyDescriptor::new(6, 3);

pub fn lineage(key: &str) -> LineageKey {
    LineageKey::new(key).unwrap()
}

pub fn season6() -> LineageKey {
    lineage("Season6")
}

/// Fixed authoring timestamp so records compare equal across runs
pub fn authored_at(version: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(i64::from(version))
}

fn meta(lineage: &LineageKey, version: u32, name: &str) -> UnitMeta {
    UnitMeta::new(version, lineage.clone(), name).created_at(authored_at(version))
}

/// Mandatory unit appending its version to `applied`
pub fn unit(lineage: &LineageKey, version: u32) -> UnitRef<GameConfig> {
    let name = format!("update {version}");
    FnUnit::new(meta(lineage, version, &name), move |cfg: &mut GameConfig| {
        cfg.applied.push(version);
        Ok(())
    })
    .into_ref()
}

/// Optional unit appending its version to `applied`
pub fn optional_unit(lineage: &LineageKey, version: u32) -> UnitRef<GameConfig> {
    let name = format!("optional update {version}");
    FnUnit::new(
        meta(lineage, version, &name).mandatory(false),
        move |cfg: &mut GameConfig| {
            cfg.applied.push(version);
            Ok(())
        },
    )
    .into_ref()
}

/// Unit that mutates the root and then fails
pub fn failing_unit(lineage: &LineageKey, version: u32, message: &'static str) -> UnitRef<GameConfig> {
    FnUnit::new(meta(lineage, version, "broken update"), move |cfg: &mut GameConfig| {
        cfg.applied.push(version);
        cfg.item_groups.push("half-written".to_string());
        anyhow::bail!(message)
    })
    .into_ref()
}

/// Unit counting its invocations
pub fn counting_unit(
    lineage: &LineageKey,
    version: u32,
    calls: Arc<AtomicUsize>,
) -> UnitRef<GameConfig> {
    FnUnit::new(meta(lineage, version, "counted update"), move |cfg: &mut GameConfig| {
        calls.fetch_add(1, Ordering::SeqCst);
        cfg.applied.push(version);
        Ok(())
    })
    .into_ref()
}

/// Mandatory units for every version in `versions`
pub fn units(lineage: &LineageKey, versions: &[u32]) -> Vec<UnitRef<GameConfig>> {
    versions.iter().map(|v| unit(lineage, *v)).collect()
}

/// Completed ledger record
pub fn installed_record(version: u32) -> InstallationRecord {
    InstallationRecord::new(
        Version(version),
        format!("update {version}"),
        String::new(),
        authored_at(version),
    )
    .installed(authored_at(version))
}

/// Record written without an install timestamp
pub fn pending_record(version: u32) -> InstallationRecord {
    InstallationRecord::new(
        Version(version),
        format!("update {version}"),
        String::new(),
        authored_at(version),
    )
}

/// Store predating the ledger, identified only by `descriptor`
pub fn legacy_state(descriptor: LegacyDescriptor) -> StoreState<GameConfig> {
    StoreState::with_configuration(GameConfig::default()).with_descriptor(descriptor)
}

pub fn legacy_store(descriptor: LegacyDescriptor) -> MemoryStore<GameConfig> {
    MemoryStore::new(legacy_state(descriptor))
}

/// Store whose ledger already holds `installed` for `lineage`
pub fn seeded_store(lineage: &LineageKey, installed: &[u32]) -> MemoryStore<GameConfig> {
    let mut ceiling = InstallationCeiling::new();
    let mut state = StoreState::with_configuration(GameConfig::default());
    for version in installed {
        ceiling = ceiling.raise(Version(*version), lineage.clone());
        state = state.with_record(installed_record(*version));
    }
    if !installed.is_empty() {
        state = state.with_ceiling(ceiling);
    }
    MemoryStore::new(state)
}

/// Route `tracing` output to the test harness
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("upkeep=debug")),
        )
        .with_test_writer()
        .try_init();
}
