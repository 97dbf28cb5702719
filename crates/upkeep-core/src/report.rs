//! Batch and ledger reports
//!
//! Operator-facing summaries derived from executor results and ledger state.

use crate::error::UpdateError;
use chrono::{DateTime, Utc};
use std::fmt;
use upkeep_ledger::{LineageKey, Version};

/// Outcome of a successful executor pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Lineage of the units applied; `None` for an empty batch
    pub lineage: Option<LineageKey>,
    /// Versions committed, in application order
    pub installed: Vec<Version>,
    /// Ceiling after the batch
    pub ceiling: Option<Version>,
    /// Batch start
    pub started_at: DateTime<Utc>,
    /// Batch end
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Check if the batch installed nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.installed.first(), self.installed.last()) {
            (Some(first), Some(last)) if first == last => format!("installed update {first}"),
            (Some(first), Some(last)) => format!(
                "installed {} updates ({first} to {last})",
                self.installed.len()
            ),
            _ => "no updates installed".to_string(),
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// "installed up to V, failed at W" rendering of an execution error
///
/// When the failed unit sits below the ceiling (a late-registered lower
/// version), the ceiling is named as such instead.
/// Errors that did not come from executing a unit render as their message.
#[must_use]
pub fn failure_summary(error: &UpdateError) -> String {
    let Some(failed) = error.failed_version() else {
        return error.to_string();
    };
    let cause = match error {
        UpdateError::UnitApplicationFailure { source, .. } => format!("{source:#}"),
        UpdateError::CommitFailed { source, .. } => source.to_string(),
        other => other.to_string(),
    };
    match error.installed_up_to() {
        Some(ceiling) if ceiling > failed => {
            format!("ceiling {ceiling}, failed at version {failed}: {cause}")
        }
        Some(up_to) => format!("installed up to version {up_to}, failed at version {failed}: {cause}"),
        None => format!("no updates installed, failed at version {failed}: {cause}"),
    }
}

/// Snapshot of a store's ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    /// Lineage recorded in the ceiling
    pub lineage: Option<LineageKey>,
    /// Ceiling version
    pub ceiling: Option<Version>,
    /// Versions with an install timestamp, ascending
    pub installed: Vec<Version>,
    /// Versions with a record but no install timestamp, ascending
    pub pending_records: Vec<Version>,
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lineage = self.lineage.as_ref().map_or("unresolved", LineageKey::as_str);
        match self.ceiling {
            Some(ceiling) => write!(
                f,
                "{lineage}: {} updates installed, ceiling {ceiling}",
                self.installed.len()
            ),
            None => write!(f, "{lineage}: no updates installed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upkeep_ledger::StoreError;

    fn report(installed: &[u32]) -> BatchReport {
        BatchReport {
            lineage: LineageKey::new("X").ok(),
            installed: installed.iter().copied().map(Version).collect(),
            ceiling: installed.iter().copied().max().map(Version),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn batch_summary() {
        assert_eq!(report(&[]).summary(), "no updates installed");
        assert!(report(&[]).is_empty());
        assert_eq!(report(&[3]).summary(), "installed update v3");
        assert_eq!(report(&[1, 2, 3]).to_string(), "installed 3 updates (v1 to v3)");
    }

    #[test]
    fn failure_summary_with_progress() {
        let err = UpdateError::UnitApplicationFailure {
            version: Version(5),
            name: "five".to_string(),
            installed_up_to: Some(Version(4)),
            source: anyhow::anyhow!("missing item group"),
        };
        assert_eq!(
            failure_summary(&err),
            "installed up to version v4, failed at version v5: missing item group"
        );
    }

    #[test]
    fn failure_summary_below_ceiling() {
        let err = UpdateError::UnitApplicationFailure {
            version: Version(4),
            name: "four".to_string(),
            installed_up_to: Some(Version(7)),
            source: anyhow::anyhow!("bad drop table"),
        };
        assert_eq!(
            failure_summary(&err),
            "ceiling v7, failed at version v4: bad drop table"
        );
    }

    #[test]
    fn failure_summary_without_progress() {
        let err = UpdateError::CommitFailed {
            version: Version(1),
            installed_up_to: None,
            source: StoreError::CommitFailed("disk full".to_string()),
        };
        assert_eq!(
            failure_summary(&err),
            "no updates installed, failed at version v1: commit failed: disk full"
        );
    }

    #[test]
    fn failure_summary_other_errors() {
        let err = UpdateError::UnresolvableLineage { descriptor: None };
        assert_eq!(failure_summary(&err), err.to_string());
    }

    #[test]
    fn ledger_status_display() {
        let status = LedgerStatus {
            lineage: LineageKey::new("Season6").ok(),
            ceiling: Some(Version(12)),
            installed: vec![Version(11), Version(12)],
            pending_records: vec![],
        };
        assert_eq!(status.to_string(), "Season6: 2 updates installed, ceiling v12");

        let empty = LedgerStatus {
            lineage: None,
            ceiling: None,
            installed: vec![],
            pending_records: vec![],
        };
        assert_eq!(empty.to_string(), "unresolved: no updates installed");
    }
}
