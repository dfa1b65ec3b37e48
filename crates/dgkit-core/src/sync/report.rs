//! Outcome of a sync run.

use crate::error::Error;
use crate::identity::UnitId;
use std::fmt;

/// Phases of a sync run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncPhase {
    Delete,
    AddRows,
    AddPages,
    UpdateRows,
    UpdatePages,
}

impl SyncPhase {
    /// All phases, in execution order.
    pub const ALL: [SyncPhase; 5] = [
        SyncPhase::Delete,
        SyncPhase::AddRows,
        SyncPhase::AddPages,
        SyncPhase::UpdateRows,
        SyncPhase::UpdatePages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Delete => "delete",
            SyncPhase::AddRows => "add-rows",
            SyncPhase::AddPages => "add-pages",
            SyncPhase::UpdateRows => "update-rows",
            SyncPhase::UpdatePages => "update-pages",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit that could not be synced in one phase.
#[derive(Debug)]
pub struct SyncFailure {
    /// The unit being synced.
    pub unit_id: UnitId,
    /// Phase the failure happened in.
    pub phase: SyncPhase,
    /// The underlying error.
    pub error: Error,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.unit_id, self.error)
    }
}

/// Result of a sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Units removed from the catalog.
    pub deleted: Vec<UnitId>,
    /// Units whose row was created.
    pub rows_added: Vec<UnitId>,
    /// Units whose page was created.
    pub pages_added: Vec<UnitId>,
    /// Units whose row was rewritten.
    pub rows_updated: Vec<UnitId>,
    /// Units whose page was rewritten.
    pub pages_updated: Vec<UnitId>,
    /// Row and page updates skipped because nothing changed.
    pub unchanged: usize,
    /// Per-unit failures, in the order they happened.
    pub failures: Vec<SyncFailure>,
    /// Set instead of the counters when the run was a dry run.
    pub planned: Option<SyncPlan>,
    /// Error saving the mirror after the phases ran.
    pub checkpoint_error: Option<Error>,
}

impl SyncReport {
    /// Check if every unit synced and the mirror was saved.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.checkpoint_error.is_none()
    }

    /// Number of calls that changed the catalog.
    pub fn total_writes(&self) -> usize {
        self.deleted.len()
            + self.rows_added.len()
            + self.pages_added.len()
            + self.rows_updated.len()
            + self.pages_updated.len()
    }

    /// Failures recorded in `phase`.
    pub fn failures_in(&self, phase: SyncPhase) -> impl Iterator<Item = &SyncFailure> {
        self.failures.iter().filter(move |f| f.phase == phase)
    }

    /// Check if `id` failed in any phase.
    pub fn has_failed(&self, id: &UnitId) -> bool {
        self.failures.iter().any(|f| &f.unit_id == id)
    }

    pub(crate) fn record_failure(&mut self, unit_id: UnitId, phase: SyncPhase, error: Error) {
        self.failures.push(SyncFailure {
            unit_id,
            phase,
            error,
        });
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deleted: {}, rows added: {}, pages added: {}, rows updated: {}, pages updated: {}, unchanged: {}, failures: {}",
            self.deleted.len(),
            self.rows_added.len(),
            self.pages_added.len(),
            self.rows_updated.len(),
            self.pages_updated.len(),
            self.unchanged,
            self.failures.len()
        )?;
        if let Some(error) = &self.checkpoint_error {
            write!(f, ", checkpoint failed: {}", error)?;
        }
        Ok(())
    }
}

/// What a sync run would do, computed without touching the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Ids in the catalog but not in the model.
    pub to_delete: Vec<UnitId>,
    /// Ids in the model but not in the catalog; each gets a row and a page.
    pub to_add: Vec<UnitId>,
    /// Ids whose row is rewritten.
    pub rows_to_update: Vec<UnitId>,
    /// Ids whose page is rewritten.
    pub pages_to_update: Vec<UnitId>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty()
            && self.to_add.is_empty()
            && self.rows_to_update.is_empty()
            && self.pages_to_update.is_empty()
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "to delete: {}, to add: {}, rows to update: {}, pages to update: {}",
            self.to_delete.len(),
            self.to_add.len(),
            self.rows_to_update.len(),
            self.pages_to_update.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::assign_id;

    #[test]
    fn test_report_counts() {
        let mut report = SyncReport::default();
        report.rows_added.push(assign_id("orders"));
        report.pages_added.push(assign_id("orders"));
        report.record_failure(
            assign_id("orders.id"),
            SyncPhase::AddPages,
            Error::not_found("entity", "x"),
        );

        assert!(!report.is_success());
        assert_eq!(report.total_writes(), 2);
        assert_eq!(report.failures_in(SyncPhase::AddPages).count(), 1);
        assert_eq!(report.failures_in(SyncPhase::Delete).count(), 0);
        assert!(report.has_failed(&assign_id("orders.id")));
        assert!(report.to_string().contains("failures: 1"));
    }

    #[test]
    fn test_checkpoint_error_fails_report() {
        let mut report = SyncReport::default();
        report.rows_added.push(assign_id("orders"));
        assert!(report.is_success());

        report.checkpoint_error = Some(Error::Snapshot("disk full".into()));
        assert!(!report.is_success());
        assert_eq!(report.total_writes(), 1);
        assert!(report.to_string().ends_with("checkpoint failed: snapshot error: disk full"));
    }

    #[test]
    fn test_phase_order() {
        let mut phases = SyncPhase::ALL.to_vec();
        phases.reverse();
        phases.sort();
        assert_eq!(phases, SyncPhase::ALL.to_vec());
        assert_eq!(SyncPhase::UpdateRows.to_string(), "update-rows");
    }
}
