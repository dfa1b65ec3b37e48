//! Sync engine - reconciles the logical model with the catalog mirror.
//!
//! A run executes five phases in a fixed order:
//!
//! 1. delete units that left the model,
//! 2. add rows for units new to the catalog,
//! 3. add pages for the units whose row was just added,
//! 4. rewrite the row of every model unit,
//! 5. rewrite the page of every unit present both before and after.
//!
//! Rows are created for all new units before any page is built, so links
//! between new units resolve. A failing unit is recorded in the report and the
//! phase moves on. A unit whose reference the mirror lost is rewritten through
//! the engine, which resolves or recreates its record.

use super::builder::{build_row, PageBuilder};
use super::report::{SyncPhase, SyncPlan, SyncReport};
use crate::catalog::{CatalogEngine, DataCatalog};
use crate::config::{CatalogConfig, DEFAULT_DOMAIN};
use crate::error::Result;
use crate::identity::UnitId;
use crate::model::LogicalModel;
use tracing::{debug, info, warn};

/// Sync run options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Domain written to rows of units without one.
    pub default_domain: String,
    /// Skip row and page updates whose content equals the mirror.
    pub skip_unchanged: bool,
    /// Compute the plan only; the engine is not called.
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new().with_default_domain(config.default_domain.clone())
    }

    pub fn with_default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = domain.into();
        self
    }

    pub fn with_skip_unchanged(mut self, skip_unchanged: bool) -> Self {
        self.skip_unchanged = skip_unchanged;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            default_domain: DEFAULT_DOMAIN.to_string(),
            skip_unchanged: false,
            dry_run: false,
        }
    }
}

/// Reconciles one logical model version with a data catalog.
pub struct SyncEngine<'a> {
    lm: &'a LogicalModel,
    options: SyncOptions,
}

impl<'a> SyncEngine<'a> {
    pub fn new(lm: &'a LogicalModel, options: SyncOptions) -> Self {
        Self { lm, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Compute what a run against `catalog` would do.
    pub fn plan<E: CatalogEngine>(&self, catalog: &DataCatalog<E>) -> SyncPlan {
        let lm_ids = self.lm.unit_ids();
        let row_ids = catalog.row_ids();

        SyncPlan {
            to_delete: row_ids.difference(&lm_ids).cloned().collect(),
            to_add: lm_ids.difference(&row_ids).cloned().collect(),
            rows_to_update: lm_ids.iter().cloned().collect(),
            pages_to_update: row_ids.intersection(&lm_ids).cloned().collect(),
        }
    }

    /// Run all phases against `catalog`.
    ///
    /// Per-unit failures end up in the report, and so does a failed checkpoint
    /// of the mirror: the engine writes already happened by then.
    pub fn run<E: CatalogEngine>(&self, catalog: &mut DataCatalog<E>) -> SyncReport {
        let plan = self.plan(catalog);
        info!(
            version = %self.lm.version(),
            to_delete = plan.to_delete.len(),
            to_add = plan.to_add.len(),
            to_update = plan.pages_to_update.len(),
            dry_run = self.options.dry_run,
            "Starting sync"
        );

        if self.options.dry_run {
            return SyncReport {
                planned: Some(plan),
                ..Default::default()
            };
        }

        let mut report = SyncReport::default();
        self.delete_phase(catalog, &plan.to_delete, &mut report);
        let added = self.add_rows_phase(catalog, &plan.to_add, &mut report);
        self.add_pages_phase(catalog, &added, &mut report);
        self.update_rows_phase(catalog, &mut report);
        self.update_pages_phase(catalog, &plan.pages_to_update, &mut report);

        if let Err(e) = catalog.checkpoint() {
            warn!(error = %e, "Failed to checkpoint catalog after sync");
            report.checkpoint_error = Some(e);
        }
        info!(
            deleted = report.deleted.len(),
            rows_added = report.rows_added.len(),
            pages_added = report.pages_added.len(),
            rows_updated = report.rows_updated.len(),
            pages_updated = report.pages_updated.len(),
            unchanged = report.unchanged,
            failures = report.failures.len(),
            checkpointed = report.checkpoint_error.is_none(),
            "Sync completed"
        );
        report
    }

    fn delete_phase<E: CatalogEngine>(
        &self,
        catalog: &mut DataCatalog<E>,
        ids: &[UnitId],
        report: &mut SyncReport,
    ) {
        for id in ids {
            match catalog.delete_by_id(id) {
                Ok(_) => report.deleted.push(id.clone()),
                Err(e) => fail(report, id, SyncPhase::Delete, e),
            }
        }
        debug!(count = report.deleted.len(), "Delete phase done");
    }

    fn add_rows_phase<E: CatalogEngine>(
        &self,
        catalog: &mut DataCatalog<E>,
        ids: &[UnitId],
        report: &mut SyncReport,
    ) -> Vec<UnitId> {
        let mut added = Vec::new();
        for id in ids {
            let result = self
                .lm
                .unit(id)
                .map(|unit| build_row(unit, &self.options.default_domain))
                .and_then(|row| catalog.add_row(row));
            match result {
                Ok(_) => {
                    report.rows_added.push(id.clone());
                    added.push(id.clone());
                }
                Err(e) => fail(report, id, SyncPhase::AddRows, e),
            }
        }
        debug!(count = added.len(), "Add rows phase done");
        added
    }

    fn add_pages_phase<E: CatalogEngine>(
        &self,
        catalog: &mut DataCatalog<E>,
        ids: &[UnitId],
        report: &mut SyncReport,
    ) {
        for id in ids {
            let result = self
                .build_page(catalog, id)
                .and_then(|page| catalog.add_page(page));
            match result {
                Ok(()) => report.pages_added.push(id.clone()),
                Err(e) => fail(report, id, SyncPhase::AddPages, e),
            }
        }
        debug!(count = report.pages_added.len(), "Add pages phase done");
    }

    fn update_rows_phase<E: CatalogEngine>(
        &self,
        catalog: &mut DataCatalog<E>,
        report: &mut SyncReport,
    ) {
        for unit in self.lm.units() {
            let id = unit.id();
            let row = build_row(unit, &self.options.default_domain);
            // a row without a mirrored reference is always written so it gets one
            if self.options.skip_unchanged && catalog.get_reference_by_id(id).is_ok() {
                if let Ok(existing) = catalog.get_row_by_id(id) {
                    if existing.same_content(&row) {
                        report.unchanged += 1;
                        continue;
                    }
                }
            }

            match catalog.update_row(row) {
                Ok(_) => report.rows_updated.push(id.clone()),
                Err(e) => fail(report, id, SyncPhase::UpdateRows, e),
            }
        }
        debug!(count = report.rows_updated.len(), "Update rows phase done");
    }

    fn update_pages_phase<E: CatalogEngine>(
        &self,
        catalog: &mut DataCatalog<E>,
        ids: &[UnitId],
        report: &mut SyncReport,
    ) {
        for id in ids {
            let page = match self.build_page(catalog, id) {
                Ok(page) => page,
                Err(e) => {
                    fail(report, id, SyncPhase::UpdatePages, e);
                    continue;
                }
            };

            if self.options.skip_unchanged && catalog.get_page_by_id(id).ok() == Some(&page) {
                report.unchanged += 1;
                continue;
            }

            match catalog.update_page(page) {
                Ok(()) => report.pages_updated.push(id.clone()),
                Err(e) => fail(report, id, SyncPhase::UpdatePages, e),
            }
        }
        debug!(count = report.pages_updated.len(), "Update pages phase done");
    }

    fn build_page<E: CatalogEngine>(
        &self,
        catalog: &DataCatalog<E>,
        id: &UnitId,
    ) -> Result<crate::catalog::DataUnitPage> {
        let unit = self.lm.unit(id)?;
        PageBuilder::new(self.lm, &catalog.catalog().reference_by_id).build(unit)
    }
}

fn fail(report: &mut SyncReport, id: &UnitId, phase: SyncPhase, error: crate::Error) {
    warn!(unit_id = %id, phase = %phase, error = %error, "Failed to sync unit");
    report.record_failure(id.clone(), phase, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EngineCall, IndexedCatalog, MemoryCatalogEngine, SnapshotStore};
    use crate::identity::assign_id;
    use crate::Error;
    use crate::model::{Attribute, Entity};

    /// Snapshot store whose saves always fail.
    struct FullDisk;

    impl SnapshotStore for FullDisk {
        fn load(&self) -> Result<Option<IndexedCatalog>> {
            Ok(Some(IndexedCatalog::new()))
        }

        fn save(&self, _catalog: &IndexedCatalog) -> Result<()> {
            Err(Error::Snapshot("disk full".into()))
        }
    }

    fn catalog() -> DataCatalog<MemoryCatalogEngine> {
        DataCatalog::open(MemoryCatalogEngine::new(), None).unwrap()
    }

    fn orders_model(version: &str) -> LogicalModel {
        let mut lm = LogicalModel::new(version);
        let orders = Entity::new("orders", "Orders");
        let order_id = Attribute::new("orders.id", orders.id.clone(), "id");
        lm.register_entity(orders).unwrap();
        lm.register_attribute(order_id).unwrap();
        lm
    }

    #[test]
    fn test_dry_run_leaves_engine_alone() {
        let lm = orders_model("v1");
        let mut dc = catalog();
        dc.engine_mut().reset_calls();

        let report = SyncEngine::new(&lm, SyncOptions::new().with_dry_run(true))
            .run(&mut dc);

        let plan = report.planned.unwrap();
        assert_eq!(plan.to_add.len(), 2);
        assert_eq!(plan.rows_to_update.len(), 2);
        assert!(plan.pages_to_update.is_empty());
        assert!(dc.engine().calls().is_empty());
        assert!(dc.row_ids().is_empty());
    }

    #[test]
    fn test_rows_before_pages() {
        let lm = orders_model("v1");
        let mut dc = catalog();
        dc.engine_mut().reset_calls();

        SyncEngine::new(&lm, SyncOptions::default()).run(&mut dc);

        let calls = dc.engine().calls();
        let last_add_row = calls
            .iter()
            .rposition(|c| matches!(c, EngineCall::AddRow(_)))
            .unwrap();
        let first_add_page = calls
            .iter()
            .position(|c| matches!(c, EngineCall::AddPage(_)))
            .unwrap();
        assert!(last_add_row < first_add_page);
    }

    #[test]
    fn test_skip_unchanged_second_run() {
        let lm = orders_model("v1");
        let mut dc = catalog();
        SyncEngine::new(&lm, SyncOptions::default()).run(&mut dc);
        dc.engine_mut().reset_calls();

        let report = SyncEngine::new(&lm, SyncOptions::new().with_skip_unchanged(true))
            .run(&mut dc);

        assert!(report.is_success());
        assert_eq!(report.total_writes(), 0);
        assert_eq!(report.unchanged, 4);
        assert!(dc.engine().calls().is_empty());
    }

    #[test]
    fn test_second_run_updates_everything_by_default() {
        let lm = orders_model("v1");
        let mut dc = catalog();
        SyncEngine::new(&lm, SyncOptions::default()).run(&mut dc);

        let report = SyncEngine::new(&lm, SyncOptions::default()).run(&mut dc);
        assert_eq!(report.rows_updated.len(), 2);
        assert_eq!(report.pages_updated.len(), 2);
        assert!(report.rows_added.is_empty());
    }

    #[test]
    fn test_default_domain_from_options() {
        let lm = orders_model("v1");
        let mut dc = catalog();
        let config = CatalogConfig::default().with_default_domain("Ops");
        let options = SyncOptions::from_config(&config);
        SyncEngine::new(&lm, options).run(&mut dc);

        assert_eq!(dc.get_row_by_id(&assign_id("orders")).unwrap().domain, "Ops");
    }

    #[test]
    fn test_row_without_reference_is_still_updated() {
        let lm = orders_model("v1");
        let mut store = IndexedCatalog::new();
        for unit in lm.units() {
            store
                .row_by_id
                .insert(unit.id().clone(), build_row(unit, DEFAULT_DOMAIN));
        }
        let mut dc = DataCatalog::open(MemoryCatalogEngine::with_store(store), None).unwrap();
        dc.engine_mut().reset_calls();

        let plan = SyncEngine::new(&lm, SyncOptions::new().with_dry_run(true)).plan(&dc);
        assert_eq!(plan.rows_to_update.len(), 2);

        let report = SyncEngine::new(&lm, SyncOptions::default()).run(&mut dc);

        assert_eq!(report.rows_updated.len(), 2);
        assert!(report.rows_added.is_empty());
        let orders = assign_id("orders");
        assert!(dc
            .engine()
            .calls_for(&orders)
            .contains(&&EngineCall::UpdateRow(orders.clone())));
        assert!(dc.get_reference_by_id(&orders).is_ok());
    }

    #[test]
    fn test_checkpoint_failure_keeps_report() {
        let lm = orders_model("v1");
        let snapshot: Box<dyn SnapshotStore> = Box::new(FullDisk);
        let mut dc = DataCatalog::open(MemoryCatalogEngine::new(), Some(snapshot)).unwrap();

        let report = SyncEngine::new(&lm, SyncOptions::default()).run(&mut dc);

        assert!(!report.is_success());
        assert!(report.failures.is_empty());
        assert_eq!(report.rows_added.len(), 2);
        assert_eq!(report.pages_added.len(), 2);
        assert!(matches!(report.checkpoint_error, Some(Error::Snapshot(_))));
        assert_eq!(dc.engine().store().len(), 2);
    }
}
