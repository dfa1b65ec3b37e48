//! The catalog mirror and its write-through CRUD.

use super::engine::CatalogEngine;
use super::page::DataUnitPage;
use super::row::{DataCatalogRow, IndexedCatalog, ObjectReference};
use super::snapshot::SnapshotStore;
use crate::error::{Error, Result};
use crate::identity::UnitId;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Local mirror of the external catalog, kept in step with every write.
///
/// The mirror is loaded once: from the snapshot store when it holds a
/// snapshot, otherwise from the engine (and the snapshot is then written).
/// Every mutation goes to the engine first and only reaches the mirror when
/// the engine accepted it.
pub struct DataCatalog<E> {
    engine: E,
    catalog: IndexedCatalog,
    snapshot: Option<Box<dyn SnapshotStore>>,
}

impl<E: CatalogEngine> DataCatalog<E> {
    /// Open the mirror from the snapshot store, falling back to a pull.
    pub fn open(engine: E, snapshot: Option<Box<dyn SnapshotStore>>) -> Result<Self> {
        let saved = match &snapshot {
            Some(store) => store.load()?,
            None => None,
        };
        match saved {
            Some(catalog) => Ok(Self {
                engine,
                catalog,
                snapshot,
            }),
            None => Self::pull(engine, snapshot),
        }
    }

    /// Open the mirror from a fresh pull, ignoring any saved snapshot.
    pub fn pull(mut engine: E, snapshot: Option<Box<dyn SnapshotStore>>) -> Result<Self> {
        let catalog = engine.pull_data_catalog()?;
        info!(rows = catalog.len(), pages = catalog.page_by_id.len(), "Pulled data catalog");

        let data_catalog = Self {
            engine,
            catalog,
            snapshot,
        };
        data_catalog.checkpoint()?;
        Ok(data_catalog)
    }

    /// Replace the mirror with a fresh pull and checkpoint it.
    pub fn refresh(&mut self) -> Result<()> {
        self.catalog = self.engine.pull_data_catalog()?;
        info!(rows = self.catalog.len(), "Refreshed data catalog");
        self.checkpoint()?;
        Ok(())
    }

    /// Save the mirror to the snapshot store. Returns `false` without one.
    pub fn checkpoint(&self) -> Result<bool> {
        match &self.snapshot {
            Some(store) => {
                store.save(&self.catalog)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn has_snapshot_store(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn catalog(&self) -> &IndexedCatalog {
        &self.catalog
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Ids of every unit with a row.
    pub fn row_ids(&self) -> BTreeSet<UnitId> {
        self.catalog.row_ids()
    }

    pub fn get_row_by_id(&self, id: &UnitId) -> Result<&DataCatalogRow> {
        self.catalog
            .row_by_id
            .get(id)
            .ok_or_else(|| Error::not_found("catalog row", id))
    }

    pub fn get_page_by_id(&self, id: &UnitId) -> Result<&DataUnitPage> {
        self.catalog
            .page_by_id
            .get(id)
            .ok_or_else(|| Error::not_found("catalog page", id))
    }

    pub fn get_reference_by_id(&self, id: &UnitId) -> Result<&ObjectReference> {
        self.catalog
            .reference_by_id
            .get(id)
            .ok_or_else(|| Error::not_found("object reference", id))
    }

    /// Create the row of a new unit and remember its reference.
    pub fn add_row(&mut self, row: DataCatalogRow) -> Result<ObjectReference> {
        if self.catalog.row_by_id.contains_key(&row.id) {
            return Err(Error::DuplicateId { id: row.id });
        }

        let reference = self.engine.add_row(&row)?;
        debug!(unit_id = %row.id, reference = %reference.reference_link, "Added row");
        self.catalog
            .reference_by_id
            .insert(row.id.clone(), reference.clone());
        self.catalog.row_by_id.insert(row.id.clone(), row);
        Ok(reference)
    }

    /// Create the page of a unit.
    pub fn add_page(&mut self, page: DataUnitPage) -> Result<()> {
        if self.catalog.page_by_id.contains_key(page.id()) {
            return Err(Error::DuplicateId {
                id: page.id().clone(),
            });
        }

        self.engine.add_page(&page)?;
        debug!(unit_id = %page.id(), "Added page");
        self.catalog.page_by_id.insert(page.id().clone(), page);
        Ok(())
    }

    /// Overwrite the row of a unit.
    ///
    /// A row without `created_time` keeps the one already mirrored. When the
    /// mirror has no reference for the unit the engine resolves or creates the
    /// record, and the returned reference is mirrored.
    pub fn update_row(&mut self, mut row: DataCatalogRow) -> Result<ObjectReference> {
        let known = self.catalog.reference_by_id.get(&row.id).cloned();

        if row.created_time.is_none() {
            row.created_time = self
                .catalog
                .row_by_id
                .get(&row.id)
                .and_then(|existing| existing.created_time);
        }

        let reference = self.engine.update_row(&row, known.as_ref())?;
        debug!(
            unit_id = %row.id,
            reference = %reference.reference_link,
            resolved = known.is_none(),
            "Updated row"
        );
        self.catalog
            .reference_by_id
            .insert(row.id.clone(), reference.clone());
        self.catalog.row_by_id.insert(row.id.clone(), row);
        Ok(reference)
    }

    /// Overwrite the page of a unit.
    pub fn update_page(&mut self, page: DataUnitPage) -> Result<()> {
        self.engine.update_page(&page)?;
        debug!(unit_id = %page.id(), "Updated page");
        self.catalog.page_by_id.insert(page.id().clone(), page);
        Ok(())
    }

    /// Remove a unit from the store and the mirror.
    ///
    /// Returns `false` when the mirror had no trace of the unit. The store is
    /// only called when the unit's reference is known.
    pub fn delete_by_id(&mut self, id: &UnitId) -> Result<bool> {
        if let Some(reference) = self.catalog.reference_by_id.get(id) {
            self.engine.delete_by_id(reference)?;
        }

        let known = self.catalog.row_by_id.contains_key(id)
            || self.catalog.page_by_id.contains_key(id)
            || self.catalog.reference_by_id.contains_key(id);
        self.catalog.remove(id);
        if known {
            debug!(unit_id = %id, "Deleted unit");
        }
        Ok(known)
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for DataCatalog<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCatalog")
            .field("engine", &self.engine)
            .field("rows", &self.catalog.len())
            .field("snapshot", &self.snapshot.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::snapshot::LocalSnapshot;
    use crate::catalog::{EngineCall, EntityPage, MemoryCatalogEngine};
    use crate::identity::assign_id;
    use crate::model::DataUnitType;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn row(key: &str) -> DataCatalogRow {
        DataCatalogRow::new(assign_id(key), DataUnitType::Entity, key, "sales")
    }

    fn page(reference: &ObjectReference) -> DataUnitPage {
        DataUnitPage::Entity(EntityPage {
            id: reference.id.clone(),
            reference: reference.clone(),
            description: String::new(),
            pk_attributes_references: vec![],
            attributes_references: vec![],
            relations_references: vec![],
            linked_documents: vec![],
            responsible_parties: vec![],
            pm_mapping_references: vec![],
            source_systems: vec![],
        })
    }

    fn empty_catalog() -> DataCatalog<MemoryCatalogEngine> {
        DataCatalog::open(MemoryCatalogEngine::new(), None).unwrap()
    }

    #[test]
    fn test_lookup_misses() {
        let dc = empty_catalog();
        let id = assign_id("orders");
        assert!(dc.get_row_by_id(&id).unwrap_err().is_not_found());
        assert!(dc.get_page_by_id(&id).unwrap_err().is_not_found());
        assert!(dc.get_reference_by_id(&id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_add_row_stores_reference() {
        let mut dc = empty_catalog();
        let reference = dc.add_row(row("orders")).unwrap();

        assert_eq!(dc.get_reference_by_id(&assign_id("orders")).unwrap(), &reference);
        assert_eq!(dc.row_ids().len(), 1);
        assert!(matches!(
            dc.add_row(row("orders")),
            Err(Error::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_duplicate_page_rejected_before_engine() {
        let mut dc = empty_catalog();
        let reference = dc.add_row(row("orders")).unwrap();
        dc.add_page(page(&reference)).unwrap();
        dc.engine_mut().reset_calls();

        let err = dc.add_page(page(&reference)).unwrap_err();
        assert!(matches!(err, Error::DuplicateId { .. }));
        assert!(dc.engine().calls().is_empty());
    }

    #[test]
    fn test_update_row_without_mirrored_reference() {
        let mut store = IndexedCatalog::new();
        store.row_by_id.insert(assign_id("orders"), row("orders"));
        let mut dc = DataCatalog::open(MemoryCatalogEngine::with_store(store), None).unwrap();
        dc.engine_mut().reset_calls();

        let reference = dc.update_row(row("orders")).unwrap();

        assert_eq!(
            dc.engine().calls(),
            &[EngineCall::UpdateRow(assign_id("orders"))]
        );
        assert_eq!(dc.get_reference_by_id(&assign_id("orders")).unwrap(), &reference);
        assert_eq!(
            dc.engine().store().reference_link(&assign_id("orders")),
            Some(reference.reference_link.as_str())
        );
    }

    #[test]
    fn test_update_row_creates_missing_record() {
        let mut dc = empty_catalog();
        let reference = dc.update_row(row("orders")).unwrap();

        assert!(dc.engine().store().contains(&assign_id("orders")));
        assert_eq!(dc.get_reference_by_id(&assign_id("orders")).unwrap(), &reference);
    }

    #[test]
    fn test_update_row_keeps_created_time() {
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut dc = empty_catalog();
        dc.add_row(row("orders").with_created_time(Some(created))).unwrap();

        let mut renamed = row("orders");
        renamed.data_unit_name = "Order".into();
        dc.update_row(renamed).unwrap();

        let stored = dc.get_row_by_id(&assign_id("orders")).unwrap();
        assert_eq!(stored.data_unit_name, "Order");
        assert_eq!(stored.created_time, Some(created));
    }

    #[test]
    fn test_update_row_is_idempotent() {
        let mut dc = empty_catalog();
        dc.add_row(row("orders")).unwrap();
        dc.update_row(row("orders")).unwrap();
        let once = dc.catalog().clone();
        dc.update_row(row("orders")).unwrap();
        assert_eq!(dc.catalog(), &once);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut dc = empty_catalog();
        assert!(!dc.delete_by_id(&assign_id("ghost")).unwrap());
        assert_eq!(dc.engine().calls(), &[EngineCall::Pull]);
    }

    #[test]
    fn test_delete_writes_through() {
        let mut dc = empty_catalog();
        dc.add_row(row("orders")).unwrap();
        assert!(dc.delete_by_id(&assign_id("orders")).unwrap());
        assert!(dc.row_ids().is_empty());
        assert!(dc.engine().store().is_empty());
    }

    #[test]
    fn test_failed_write_leaves_mirror_untouched() {
        let mut engine = MemoryCatalogEngine::new();
        engine.fail_on(assign_id("orders"));
        let mut dc = DataCatalog::open(engine, None).unwrap();

        assert!(matches!(dc.add_row(row("orders")), Err(Error::Engine(_))));
        assert!(dc.get_row_by_id(&assign_id("orders")).is_err());
    }

    #[test]
    fn test_open_prefers_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = || -> Option<Box<dyn SnapshotStore>> {
            Some(Box::new(LocalSnapshot::new(dir.path(), "main")))
        };

        let mut dc = DataCatalog::open(MemoryCatalogEngine::new(), store()).unwrap();
        dc.add_row(row("orders")).unwrap();
        assert!(dc.checkpoint().unwrap());
        let engine = dc.into_engine();

        // a second open must not pull
        let engine = MemoryCatalogEngine::with_store(engine.store().clone());
        let reopened = DataCatalog::open(engine, store()).unwrap();
        assert!(reopened.engine().calls().is_empty());
        assert_eq!(reopened.row_ids().len(), 1);
    }

    #[test]
    fn test_refresh_replaces_mirror() {
        let mut dc = empty_catalog();
        dc.add_row(row("orders")).unwrap();
        let reference = dc.get_reference_by_id(&assign_id("orders")).unwrap().clone();
        dc.engine_mut().delete_by_id(&reference).unwrap();

        assert_eq!(dc.row_ids().len(), 1);
        dc.refresh().unwrap();
        assert!(dc.row_ids().is_empty());
    }
}
