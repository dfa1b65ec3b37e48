//! In-memory catalog engine.
//!
//! Holds the store in an [`IndexedCatalog`], records every call it receives and
//! can be told to fail writes for chosen units.

use super::engine::CatalogEngine;
use super::page::DataUnitPage;
use super::row::{DataCatalogRow, IndexedCatalog, ObjectReference};
use crate::error::{Error, Result};
use crate::identity::UnitId;
use std::collections::BTreeSet;

/// A call received by [`MemoryCatalogEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Pull,
    AddRow(UnitId),
    UpdateRow(UnitId),
    AddPage(UnitId),
    UpdatePage(UnitId),
    Delete(UnitId),
}

impl EngineCall {
    /// Unit addressed by the call; `None` for a pull.
    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            EngineCall::Pull => None,
            EngineCall::AddRow(id)
            | EngineCall::UpdateRow(id)
            | EngineCall::AddPage(id)
            | EngineCall::UpdatePage(id)
            | EngineCall::Delete(id) => Some(id),
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, EngineCall::Pull)
    }
}

/// Store-side failures of the in-memory engine.
#[derive(Debug, thiserror::Error)]
pub enum MemoryEngineError {
    /// Failure configured through [`MemoryCatalogEngine::fail_on`].
    #[error("injected failure for {0}")]
    Injected(UnitId),

    #[error("no record at {0}")]
    UnknownRecord(String),

    #[error("no row for {0}")]
    MissingRow(UnitId),
}

#[derive(Debug, Default)]
pub struct MemoryCatalogEngine {
    store: IndexedCatalog,
    calls: Vec<EngineCall>,
    failing: BTreeSet<UnitId>,
    next_link: u64,
}

impl MemoryCatalogEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing store content.
    pub fn with_store(store: IndexedCatalog) -> Self {
        let next_link = store
            .reference_by_id
            .values()
            .filter_map(|r| r.reference_link.strip_prefix("mem-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            next_link,
            store,
            ..Default::default()
        }
    }

    /// Fail every write addressing `id`.
    pub fn fail_on(&mut self, id: UnitId) {
        self.failing.insert(id);
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Calls addressing `id`.
    pub fn calls_for(&self, id: &UnitId) -> Vec<&EngineCall> {
        self.calls
            .iter()
            .filter(|call| call.unit_id() == Some(id))
            .collect()
    }

    /// Forget the call log.
    pub fn reset_calls(&mut self) {
        self.calls.clear();
    }

    /// Current store content.
    pub fn store(&self) -> &IndexedCatalog {
        &self.store
    }

    fn record(&mut self, call: EngineCall) -> Result<()> {
        let failing = call
            .unit_id()
            .filter(|id| self.failing.contains(*id))
            .cloned();
        self.calls.push(call);
        match failing {
            Some(id) => Err(Error::engine(MemoryEngineError::Injected(id))),
            None => Ok(()),
        }
    }

    /// Allocate the next `mem-N` link for `id` and store it.
    fn mint_reference(&mut self, id: &UnitId) -> ObjectReference {
        self.next_link += 1;
        let reference = ObjectReference::new(id.clone(), format!("mem-{}", self.next_link));
        self.store
            .reference_by_id
            .insert(id.clone(), reference.clone());
        reference
    }

    fn locate(&self, reference: &ObjectReference) -> Result<()> {
        match self.store.reference_by_id.get(&reference.id) {
            Some(stored) if stored.reference_link == reference.reference_link => Ok(()),
            _ => Err(Error::engine(MemoryEngineError::UnknownRecord(
                reference.reference_link.clone(),
            ))),
        }
    }
}

impl CatalogEngine for MemoryCatalogEngine {
    fn pull_data_catalog(&mut self) -> Result<IndexedCatalog> {
        self.record(EngineCall::Pull)?;
        Ok(self.store.clone())
    }

    fn add_row(&mut self, row: &DataCatalogRow) -> Result<ObjectReference> {
        self.record(EngineCall::AddRow(row.id.clone()))?;
        if self.store.row_by_id.contains_key(&row.id) {
            return Err(Error::AlreadyExists { id: row.id.clone() });
        }

        let reference = self.mint_reference(&row.id);
        self.store.row_by_id.insert(row.id.clone(), row.clone());
        Ok(reference)
    }

    fn update_row(
        &mut self,
        row: &DataCatalogRow,
        reference: Option<&ObjectReference>,
    ) -> Result<ObjectReference> {
        self.record(EngineCall::UpdateRow(row.id.clone()))?;
        let reference = match reference {
            Some(reference) => {
                self.locate(reference)?;
                reference.clone()
            }
            None => match self.store.reference_by_id.get(&row.id) {
                Some(stored) => stored.clone(),
                None => self.mint_reference(&row.id),
            },
        };
        self.store.row_by_id.insert(row.id.clone(), row.clone());
        Ok(reference)
    }

    fn add_page(&mut self, page: &DataUnitPage) -> Result<()> {
        self.record(EngineCall::AddPage(page.id().clone()))?;
        if !self.store.row_by_id.contains_key(page.id()) {
            return Err(Error::engine(MemoryEngineError::MissingRow(page.id().clone())));
        }
        if self.store.page_by_id.contains_key(page.id()) {
            return Err(Error::AlreadyExists {
                id: page.id().clone(),
            });
        }
        self.store.page_by_id.insert(page.id().clone(), page.clone());
        Ok(())
    }

    fn update_page(&mut self, page: &DataUnitPage) -> Result<()> {
        self.record(EngineCall::UpdatePage(page.id().clone()))?;
        if !self.store.row_by_id.contains_key(page.id()) {
            return Err(Error::engine(MemoryEngineError::MissingRow(page.id().clone())));
        }
        self.store.page_by_id.insert(page.id().clone(), page.clone());
        Ok(())
    }

    fn delete_by_id(&mut self, reference: &ObjectReference) -> Result<()> {
        self.record(EngineCall::Delete(reference.id.clone()))?;
        self.locate(reference)?;
        self.store.remove(&reference.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::assign_id;
    use crate::model::DataUnitType;

    fn row(key: &str) -> DataCatalogRow {
        DataCatalogRow::new(assign_id(key), DataUnitType::Entity, key, "sales")
    }

    #[test]
    fn test_add_row_is_strict_create() {
        let mut engine = MemoryCatalogEngine::new();
        let reference = engine.add_row(&row("orders")).unwrap();
        assert_eq!(reference.id, assign_id("orders"));

        let err = engine.add_row(&row("orders")).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert_eq!(engine.calls().len(), 2);
    }

    #[test]
    fn test_injected_failure_surfaces_engine_error() {
        let mut engine = MemoryCatalogEngine::new();
        engine.fail_on(assign_id("orders"));

        let err = engine.add_row(&row("orders")).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert!(engine.store().is_empty());
        assert!(engine.add_row(&row("customer")).is_ok());
    }

    #[test]
    fn test_stale_reference_rejected() {
        let mut engine = MemoryCatalogEngine::new();
        engine.add_row(&row("orders")).unwrap();
        let stale = ObjectReference::new(assign_id("orders"), "mem-999");

        assert!(engine.update_row(&row("orders"), Some(&stale)).is_err());
        assert!(engine.delete_by_id(&stale).is_err());
        assert_eq!(engine.store().len(), 1);
    }

    #[test]
    fn test_delete_removes_record() {
        let mut engine = MemoryCatalogEngine::new();
        let reference = engine.add_row(&row("orders")).unwrap();
        engine.delete_by_id(&reference).unwrap();

        assert!(engine.pull_data_catalog().unwrap().is_empty());
        assert_eq!(engine.calls_for(&assign_id("orders")).len(), 2);
        assert_eq!(engine.calls().last(), Some(&EngineCall::Pull));
    }

    #[test]
    fn test_update_row_without_reference_upserts() {
        let mut engine = MemoryCatalogEngine::new();
        let reference = engine.add_row(&row("orders")).unwrap();

        // located by id
        let located = engine.update_row(&row("orders"), None).unwrap();
        assert_eq!(located, reference);

        // created when absent
        let created = engine.update_row(&row("customer"), None).unwrap();
        assert_ne!(created.reference_link, reference.reference_link);
        assert_eq!(engine.store().reference_by_id.get(&created.id), Some(&created));
        assert!(engine.store().contains(&assign_id("customer")));
    }

    #[test]
    fn test_links_not_reused_after_delete() {
        let mut engine = MemoryCatalogEngine::new();
        let first = engine.add_row(&row("orders")).unwrap();
        let second = engine.add_row(&row("customer")).unwrap();
        engine.delete_by_id(&first).unwrap();

        let mut reopened = MemoryCatalogEngine::with_store(engine.store().clone());
        let third = reopened.add_row(&row("invoice")).unwrap();
        assert_ne!(third.reference_link, second.reference_link);
        assert_eq!(third.reference_link, "mem-3");
    }
}
