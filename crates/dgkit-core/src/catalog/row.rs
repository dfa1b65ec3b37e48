//! Catalog index rows and the indexed mirror.

use super::page::DataUnitPage;
use crate::identity::UnitId;
use crate::model::DataUnitType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Location of a unit's record in the external catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    pub id: UnitId,
    /// Engine-specific handle, e.g. a page id or url.
    pub reference_link: String,
}

impl ObjectReference {
    pub fn new(id: UnitId, reference_link: impl Into<String>) -> Self {
        Self {
            id,
            reference_link: reference_link.into(),
        }
    }
}

/// Searchable index row for one logical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCatalogRow {
    pub id: UnitId,
    pub data_unit_type: DataUnitType,
    pub data_unit_name: String,
    pub domain: String,
    pub last_edited_time: Option<DateTime<Utc>>,
    pub created_time: Option<DateTime<Utc>>,
}

impl DataCatalogRow {
    pub fn new(
        id: UnitId,
        data_unit_type: DataUnitType,
        data_unit_name: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id,
            data_unit_type,
            data_unit_name: data_unit_name.into(),
            domain: domain.into(),
            last_edited_time: None,
            created_time: None,
        }
    }

    pub fn with_created_time(mut self, created_time: Option<DateTime<Utc>>) -> Self {
        self.created_time = created_time;
        self
    }

    pub fn with_last_edited_time(mut self, last_edited_time: Option<DateTime<Utc>>) -> Self {
        self.last_edited_time = last_edited_time;
        self
    }

    /// Compare the fields a sync writes, ignoring store-maintained timestamps.
    pub fn same_content(&self, other: &DataCatalogRow) -> bool {
        self.id == other.id
            && self.data_unit_type == other.data_unit_type
            && self.data_unit_name == other.data_unit_name
            && self.domain == other.domain
    }
}

/// Local mirror of the external catalog store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedCatalog {
    pub row_by_id: BTreeMap<UnitId, DataCatalogRow>,
    pub page_by_id: BTreeMap<UnitId, DataUnitPage>,
    pub reference_by_id: BTreeMap<UnitId, ObjectReference>,
}

impl IndexedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids with a row.
    pub fn row_ids(&self) -> BTreeSet<UnitId> {
        self.row_by_id.keys().cloned().collect()
    }

    /// Reference link of a unit, if known.
    pub fn reference_link(&self, id: &UnitId) -> Option<&str> {
        self.reference_by_id
            .get(id)
            .map(|reference| reference.reference_link.as_str())
    }

    /// Drop every trace of a unit, returning its reference.
    pub fn remove(&mut self, id: &UnitId) -> Option<ObjectReference> {
        self.row_by_id.remove(id);
        self.page_by_id.remove(id);
        self.reference_by_id.remove(id)
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.row_by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.row_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::assign_id;

    #[test]
    fn test_same_content_ignores_timestamps() {
        let row = DataCatalogRow::new(assign_id("orders"), DataUnitType::Entity, "Orders", "sales");
        let pulled = row.clone().with_last_edited_time(Some(Utc::now()));
        assert!(row.same_content(&pulled));
        assert_ne!(row, pulled);

        let renamed = DataCatalogRow { data_unit_name: "Order".into(), ..row.clone() };
        assert!(!row.same_content(&renamed));
    }

    #[test]
    fn test_remove_clears_all_maps() {
        let id = assign_id("orders");
        let mut catalog = IndexedCatalog::new();
        catalog.row_by_id.insert(
            id.clone(),
            DataCatalogRow::new(id.clone(), DataUnitType::Entity, "Orders", "sales"),
        );
        catalog
            .reference_by_id
            .insert(id.clone(), ObjectReference::new(id.clone(), "page-1"));

        assert_eq!(catalog.reference_link(&id), Some("page-1"));
        let reference = catalog.remove(&id).unwrap();
        assert_eq!(reference.reference_link, "page-1");
        assert!(catalog.is_empty());
        assert!(catalog.reference_by_id.is_empty());
        assert!(catalog.remove(&id).is_none());
    }
}
