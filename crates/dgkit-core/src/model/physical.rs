//! Physical model: storage layers, tables and columns.

use super::{ensure_natural_key, ensure_same_identity};
use crate::error::{Error, Result};
use crate::identity::{assign_id, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A storage layer, e.g. `landing`, `raw` or `core`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub id: UnitId,
    pub natural_key: String,
    pub name: String,
    /// Whether the layer receives data straight from source systems.
    pub is_landing: bool,
}

impl Layer {
    /// Create a layer. Its natural key is its name.
    pub fn new(name: impl Into<String>, is_landing: bool) -> Self {
        let name = name.into();
        Self {
            id: assign_id(&name),
            natural_key: name.clone(),
            name,
            is_landing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: UnitId,
    /// `<layer or source>.<table>`.
    pub natural_key: String,
    pub layer_id: UnitId,
    pub name: String,
}

impl Table {
    pub fn new(natural_key: impl Into<String>, layer_id: UnitId, name: impl Into<String>) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            layer_id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: UnitId,
    /// `<table natural key>.<column>`.
    pub natural_key: String,
    pub layer_id: UnitId,
    pub table_id: UnitId,
    pub name: String,
    pub data_type: String,
    pub description: String,
}

impl Column {
    pub fn new(
        natural_key: impl Into<String>,
        layer_id: UnitId,
        table_id: UnitId,
        name: impl Into<String>,
    ) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            layer_id,
            table_id,
            name: name.into(),
            data_type: String::new(),
            description: String::new(),
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Any physical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit_type", rename_all = "lowercase")]
pub enum PhysicalUnit {
    Layer(Layer),
    Table(Table),
    Column(Column),
}

impl PhysicalUnit {
    pub fn id(&self) -> &UnitId {
        match self {
            PhysicalUnit::Layer(u) => &u.id,
            PhysicalUnit::Table(u) => &u.id,
            PhysicalUnit::Column(u) => &u.id,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            PhysicalUnit::Layer(u) => &u.natural_key,
            PhysicalUnit::Table(u) => &u.natural_key,
            PhysicalUnit::Column(u) => &u.natural_key,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PhysicalUnit::Layer(u) => &u.name,
            PhysicalUnit::Table(u) => &u.name,
            PhysicalUnit::Column(u) => &u.name,
        }
    }

    /// Unit kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            PhysicalUnit::Layer(_) => "layer",
            PhysicalUnit::Table(_) => "table",
            PhysicalUnit::Column(_) => "column",
        }
    }
}

/// Registry of the physical model for one version.
#[derive(Debug, Clone, Default)]
pub struct PhysicalModel {
    version: String,
    layers: BTreeMap<UnitId, Layer>,
    tables: BTreeMap<UnitId, Table>,
    columns: BTreeMap<UnitId, Column>,
    all_units_by_id: BTreeMap<UnitId, PhysicalUnit>,
    all_units_by_natural_key: BTreeMap<String, UnitId>,
    /// Table lineage: table id -> ids of the tables it reads from.
    dependencies: BTreeMap<UnitId, BTreeSet<UnitId>>,
}

impl PhysicalModel {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn register_layer(&mut self, layer: Layer) -> Result<()> {
        self.admit(PhysicalUnit::Layer(layer))
    }

    pub fn register_table(&mut self, table: Table) -> Result<()> {
        self.admit(PhysicalUnit::Table(table))
    }

    pub fn register_column(&mut self, column: Column) -> Result<()> {
        self.admit(PhysicalUnit::Column(column))
    }

    /// Record that `table_id` is built from `depends_on`.
    pub fn register_dependency(&mut self, table_id: UnitId, depends_on: UnitId) {
        self.dependencies.entry(table_id).or_default().insert(depends_on);
    }

    fn admit(&mut self, unit: PhysicalUnit) -> Result<()> {
        ensure_natural_key(unit.kind(), unit.natural_key())?;
        ensure_same_identity(
            unit.id(),
            self.all_units_by_id
                .get(unit.id())
                .map(|u| (u.kind(), u.natural_key())),
            (unit.kind(), unit.natural_key()),
        )?;

        let id = unit.id().clone();
        self.all_units_by_natural_key
            .insert(unit.natural_key().to_string(), id.clone());
        match &unit {
            PhysicalUnit::Layer(layer) => {
                self.layers.insert(id.clone(), layer.clone());
            }
            PhysicalUnit::Table(table) => {
                self.tables.insert(id.clone(), table.clone());
            }
            PhysicalUnit::Column(column) => {
                self.columns.insert(id.clone(), column.clone());
            }
        }
        self.all_units_by_id.insert(id, unit);
        Ok(())
    }

    pub fn unit(&self, id: &UnitId) -> Result<&PhysicalUnit> {
        self.all_units_by_id
            .get(id)
            .ok_or_else(|| Error::not_found("physical unit", id))
    }

    pub fn unit_by_natural_key(&self, natural_key: &str) -> Result<&PhysicalUnit> {
        let id = self.resolve_natural_key(natural_key)?;
        self.unit(id)
    }

    /// Map a physical natural key to its id.
    pub fn resolve_natural_key(&self, natural_key: &str) -> Result<&UnitId> {
        self.all_units_by_natural_key
            .get(natural_key)
            .ok_or_else(|| Error::not_found("physical unit", natural_key))
    }

    pub fn layer(&self, id: &UnitId) -> Result<&Layer> {
        self.layers
            .get(id)
            .ok_or_else(|| Error::not_found("layer", id))
    }

    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.values().find(|layer| layer.name == name)
    }

    pub fn table(&self, id: &UnitId) -> Result<&Table> {
        self.tables
            .get(id)
            .ok_or_else(|| Error::not_found("table", id))
    }

    pub fn column(&self, id: &UnitId) -> Result<&Column> {
        self.columns
            .get(id)
            .ok_or_else(|| Error::not_found("column", id))
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.all_units_by_id.contains_key(id)
    }

    pub fn layers(&self) -> &BTreeMap<UnitId, Layer> {
        &self.layers
    }

    pub fn tables(&self) -> &BTreeMap<UnitId, Table> {
        &self.tables
    }

    pub fn columns(&self) -> &BTreeMap<UnitId, Column> {
        &self.columns
    }

    /// Tables registered in a layer.
    pub fn tables_in_layer<'a>(&'a self, layer_id: &'a UnitId) -> impl Iterator<Item = &'a Table> {
        self.tables.values().filter(move |t| &t.layer_id == layer_id)
    }

    pub fn all_units_by_id(&self) -> &BTreeMap<UnitId, PhysicalUnit> {
        &self.all_units_by_id
    }

    pub fn all_units_by_natural_key(&self) -> &BTreeMap<String, UnitId> {
        &self.all_units_by_natural_key
    }

    pub fn dependencies(&self) -> &BTreeMap<UnitId, BTreeSet<UnitId>> {
        &self.dependencies
    }

    pub fn len(&self) -> usize {
        self.all_units_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_units_by_id.is_empty()
    }
}
