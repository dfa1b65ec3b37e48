//! Logical model: entities, attributes, identifiers and relations.

use super::business::{Document, Team};
use super::{ensure_natural_key, ensure_same_identity, push_unique, remove_from_index};
use crate::error::{Error, Result};
use crate::identity::{assign_id, UnitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Discriminant of a catalogued logical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataUnitType {
    Entity,
    Attribute,
    Relation,
}

impl DataUnitType {
    /// Lowercase name, as stored in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataUnitType::Entity => "entity",
            DataUnitType::Attribute => "attribute",
            DataUnitType::Relation => "relation",
        }
    }
}

impl fmt::Display for DataUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataUnitType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entity" => Ok(DataUnitType::Entity),
            "attribute" => Ok(DataUnitType::Attribute),
            "relation" => Ok(DataUnitType::Relation),
            _ => Err(Error::not_found("data unit type", s)),
        }
    }
}

/// A business entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: UnitId,
    pub natural_key: String,
    pub name: String,
    pub domain: Option<String>,
    pub description: String,
    /// Ids of the entity's identifiers.
    pub identifiers: Vec<UnitId>,
    /// Ids of the entity's attributes.
    pub attributes: Vec<UnitId>,
    /// Natural keys of the physical units implementing the entity.
    pub pm_map: Vec<String>,
    pub source_systems: Vec<String>,
    pub responsible_parties: Vec<Team>,
    pub documents: Vec<Document>,
    pub created_by: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
}

impl Entity {
    /// Create an entity.
    pub fn new(natural_key: impl Into<String>, name: impl Into<String>) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            name: name.into(),
            domain: None,
            description: String::new(),
            identifiers: Vec::new(),
            attributes: Vec::new(),
            pm_map: Vec::new(),
            source_systems: Vec::new(),
            responsible_parties: Vec::new(),
            documents: Vec::new(),
            created_by: None,
            created_time: None,
        }
    }

    /// List an attribute id on the entity.
    pub fn with_attribute(mut self, attribute_id: UnitId) -> Self {
        self.attributes.push(attribute_id);
        self
    }

    /// List an identifier id on the entity.
    pub fn with_identifier(mut self, identifier_id: UnitId) -> Self {
        self.identifiers.push(identifier_id);
        self
    }
}

/// An attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: UnitId,
    pub natural_key: String,
    /// Owning entity.
    pub entity_id: UnitId,
    pub name: String,
    pub domain: Option<String>,
    pub description: String,
    pub sensitivity_type: String,
    pub data_type: String,
    pub pm_map: Vec<String>,
    pub source_systems: Vec<String>,
    pub responsible_parties: Vec<Team>,
    pub documents: Vec<Document>,
    pub created_by: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
}

impl Attribute {
    /// Create an attribute owned by `entity_id`.
    pub fn new(
        natural_key: impl Into<String>,
        entity_id: UnitId,
        name: impl Into<String>,
    ) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            entity_id,
            name: name.into(),
            domain: None,
            description: String::new(),
            sensitivity_type: String::new(),
            data_type: String::new(),
            pm_map: Vec::new(),
            source_systems: Vec::new(),
            responsible_parties: Vec::new(),
            documents: Vec::new(),
            created_by: None,
            created_time: None,
        }
    }

    /// Set the logical data type.
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Set the sensitivity classification.
    pub fn with_sensitivity_type(mut self, sensitivity_type: impl Into<String>) -> Self {
        self.sensitivity_type = sensitivity_type.into();
        self
    }
}

/// A relation between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: UnitId,
    pub natural_key: String,
    pub source_entity_id: UnitId,
    pub target_entity_id: UnitId,
    pub name: String,
    pub domain: Option<String>,
    pub description: String,
    pub pm_map: Vec<String>,
    pub source_systems: Vec<String>,
    pub responsible_parties: Vec<Team>,
    pub documents: Vec<Document>,
    pub optional_source: Option<bool>,
    pub optional_target: Option<bool>,
    pub source_cardinality: Option<String>,
    pub target_cardinality: Option<String>,
    pub created_by: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
}

impl Relation {
    /// Create a relation from `source_entity_id` to `target_entity_id`.
    pub fn new(
        natural_key: impl Into<String>,
        source_entity_id: UnitId,
        target_entity_id: UnitId,
        name: impl Into<String>,
    ) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            source_entity_id,
            target_entity_id,
            name: name.into(),
            domain: None,
            description: String::new(),
            pm_map: Vec::new(),
            source_systems: Vec::new(),
            responsible_parties: Vec::new(),
            documents: Vec::new(),
            optional_source: None,
            optional_target: None,
            source_cardinality: None,
            target_cardinality: None,
            created_by: None,
            created_time: None,
        }
    }

    /// Set optionality of both ends.
    pub fn with_optionality(mut self, optional_source: bool, optional_target: bool) -> Self {
        self.optional_source = Some(optional_source);
        self.optional_target = Some(optional_target);
        self
    }

    /// Set cardinality of both ends, e.g. `"1"` and `"*"`.
    pub fn with_cardinality(
        mut self,
        source_cardinality: impl Into<String>,
        target_cardinality: impl Into<String>,
    ) -> Self {
        self.source_cardinality = Some(source_cardinality.into());
        self.target_cardinality = Some(target_cardinality.into());
        self
    }
}

macro_rules! descriptive_builders {
    ($($unit:ty),+) => {$(
        impl $unit {
            /// Set the business domain.
            pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
                self.domain = Some(domain.into());
                self
            }

            /// Set the description.
            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.description = description.into();
                self
            }

            /// Map the unit to a physical unit by natural key.
            pub fn with_pm_mapping(mut self, physical_natural_key: impl Into<String>) -> Self {
                self.pm_map.push(physical_natural_key.into());
                self
            }

            /// Add a master source system.
            pub fn with_source_system(mut self, source_system: impl Into<String>) -> Self {
                self.source_systems.push(source_system.into());
                self
            }

            /// Add a responsible team.
            pub fn with_responsible_party(mut self, team: Team) -> Self {
                self.responsible_parties.push(team);
                self
            }

            /// Link a document.
            pub fn with_document(mut self, document: Document) -> Self {
                self.documents.push(document);
                self
            }

            /// Record authorship.
            pub fn with_created(
                mut self,
                created_by: Option<String>,
                created_time: Option<DateTime<Utc>>,
            ) -> Self {
                self.created_by = created_by;
                self.created_time = created_time;
                self
            }
        }
    )+};
}

descriptive_builders!(Entity, Attribute, Relation);

/// A candidate or primary key of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIdentifier {
    pub id: UnitId,
    pub natural_key: String,
    pub entity_id: UnitId,
    pub name: Option<String>,
    pub is_pk: bool,
    /// Ids of the attributes making up the key.
    pub attributes: Vec<UnitId>,
}

impl EntityIdentifier {
    /// Create an identifier of `entity_id`.
    pub fn new(natural_key: impl Into<String>, entity_id: UnitId, is_pk: bool) -> Self {
        let natural_key = natural_key.into();
        Self {
            id: assign_id(&natural_key),
            natural_key,
            entity_id,
            name: None,
            is_pk,
            attributes: Vec::new(),
        }
    }

    /// Set the identifier name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a key attribute.
    pub fn with_attribute(mut self, attribute_id: UnitId) -> Self {
        self.attributes.push(attribute_id);
        self
    }
}

/// Any catalogued logical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "data_unit_type", rename_all = "lowercase")]
pub enum LogicalUnit {
    Entity(Entity),
    Attribute(Attribute),
    Relation(Relation),
}

impl LogicalUnit {
    pub fn data_unit_type(&self) -> DataUnitType {
        match self {
            LogicalUnit::Entity(_) => DataUnitType::Entity,
            LogicalUnit::Attribute(_) => DataUnitType::Attribute,
            LogicalUnit::Relation(_) => DataUnitType::Relation,
        }
    }

    pub fn id(&self) -> &UnitId {
        match self {
            LogicalUnit::Entity(u) => &u.id,
            LogicalUnit::Attribute(u) => &u.id,
            LogicalUnit::Relation(u) => &u.id,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            LogicalUnit::Entity(u) => &u.natural_key,
            LogicalUnit::Attribute(u) => &u.natural_key,
            LogicalUnit::Relation(u) => &u.natural_key,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LogicalUnit::Entity(u) => &u.name,
            LogicalUnit::Attribute(u) => &u.name,
            LogicalUnit::Relation(u) => &u.name,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            LogicalUnit::Entity(u) => u.domain.as_deref(),
            LogicalUnit::Attribute(u) => u.domain.as_deref(),
            LogicalUnit::Relation(u) => u.domain.as_deref(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            LogicalUnit::Entity(u) => &u.description,
            LogicalUnit::Attribute(u) => &u.description,
            LogicalUnit::Relation(u) => &u.description,
        }
    }

    pub fn pm_map(&self) -> &[String] {
        match self {
            LogicalUnit::Entity(u) => &u.pm_map,
            LogicalUnit::Attribute(u) => &u.pm_map,
            LogicalUnit::Relation(u) => &u.pm_map,
        }
    }

    pub fn source_systems(&self) -> &[String] {
        match self {
            LogicalUnit::Entity(u) => &u.source_systems,
            LogicalUnit::Attribute(u) => &u.source_systems,
            LogicalUnit::Relation(u) => &u.source_systems,
        }
    }

    pub fn responsible_parties(&self) -> &[Team] {
        match self {
            LogicalUnit::Entity(u) => &u.responsible_parties,
            LogicalUnit::Attribute(u) => &u.responsible_parties,
            LogicalUnit::Relation(u) => &u.responsible_parties,
        }
    }

    pub fn documents(&self) -> &[Document] {
        match self {
            LogicalUnit::Entity(u) => &u.documents,
            LogicalUnit::Attribute(u) => &u.documents,
            LogicalUnit::Relation(u) => &u.documents,
        }
    }

    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        match self {
            LogicalUnit::Entity(u) => u.created_time,
            LogicalUnit::Attribute(u) => u.created_time,
            LogicalUnit::Relation(u) => u.created_time,
        }
    }
}

/// Registry of the logical model for one version.
///
/// Besides the unit maps it keeps the one-to-many indices the catalog pages are
/// built from. All index lists are insertion-ordered and duplicate-free.
#[derive(Debug, Clone, Default)]
pub struct LogicalModel {
    version: String,
    entities: BTreeMap<UnitId, Entity>,
    attributes: BTreeMap<UnitId, Attribute>,
    relations: BTreeMap<UnitId, Relation>,
    identifiers: BTreeMap<UnitId, EntityIdentifier>,
    all_units_by_id: BTreeMap<UnitId, LogicalUnit>,
    attributes_by_entity_id: BTreeMap<UnitId, Vec<UnitId>>,
    relations_by_entity_id: BTreeMap<UnitId, Vec<UnitId>>,
    identifiers_by_entity_id: BTreeMap<UnitId, Vec<UnitId>>,
    pm_objects_by_lm_id: BTreeMap<UnitId, Vec<String>>,
    /// Attribute-level lineage: dependent entity id -> dependency attribute ids.
    dependencies: BTreeMap<UnitId, Vec<UnitId>>,
}

impl LogicalModel {
    /// Create an empty model for `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Model version tag.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Register an entity. Re-registering the same natural key replaces it.
    pub fn register_entity(&mut self, entity: Entity) -> Result<()> {
        self.admit(DataUnitType::Entity, &entity.id, &entity.natural_key)?;
        self.detach(&entity.id);

        self.index_pm_map(&entity.id, &entity.pm_map);
        self.entities.insert(entity.id.clone(), entity.clone());
        self.all_units_by_id
            .insert(entity.id.clone(), LogicalUnit::Entity(entity));
        Ok(())
    }

    /// Register an attribute and index it under its entity.
    pub fn register_attribute(&mut self, attribute: Attribute) -> Result<()> {
        self.admit(DataUnitType::Attribute, &attribute.id, &attribute.natural_key)?;
        self.detach(&attribute.id);

        push_unique(
            &mut self.attributes_by_entity_id,
            attribute.entity_id.clone(),
            attribute.id.clone(),
        );
        self.index_pm_map(&attribute.id, &attribute.pm_map);
        self.attributes.insert(attribute.id.clone(), attribute.clone());
        self.all_units_by_id
            .insert(attribute.id.clone(), LogicalUnit::Attribute(attribute));
        Ok(())
    }

    /// Register a relation and index it under both its source and target entity.
    pub fn register_relation(&mut self, relation: Relation) -> Result<()> {
        self.admit(DataUnitType::Relation, &relation.id, &relation.natural_key)?;
        self.detach(&relation.id);

        push_unique(
            &mut self.relations_by_entity_id,
            relation.source_entity_id.clone(),
            relation.id.clone(),
        );
        push_unique(
            &mut self.relations_by_entity_id,
            relation.target_entity_id.clone(),
            relation.id.clone(),
        );
        self.index_pm_map(&relation.id, &relation.pm_map);
        self.relations.insert(relation.id.clone(), relation.clone());
        self.all_units_by_id
            .insert(relation.id.clone(), LogicalUnit::Relation(relation));
        Ok(())
    }

    /// Register an entity identifier.
    ///
    /// Identifiers are not catalogued units; they only feed the primary key
    /// references of entity pages.
    pub fn register_identifier(&mut self, identifier: EntityIdentifier) -> Result<()> {
        ensure_natural_key("identifier", &identifier.natural_key)?;
        let existing = self
            .identifiers
            .get(&identifier.id)
            .map(|i| ("identifier", i.natural_key.as_str()))
            .or_else(|| {
                self.all_units_by_id
                    .get(&identifier.id)
                    .map(|u| (u.data_unit_type().as_str(), u.natural_key()))
            });
        ensure_same_identity(
            &identifier.id,
            existing,
            ("identifier", &identifier.natural_key),
        )?;

        if let Some(previous) = self.identifiers.remove(&identifier.id) {
            remove_from_index(
                &mut self.identifiers_by_entity_id,
                &previous.entity_id,
                &previous.id,
            );
        }
        push_unique(
            &mut self.identifiers_by_entity_id,
            identifier.entity_id.clone(),
            identifier.id.clone(),
        );
        self.identifiers.insert(identifier.id.clone(), identifier);
        Ok(())
    }

    /// Record that `dependent_entity_id` derives data from `dependency_attribute_id`.
    pub fn register_dependency(
        &mut self,
        dependent_entity_id: UnitId,
        dependency_attribute_id: UnitId,
    ) {
        push_unique(
            &mut self.dependencies,
            dependent_entity_id,
            dependency_attribute_id,
        );
    }

    fn admit(&self, kind: DataUnitType, id: &UnitId, natural_key: &str) -> Result<()> {
        ensure_natural_key(kind.as_str(), natural_key)?;
        let existing = self
            .all_units_by_id
            .get(id)
            .map(|u| (u.data_unit_type().as_str(), u.natural_key()))
            .or_else(|| {
                self.identifiers
                    .get(id)
                    .map(|i| ("identifier", i.natural_key.as_str()))
            });
        ensure_same_identity(id, existing, (kind.as_str(), natural_key))
    }

    /// Remove the derived index entries of the unit currently registered under `id`.
    fn detach(&mut self, id: &UnitId) {
        let Some(previous) = self.all_units_by_id.remove(id) else {
            return;
        };
        self.pm_objects_by_lm_id.remove(id);

        match previous {
            LogicalUnit::Entity(_) => {
                self.entities.remove(id);
            }
            LogicalUnit::Attribute(attribute) => {
                remove_from_index(&mut self.attributes_by_entity_id, &attribute.entity_id, id);
                self.attributes.remove(id);
            }
            LogicalUnit::Relation(relation) => {
                remove_from_index(
                    &mut self.relations_by_entity_id,
                    &relation.source_entity_id,
                    id,
                );
                remove_from_index(
                    &mut self.relations_by_entity_id,
                    &relation.target_entity_id,
                    id,
                );
                self.relations.remove(id);
            }
        }
    }

    fn index_pm_map(&mut self, id: &UnitId, pm_map: &[String]) {
        for physical_key in pm_map {
            push_unique(&mut self.pm_objects_by_lm_id, id.clone(), physical_key.clone());
        }
    }

    /// Look up any catalogued unit.
    pub fn unit(&self, id: &UnitId) -> Result<&LogicalUnit> {
        self.all_units_by_id
            .get(id)
            .ok_or_else(|| Error::not_found("logical unit", id))
    }

    pub fn entity(&self, id: &UnitId) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| Error::not_found("entity", id))
    }

    pub fn attribute(&self, id: &UnitId) -> Result<&Attribute> {
        self.attributes
            .get(id)
            .ok_or_else(|| Error::not_found("attribute", id))
    }

    pub fn relation(&self, id: &UnitId) -> Result<&Relation> {
        self.relations
            .get(id)
            .ok_or_else(|| Error::not_found("relation", id))
    }

    pub fn identifier(&self, id: &UnitId) -> Result<&EntityIdentifier> {
        self.identifiers
            .get(id)
            .ok_or_else(|| Error::not_found("identifier", id))
    }

    /// Check whether a catalogued unit is registered under `id`.
    pub fn contains(&self, id: &UnitId) -> bool {
        self.all_units_by_id.contains_key(id)
    }

    /// Ids of every catalogued unit.
    pub fn unit_ids(&self) -> BTreeSet<UnitId> {
        self.all_units_by_id.keys().cloned().collect()
    }

    /// Every catalogued unit, ordered by id.
    pub fn units(&self) -> impl Iterator<Item = &LogicalUnit> {
        self.all_units_by_id.values()
    }

    pub fn all_units_by_id(&self) -> &BTreeMap<UnitId, LogicalUnit> {
        &self.all_units_by_id
    }

    pub fn entities(&self) -> &BTreeMap<UnitId, Entity> {
        &self.entities
    }

    pub fn attributes(&self) -> &BTreeMap<UnitId, Attribute> {
        &self.attributes
    }

    pub fn relations(&self) -> &BTreeMap<UnitId, Relation> {
        &self.relations
    }

    pub fn identifiers(&self) -> &BTreeMap<UnitId, EntityIdentifier> {
        &self.identifiers
    }

    /// Attribute ids registered under an entity.
    pub fn attributes_of(&self, entity_id: &UnitId) -> &[UnitId] {
        self.attributes_by_entity_id
            .get(entity_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Relation ids touching an entity, as source or target.
    pub fn relations_of(&self, entity_id: &UnitId) -> &[UnitId] {
        self.relations_by_entity_id
            .get(entity_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Identifier ids registered under an entity.
    pub fn identifiers_of(&self, entity_id: &UnitId) -> &[UnitId] {
        self.identifiers_by_entity_id
            .get(entity_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Physical natural keys a unit maps to.
    pub fn pm_objects_of(&self, id: &UnitId) -> &[String] {
        self.pm_objects_by_lm_id
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn pm_objects_by_lm_id(&self) -> &BTreeMap<UnitId, Vec<String>> {
        &self.pm_objects_by_lm_id
    }

    pub fn attributes_by_entity_id(&self) -> &BTreeMap<UnitId, Vec<UnitId>> {
        &self.attributes_by_entity_id
    }

    pub fn relations_by_entity_id(&self) -> &BTreeMap<UnitId, Vec<UnitId>> {
        &self.relations_by_entity_id
    }

    pub fn identifiers_by_entity_id(&self) -> &BTreeMap<UnitId, Vec<UnitId>> {
        &self.identifiers_by_entity_id
    }

    pub fn dependencies(&self) -> &BTreeMap<UnitId, Vec<UnitId>> {
        &self.dependencies
    }

    /// Number of catalogued units.
    pub fn len(&self) -> usize {
        self.all_units_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_units_by_id.is_empty()
    }
}
