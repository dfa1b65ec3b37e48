//! Detail pages of catalogued units.
//!
//! A page holds object references to related units, never the related units
//! themselves. Business information is copied by value.

use super::row::ObjectReference;
use crate::identity::UnitId;
use crate::model::{DataUnitType, Document, Team};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPage {
    pub id: UnitId,
    /// Reference of the entity's own row.
    pub reference: ObjectReference,
    pub description: String,
    pub pk_attributes_references: Vec<ObjectReference>,
    pub attributes_references: Vec<ObjectReference>,
    pub relations_references: Vec<ObjectReference>,
    pub linked_documents: Vec<Document>,
    pub responsible_parties: Vec<Team>,
    /// Natural keys of the mapped physical units.
    pub pm_mapping_references: Vec<String>,
    pub source_systems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePage {
    pub id: UnitId,
    pub reference: ObjectReference,
    pub description: String,
    pub parent_entity_reference: ObjectReference,
    pub data_type: String,
    pub sensitivity_type: String,
    pub linked_documents: Vec<Document>,
    pub responsible_parties: Vec<Team>,
    pub pm_mapping_references: Vec<String>,
    pub source_systems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPage {
    pub id: UnitId,
    pub reference: ObjectReference,
    pub description: String,
    pub source_entity_reference: ObjectReference,
    pub target_entity_reference: ObjectReference,
    pub optional_source: Option<bool>,
    pub optional_target: Option<bool>,
    pub source_cardinality: Option<String>,
    pub target_cardinality: Option<String>,
    pub linked_documents: Vec<Document>,
    pub responsible_parties: Vec<Team>,
    pub pm_mapping_references: Vec<String>,
    pub source_systems: Vec<String>,
}

/// A page of any catalogued unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "data_unit_type", rename_all = "lowercase")]
pub enum DataUnitPage {
    Entity(EntityPage),
    Attribute(AttributePage),
    Relation(RelationPage),
}

impl DataUnitPage {
    pub fn id(&self) -> &UnitId {
        match self {
            DataUnitPage::Entity(p) => &p.id,
            DataUnitPage::Attribute(p) => &p.id,
            DataUnitPage::Relation(p) => &p.id,
        }
    }

    /// Reference of the unit owning the page.
    pub fn reference(&self) -> &ObjectReference {
        match self {
            DataUnitPage::Entity(p) => &p.reference,
            DataUnitPage::Attribute(p) => &p.reference,
            DataUnitPage::Relation(p) => &p.reference,
        }
    }

    pub fn data_unit_type(&self) -> DataUnitType {
        match self {
            DataUnitPage::Entity(_) => DataUnitType::Entity,
            DataUnitPage::Attribute(_) => DataUnitType::Attribute,
            DataUnitPage::Relation(_) => DataUnitType::Relation,
        }
    }

    /// Every reference to another unit held by the page.
    pub fn linked_references(&self) -> Vec<&ObjectReference> {
        match self {
            DataUnitPage::Entity(p) => p
                .pk_attributes_references
                .iter()
                .chain(&p.attributes_references)
                .chain(&p.relations_references)
                .collect(),
            DataUnitPage::Attribute(p) => vec![&p.parent_entity_reference],
            DataUnitPage::Relation(p) => {
                vec![&p.source_entity_reference, &p.target_entity_reference]
            }
        }
    }
}
