//! Construction of catalog rows and pages from logical units.

use crate::catalog::{
    AttributePage, DataCatalogRow, DataUnitPage, EntityPage, ObjectReference, RelationPage,
};
use crate::error::{Error, Result};
use crate::identity::UnitId;
use crate::model::{Attribute, Entity, LogicalModel, LogicalUnit, Relation};
use std::collections::BTreeMap;

/// Build the index row of a unit.
pub fn build_row(unit: &LogicalUnit, default_domain: &str) -> DataCatalogRow {
    DataCatalogRow::new(
        unit.id().clone(),
        unit.data_unit_type(),
        unit.name(),
        unit.domain().unwrap_or(default_domain),
    )
    .with_created_time(unit.created_time())
}

/// Builds pages, resolving every related unit to its object reference.
pub struct PageBuilder<'a> {
    lm: &'a LogicalModel,
    references: &'a BTreeMap<UnitId, ObjectReference>,
}

impl<'a> PageBuilder<'a> {
    pub fn new(lm: &'a LogicalModel, references: &'a BTreeMap<UnitId, ObjectReference>) -> Self {
        Self { lm, references }
    }

    /// Build the page of a unit.
    ///
    /// Fails with `UnresolvedReference` when the unit itself or any unit it
    /// links to has no reference yet.
    pub fn build(&self, unit: &LogicalUnit) -> Result<DataUnitPage> {
        match unit {
            LogicalUnit::Entity(entity) => self.entity_page(entity).map(DataUnitPage::Entity),
            LogicalUnit::Attribute(attribute) => {
                self.attribute_page(attribute).map(DataUnitPage::Attribute)
            }
            LogicalUnit::Relation(relation) => {
                self.relation_page(relation).map(DataUnitPage::Relation)
            }
        }
    }

    fn entity_page(&self, entity: &Entity) -> Result<EntityPage> {
        let unit_id = &entity.id;

        let mut pk_attribute_ids = Vec::new();
        for identifier_id in self.lm.identifiers_of(unit_id) {
            let identifier = self.lm.identifier(identifier_id)?;
            if identifier.is_pk {
                extend_unique(&mut pk_attribute_ids, &identifier.attributes);
            }
        }

        let mut attribute_ids = self.lm.attributes_of(unit_id).to_vec();
        extend_unique(&mut attribute_ids, &entity.attributes);

        Ok(EntityPage {
            id: unit_id.clone(),
            reference: self.resolve(unit_id, "reference", unit_id)?,
            description: entity.description.clone(),
            pk_attributes_references: self.resolve_all(
                unit_id,
                "pk_attributes_references",
                &pk_attribute_ids,
            )?,
            attributes_references: self.resolve_all(
                unit_id,
                "attributes_references",
                &attribute_ids,
            )?,
            relations_references: self.resolve_all(
                unit_id,
                "relations_references",
                self.lm.relations_of(unit_id),
            )?,
            linked_documents: entity.documents.clone(),
            responsible_parties: entity.responsible_parties.clone(),
            pm_mapping_references: entity.pm_map.clone(),
            source_systems: entity.source_systems.clone(),
        })
    }

    fn attribute_page(&self, attribute: &Attribute) -> Result<AttributePage> {
        let unit_id = &attribute.id;
        Ok(AttributePage {
            id: unit_id.clone(),
            reference: self.resolve(unit_id, "reference", unit_id)?,
            description: attribute.description.clone(),
            parent_entity_reference: self.resolve(
                unit_id,
                "parent_entity_reference",
                &attribute.entity_id,
            )?,
            data_type: attribute.data_type.clone(),
            sensitivity_type: attribute.sensitivity_type.clone(),
            linked_documents: attribute.documents.clone(),
            responsible_parties: attribute.responsible_parties.clone(),
            pm_mapping_references: attribute.pm_map.clone(),
            source_systems: attribute.source_systems.clone(),
        })
    }

    fn relation_page(&self, relation: &Relation) -> Result<RelationPage> {
        let unit_id = &relation.id;
        Ok(RelationPage {
            id: unit_id.clone(),
            reference: self.resolve(unit_id, "reference", unit_id)?,
            description: relation.description.clone(),
            source_entity_reference: self.resolve(
                unit_id,
                "source_entity_reference",
                &relation.source_entity_id,
            )?,
            target_entity_reference: self.resolve(
                unit_id,
                "target_entity_reference",
                &relation.target_entity_id,
            )?,
            optional_source: relation.optional_source,
            optional_target: relation.optional_target,
            source_cardinality: relation.source_cardinality.clone(),
            target_cardinality: relation.target_cardinality.clone(),
            linked_documents: relation.documents.clone(),
            responsible_parties: relation.responsible_parties.clone(),
            pm_mapping_references: relation.pm_map.clone(),
            source_systems: relation.source_systems.clone(),
        })
    }

    fn resolve(
        &self,
        unit_id: &UnitId,
        field: &'static str,
        target: &UnitId,
    ) -> Result<ObjectReference> {
        self.references
            .get(target)
            .cloned()
            .ok_or_else(|| Error::UnresolvedReference {
                unit_id: unit_id.clone(),
                field,
                missing_id: target.clone(),
            })
    }

    fn resolve_all(
        &self,
        unit_id: &UnitId,
        field: &'static str,
        targets: &[UnitId],
    ) -> Result<Vec<ObjectReference>> {
        targets
            .iter()
            .map(|target| self.resolve(unit_id, field, target))
            .collect()
    }
}

fn extend_unique(ids: &mut Vec<UnitId>, more: &[UnitId]) {
    for id in more {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
}
