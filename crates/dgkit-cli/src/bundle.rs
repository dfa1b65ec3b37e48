//! JSON model bundle loader.
//!
//! A bundle describes one version of the three models in a single document.
//! Units refer to each other by natural key; the loader resolves those keys
//! into ids and registers everything with fresh registries.
//!
//! ```json
//! {
//!   "version": "v1",
//!   "layers": [{ "name": "core" }],
//!   "tables": [{ "layer": "core", "name": "orders", "depends_on": ["raw.orders"] }],
//!   "columns": [{ "table": "core.orders", "name": "id", "data_type": "bigint" }],
//!   "teams": [{ "key": "team.sales", "name": "Sales" }],
//!   "documents": [{ "key": "doc.orders", "name": "Orders glossary" }],
//!   "entities": [{
//!     "key": "orders", "name": "Orders", "pm_map": ["core.orders"],
//!     "responsible_parties": ["team.sales"],
//!     "attributes": [{ "key": "orders.id", "name": "id", "pm_map": ["core.orders.id"] }],
//!     "identifiers": [{ "key": "orders.pk", "is_pk": true, "attributes": ["orders.id"] }]
//!   }],
//!   "relations": [{ "key": "orders.customer", "name": "placed by", "source": "orders", "target": "customer" }]
//! }
//! ```

use chrono::{DateTime, Utc};
use dgkit_core::{
    assign_id, Attribute, BusinessInformation, Column, Contact, Document, Email, Entity,
    EntityIdentifier, Layer, LogicalModel, PhysicalModel, Relation, Table, Team, Url,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors raised while loading a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The bundle file could not be read.
    #[error("failed to read bundle {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bundle is not valid JSON or does not match the schema.
    #[error("invalid bundle: {0}")]
    Parse(#[from] serde_json::Error),

    /// A unit refers to a natural key the bundle does not define.
    #[error("{owner} refers to unknown {kind} '{key}'")]
    UnknownKey {
        owner: String,
        kind: &'static str,
        key: String,
    },

    /// A registry rejected a unit.
    #[error(transparent)]
    Model(#[from] dgkit_core::Error),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelBundle {
    pub version: String,
    #[serde(default)]
    pub layers: Vec<LayerEntry>,
    #[serde(default)]
    pub tables: Vec<TableEntry>,
    #[serde(default)]
    pub columns: Vec<ColumnEntry>,
    #[serde(default)]
    pub teams: Vec<TeamEntry>,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
    #[serde(default)]
    pub entities: Vec<EntityEntry>,
    #[serde(default)]
    pub relations: Vec<RelationEntry>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LayerEntry {
    pub name: String,
    #[serde(default)]
    pub is_landing: bool,
}

#[derive(Debug, Deserialize)]
pub struct TableEntry {
    pub layer: String,
    pub name: String,
    /// Natural keys (`layer.table`) of upstream tables.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnEntry {
    /// Natural key of the owning table.
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct TeamEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub contacts: Vec<ContactEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ContactEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub emails: Vec<ChannelEntry>,
    #[serde(default)]
    pub urls: Vec<ChannelEntry>,
}

/// An email or url of a contact.
#[derive(Debug, Deserialize)]
pub struct ChannelEntry {
    pub key: String,
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentEntry {
    pub key: String,
    pub name: String,
    pub reference: Option<String>,
}

/// Fields shared by entities, attributes and relations.
#[derive(Debug, Default, Deserialize)]
pub struct Descriptive {
    pub domain: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pm_map: Vec<String>,
    #[serde(default)]
    pub source_systems: Vec<String>,
    /// Team keys.
    #[serde(default)]
    pub responsible_parties: Vec<String>,
    /// Document keys.
    #[serde(default)]
    pub documents: Vec<String>,
    pub created_by: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct EntityEntry {
    pub key: String,
    pub name: String,
    #[serde(flatten)]
    pub descriptive: Descriptive,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
    #[serde(default)]
    pub identifiers: Vec<IdentifierEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AttributeEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub sensitivity_type: String,
    #[serde(flatten)]
    pub descriptive: Descriptive,
}

#[derive(Debug, Deserialize)]
pub struct IdentifierEntry {
    pub key: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_pk: bool,
    /// Attribute keys.
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RelationEntry {
    pub key: String,
    pub name: String,
    /// Source entity key.
    pub source: String,
    /// Target entity key.
    pub target: String,
    pub optional_source: Option<bool>,
    pub optional_target: Option<bool>,
    pub source_cardinality: Option<String>,
    pub target_cardinality: Option<String>,
    #[serde(flatten)]
    pub descriptive: Descriptive,
}

#[derive(Debug, Deserialize)]
pub struct DependencyEntry {
    /// Dependent entity key.
    pub entity: String,
    /// Dependency attribute key.
    pub attribute: String,
}

/// The three registries built from a bundle.
#[derive(Debug)]
pub struct LoadedModels {
    pub lm: LogicalModel,
    pub pm: PhysicalModel,
    pub bi: BusinessInformation,
}

impl ModelBundle {
    /// Read and parse a bundle file.
    pub fn from_path(path: &Path) -> Result<Self, BundleError> {
        let text = std::fs::read_to_string(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Build the registries. Business information first, then physical, then logical.
    pub fn load(&self) -> Result<LoadedModels, BundleError> {
        let bi = self.load_business()?;
        let pm = self.load_physical()?;
        let lm = self.load_logical(&bi)?;

        info!(
            version = %self.version,
            lm_units = lm.len(),
            pm_units = pm.len(),
            bi_units = bi.len(),
            "Loaded model bundle"
        );
        Ok(LoadedModels { lm, pm, bi })
    }

    fn load_business(&self) -> Result<BusinessInformation, BundleError> {
        let mut bi = BusinessInformation::new(&self.version);
        for entry in &self.teams {
            let mut team = Team::new(&entry.key, &entry.name);
            for contact_entry in &entry.contacts {
                let mut contact = Contact::new(&contact_entry.key, &contact_entry.name);
                for email in &contact_entry.emails {
                    let mut unit = Email::new(&email.key, &email.name);
                    if let Some(address) = &email.value {
                        unit = unit.with_address(address);
                    }
                    contact = contact.with_email(unit);
                }
                for url in &contact_entry.urls {
                    let mut unit = Url::new(&url.key, &url.name);
                    if let Some(value) = &url.value {
                        unit = unit.with_url(value);
                    }
                    contact = contact.with_url(unit);
                }
                team = team.with_contact(contact);
            }
            bi.register_team_with_members(team)?;
        }
        for entry in &self.documents {
            let mut document = Document::new(&entry.key, &entry.name);
            if let Some(reference) = &entry.reference {
                document = document.with_reference(reference);
            }
            bi.register_document(document)?;
        }
        Ok(bi)
    }

    fn load_physical(&self) -> Result<PhysicalModel, BundleError> {
        let mut pm = PhysicalModel::new(&self.version);
        for entry in &self.layers {
            pm.register_layer(Layer::new(&entry.name, entry.is_landing))?;
        }
        for entry in &self.tables {
            let layer_id = assign_id(&entry.layer);
            if pm.layer(&layer_id).is_err() {
                return Err(unknown(format!("table {}", entry.name), "layer", &entry.layer));
            }
            let natural_key = format!("{}.{}", entry.layer, entry.name);
            let table = Table::new(natural_key, layer_id, &entry.name);
            for upstream in &entry.depends_on {
                pm.register_dependency(table.id.clone(), assign_id(upstream));
            }
            pm.register_table(table)?;
        }
        for entry in &self.columns {
            let table = pm
                .table(&assign_id(&entry.table))
                .map_err(|_| unknown(format!("column {}", entry.name), "table", &entry.table))?;
            let column = Column::new(
                format!("{}.{}", entry.table, entry.name),
                table.layer_id.clone(),
                table.id.clone(),
                &entry.name,
            )
            .with_data_type(&entry.data_type)
            .with_description(&entry.description);
            pm.register_column(column)?;
        }
        Ok(pm)
    }

    fn load_logical(&self, bi: &BusinessInformation) -> Result<LogicalModel, BundleError> {
        let mut lm = LogicalModel::new(&self.version);

        for entry in &self.entities {
            let mut entity = Entity::new(&entry.key, &entry.name);
            entity.attributes = entry.attributes.iter().map(|a| assign_id(&a.key)).collect();
            entity.identifiers = entry.identifiers.iter().map(|i| assign_id(&i.key)).collect();
            apply_entity(&mut entity, &entry.descriptive, bi)?;

            for attribute_entry in &entry.attributes {
                let mut attribute =
                    Attribute::new(&attribute_entry.key, entity.id.clone(), &attribute_entry.name)
                        .with_data_type(&attribute_entry.data_type)
                        .with_sensitivity_type(&attribute_entry.sensitivity_type);
                let descriptive = &attribute_entry.descriptive;
                attribute.domain = descriptive.domain.clone();
                attribute.description = descriptive.description.clone();
                attribute.pm_map = descriptive.pm_map.clone();
                attribute.source_systems = descriptive.source_systems.clone();
                attribute.responsible_parties =
                    resolve_teams(&attribute_entry.key, &descriptive.responsible_parties, bi)?;
                attribute.documents =
                    resolve_documents(&attribute_entry.key, &descriptive.documents, bi)?;
                attribute.created_by = descriptive.created_by.clone();
                attribute.created_time = descriptive.created_time;
                lm.register_attribute(attribute)?;
            }

            for identifier_entry in &entry.identifiers {
                let mut identifier = EntityIdentifier::new(
                    &identifier_entry.key,
                    entity.id.clone(),
                    identifier_entry.is_pk,
                );
                if let Some(name) = &identifier_entry.name {
                    identifier = identifier.with_name(name);
                }
                for attribute_key in &identifier_entry.attributes {
                    identifier = identifier.with_attribute(assign_id(attribute_key));
                }
                lm.register_identifier(identifier)?;
            }

            lm.register_entity(entity)?;
        }

        for entry in &self.relations {
            let mut relation = Relation::new(
                &entry.key,
                assign_id(&entry.source),
                assign_id(&entry.target),
                &entry.name,
            );
            relation.optional_source = entry.optional_source;
            relation.optional_target = entry.optional_target;
            relation.source_cardinality = entry.source_cardinality.clone();
            relation.target_cardinality = entry.target_cardinality.clone();
            let descriptive = &entry.descriptive;
            relation.domain = descriptive.domain.clone();
            relation.description = descriptive.description.clone();
            relation.pm_map = descriptive.pm_map.clone();
            relation.source_systems = descriptive.source_systems.clone();
            relation.responsible_parties =
                resolve_teams(&entry.key, &descriptive.responsible_parties, bi)?;
            relation.documents = resolve_documents(&entry.key, &descriptive.documents, bi)?;
            relation.created_by = descriptive.created_by.clone();
            relation.created_time = descriptive.created_time;
            lm.register_relation(relation)?;
        }

        for entry in &self.dependencies {
            lm.register_dependency(assign_id(&entry.entity), assign_id(&entry.attribute));
        }
        Ok(lm)
    }
}

fn apply_entity(
    entity: &mut Entity,
    descriptive: &Descriptive,
    bi: &BusinessInformation,
) -> Result<(), BundleError> {
    entity.domain = descriptive.domain.clone();
    entity.description = descriptive.description.clone();
    entity.pm_map = descriptive.pm_map.clone();
    entity.source_systems = descriptive.source_systems.clone();
    entity.responsible_parties =
        resolve_teams(&entity.natural_key, &descriptive.responsible_parties, bi)?;
    entity.documents = resolve_documents(&entity.natural_key, &descriptive.documents, bi)?;
    entity.created_by = descriptive.created_by.clone();
    entity.created_time = descriptive.created_time;
    Ok(())
}

fn resolve_teams(
    owner: &str,
    keys: &[String],
    bi: &BusinessInformation,
) -> Result<Vec<Team>, BundleError> {
    keys.iter()
        .map(|key| {
            bi.team(&assign_id(key))
                .cloned()
                .map_err(|_| unknown(owner.to_string(), "team", key))
        })
        .collect()
}

fn resolve_documents(
    owner: &str,
    keys: &[String],
    bi: &BusinessInformation,
) -> Result<Vec<Document>, BundleError> {
    keys.iter()
        .map(|key| {
            bi.document(&assign_id(key))
                .cloned()
                .map_err(|_| unknown(owner.to_string(), "document", key))
        })
        .collect()
}

fn unknown(owner: String, kind: &'static str, key: &str) -> BundleError {
    BundleError::UnknownKey {
        owner,
        kind,
        key: key.to_string(),
    }
}
