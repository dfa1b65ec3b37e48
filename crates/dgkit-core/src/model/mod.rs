//! Model registries for the three descriptions of a data estate.
//!
//! - [`LogicalModel`]: business entities, attributes, identifiers and relations.
//! - [`PhysicalModel`]: storage layers, tables and columns.
//! - [`BusinessInformation`]: teams, contacts, documents, emails and urls.
//!
//! A registry is built once per parse: the parser receives it by `&mut` and calls
//! the `register_*` methods. Registration is idempotent per id (last write wins)
//! and keeps the derived indices in step with the unit maps.

mod business;
mod database;
mod logical;
mod physical;

pub use business::{BusinessInformation, BusinessUnit, Contact, Document, Email, Team, Url};
pub use database::{ModelDatabase, Versioned};
pub use logical::{
    Attribute, DataUnitType, Entity, EntityIdentifier, LogicalModel, LogicalUnit, Relation,
};
pub use physical::{Column, Layer, PhysicalModel, PhysicalUnit, Table};

use crate::error::{Error, Result};
use crate::identity::UnitId;
use std::collections::BTreeMap;

/// Append `value` under `key` unless it is already listed there.
pub(crate) fn push_unique<K: Ord, V: PartialEq>(
    index: &mut BTreeMap<K, Vec<V>>,
    key: K,
    value: V,
) {
    let values = index.entry(key).or_default();
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Remove `value` from the list under `key`, dropping the key once empty.
pub(crate) fn remove_from_index<K: Ord, V: PartialEq>(
    index: &mut BTreeMap<K, Vec<V>>,
    key: &K,
    value: &V,
) {
    if let Some(values) = index.get_mut(key) {
        values.retain(|v| v != value);
        if values.is_empty() {
            index.remove(key);
        }
    }
}

pub(crate) fn ensure_natural_key(kind: &'static str, natural_key: &str) -> Result<()> {
    if natural_key.trim().is_empty() {
        return Err(Error::InvalidNaturalKey { kind });
    }
    Ok(())
}

/// Reject a registration whose id is already held by a different unit.
pub(crate) fn ensure_same_identity(
    id: &UnitId,
    existing: Option<(&'static str, &str)>,
    incoming: (&'static str, &str),
) -> Result<()> {
    match existing {
        Some((kind, natural_key)) if kind != incoming.0 || natural_key != incoming.1 => {
            Err(Error::IdentityConflict {
                id: id.clone(),
                existing: format!("{} '{}'", kind, natural_key),
                incoming: format!("{} '{}'", incoming.0, incoming.1),
            })
        }
        _ => Ok(()),
    }
}
