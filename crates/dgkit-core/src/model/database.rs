//! Versioned storage of model snapshots.

use super::{BusinessInformation, LogicalModel, PhysicalModel};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// A model snapshot tagged with a version string.
pub trait Versioned {
    fn version(&self) -> &str;
}

impl Versioned for LogicalModel {
    fn version(&self) -> &str {
        LogicalModel::version(self)
    }
}

impl Versioned for PhysicalModel {
    fn version(&self) -> &str {
        PhysicalModel::version(self)
    }
}

impl Versioned for BusinessInformation {
    fn version(&self) -> &str {
        BusinessInformation::version(self)
    }
}

/// Model snapshots keyed by version.
///
/// Registering an existing version replaces that snapshot and makes it the latest.
#[derive(Debug, Clone)]
pub struct ModelDatabase<M> {
    models: BTreeMap<String, M>,
    registration_order: Vec<String>,
}

impl<M: Versioned> ModelDatabase<M> {
    pub fn new() -> Self {
        Self {
            models: BTreeMap::new(),
            registration_order: Vec::new(),
        }
    }

    /// Store a snapshot under its own version tag.
    pub fn register(&mut self, model: M) {
        let version = model.version().to_string();
        self.registration_order.retain(|v| v != &version);
        self.registration_order.push(version.clone());
        self.models.insert(version, model);
    }

    pub fn get(&self, version: &str) -> Result<&M> {
        self.models
            .get(version)
            .ok_or_else(|| Error::not_found("model version", version))
    }

    /// Versions in registration order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.registration_order.iter().map(String::as_str)
    }

    /// The most recently registered snapshot.
    pub fn latest(&self) -> Option<&M> {
        self.registration_order
            .last()
            .and_then(|version| self.models.get(version))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl<M: Versioned> Default for ModelDatabase<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;

    #[test]
    fn test_register_and_get() {
        let mut db = ModelDatabase::new();
        db.register(LogicalModel::new("v1"));
        let mut v2 = LogicalModel::new("v2");
        v2.register_entity(Entity::new("orders", "Orders")).unwrap();
        db.register(v2);

        assert_eq!(db.len(), 2);
        assert_eq!(db.get("v2").unwrap().len(), 1);
        assert!(db.get("v3").unwrap_err().is_not_found());
        assert_eq!(db.latest().map(|m| m.version()), Some("v2"));
    }

    #[test]
    fn test_reregister_moves_to_latest() {
        let mut db = ModelDatabase::new();
        db.register(PhysicalModel::new("v1"));
        db.register(PhysicalModel::new("v2"));
        db.register(PhysicalModel::new("v1"));

        assert_eq!(db.versions().collect::<Vec<_>>(), vec!["v2", "v1"]);
        assert_eq!(db.latest().map(|m| m.version()), Some("v1"));
    }
}
