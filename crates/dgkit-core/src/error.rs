//! Core error types.

use crate::identity::UnitId;
use thiserror::Error;

/// Boxed error produced by a catalog engine implementation.
pub type EngineError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the core crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core dgkit errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Lookup miss in a registry or in the catalog mirror.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind of unit or record that was looked up.
        kind: &'static str,
        /// The id or natural key used for the lookup.
        key: String,
    },

    /// An add was requested for an id the mirror already holds.
    #[error("duplicate id in catalog mirror: {id}")]
    DuplicateId {
        /// The offending unit id.
        id: UnitId,
    },

    /// The catalog engine refused to create a record that already exists.
    #[error("record already exists in catalog store: {id}")]
    AlreadyExists {
        /// The offending unit id.
        id: UnitId,
    },

    /// A page field references a unit that has no object reference.
    #[error("unit {unit_id} references unknown unit {missing_id} via {field}")]
    UnresolvedReference {
        /// The unit whose page was being built.
        unit_id: UnitId,
        /// Name of the page field holding the reference.
        field: &'static str,
        /// The id that could not be resolved.
        missing_id: UnitId,
    },

    /// Two distinct units derived the same id.
    #[error("identity conflict on {id}: registered {existing}, incoming {incoming}")]
    IdentityConflict {
        /// The shared id.
        id: UnitId,
        /// Description of the unit already registered.
        existing: String,
        /// Description of the unit being registered.
        incoming: String,
    },

    /// A unit was constructed with an empty natural key.
    #[error("{kind} registered with an empty natural key")]
    InvalidNaturalKey {
        /// Kind of the rejected unit.
        kind: &'static str,
    },

    /// Error surfaced unmodified from a catalog engine.
    #[error("catalog engine error: {0}")]
    Engine(#[source] EngineError),

    /// Snapshot content is unusable.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a `NotFound` error.
    pub fn not_found(kind: &'static str, key: impl std::fmt::Display) -> Self {
        Error::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Wrap an engine-specific error.
    pub fn engine<E>(err: E) -> Self
    where
        E: Into<EngineError>,
    {
        Error::Engine(err.into())
    }

    /// Check if this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
