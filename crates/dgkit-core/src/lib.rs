//! dgkit core - cross-model indexing and data catalog synchronization.
//!
//! This crate reconciles a logical model, a physical model and business
//! information into one cross-referenced graph, and keeps an external data
//! catalog in step with the logical model across versions.

pub mod catalog;
pub mod check;
pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod sync;
pub mod xref;

pub use catalog::{
    AttributePage, CatalogEngine, DataCatalog, DataCatalogRow, DataUnitPage, EntityPage,
    IndexedCatalog, LocalSnapshot, MemoryCatalogEngine, ObjectReference, RelationPage,
    SnapshotStore,
};
pub use check::{Convention, ConventionRule, Finding, ModelView, Severity};
pub use config::CatalogConfig;
pub use error::{EngineError, Error, Result};
pub use identity::{assign_id, assign_id_from_parts, UnitId};
pub use model::{
    Attribute, BusinessInformation, BusinessUnit, Column, Contact, DataUnitType, Document, Email,
    Entity, EntityIdentifier, Layer, LogicalModel, LogicalUnit, ModelDatabase, PhysicalModel,
    PhysicalUnit, Relation, Table, Team, Url, Versioned,
};
pub use sync::{SyncEngine, SyncFailure, SyncOptions, SyncPhase, SyncPlan, SyncReport};
pub use xref::CrossReference;
