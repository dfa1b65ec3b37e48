//! The external catalog: engine contract, mirror types, mirror and snapshots.

mod data_catalog;
mod engine;
mod memory;
mod page;
mod row;
mod snapshot;

pub use data_catalog::DataCatalog;
pub use engine::CatalogEngine;
pub use memory::{EngineCall, MemoryCatalogEngine, MemoryEngineError};
pub use page::{AttributePage, DataUnitPage, EntityPage, RelationPage};
pub use row::{DataCatalogRow, IndexedCatalog, ObjectReference};
pub use snapshot::{
    LocalSnapshot, SnapshotStore, SNAPSHOT_EXTENSION, SNAPSHOT_FORMAT, SNAPSHOT_FORMAT_VERSION,
};
