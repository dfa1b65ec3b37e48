//! Versioned synchronization of the logical model into the catalog.

mod builder;
mod engine;
mod report;

pub use builder::{build_row, PageBuilder};
pub use engine::{SyncEngine, SyncOptions};
pub use report::{SyncFailure, SyncPhase, SyncPlan, SyncReport};
