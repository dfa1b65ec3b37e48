//! Catalog configuration.

use std::path::PathBuf;

/// Default directory holding catalog snapshots.
pub const DEFAULT_CHECKPOINT_PATH: &str = "./.dgkit";

/// Default catalog name, used as the snapshot file stem.
pub const DEFAULT_CATALOG_NAME: &str = "data_catalog";

/// Domain written to rows of units without one.
pub const DEFAULT_DOMAIN: &str = "General";

/// Settings consumed by the catalog mirror and the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Directory holding `<catalog_name>.snapshot.json`.
    pub checkpoint_path: PathBuf,

    /// Name of the catalog.
    pub catalog_name: String,

    /// Domain used for units that do not declare one.
    pub default_domain: String,
}

impl CatalogConfig {
    /// Create a configuration with the given checkpoint directory.
    pub fn new(checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            catalog_name: DEFAULT_CATALOG_NAME.to_string(),
            default_domain: DEFAULT_DOMAIN.to_string(),
        }
    }

    /// Set the catalog name.
    pub fn with_catalog_name(mut self, name: impl Into<String>) -> Self {
        self.catalog_name = name.into();
        self
    }

    /// Set the default domain.
    pub fn with_default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = domain.into();
        self
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_PATH)
    }
}
