//! Local snapshot cache of the catalog mirror.
//!
//! A snapshot is a JSON envelope around the serialized [`IndexedCatalog`]:
//!
//! ```text
//! { "format": "dgkit.catalog-snapshot", "format_version": 1,
//!   "catalog_name": "...", "saved_at": "...", "checksum": "<blake3 hex>",
//!   "catalog": { "row_by_id": ..., "page_by_id": ..., "reference_by_id": ... } }
//! ```
//!
//! The checksum covers the serialized `catalog` value. Loading re-serializes the
//! decoded catalog and compares digests, so any edit to the catalog body is
//! detected.

use super::row::IndexedCatalog;
use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Envelope format tag.
pub const SNAPSHOT_FORMAT: &str = "dgkit.catalog-snapshot";

/// Current envelope version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// File name suffix of snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "snapshot.json";

/// Persistent store for the catalog mirror.
pub trait SnapshotStore {
    /// Load the saved mirror, `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<IndexedCatalog>>;

    /// Replace the saved mirror.
    fn save(&self, catalog: &IndexedCatalog) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format: String,
    format_version: u32,
    catalog_name: String,
    saved_at: DateTime<Utc>,
    checksum: String,
    catalog: IndexedCatalog,
}

/// Snapshot file under a checkpoint directory.
#[derive(Debug, Clone)]
pub struct LocalSnapshot {
    checkpoint_path: PathBuf,
    catalog_name: String,
}

impl LocalSnapshot {
    pub fn new(checkpoint_path: impl Into<PathBuf>, catalog_name: impl Into<String>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            catalog_name: catalog_name.into(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.checkpoint_path, &config.catalog_name)
    }

    /// `<checkpoint_path>/<catalog_name>.snapshot.json`.
    pub fn path(&self) -> PathBuf {
        self.checkpoint_path
            .join(format!("{}.{}", self.catalog_name, SNAPSHOT_EXTENSION))
    }

    pub fn catalog_name(&self) -> &str {
        &self.catalog_name
    }

    fn verify(&self, envelope: &SnapshotEnvelope, path: &Path) -> Result<()> {
        if envelope.format != SNAPSHOT_FORMAT {
            return Err(Error::Snapshot(format!(
                "{}: unexpected format '{}'",
                path.display(),
                envelope.format
            )));
        }
        if envelope.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::Snapshot(format!(
                "{}: unsupported format version {}",
                path.display(),
                envelope.format_version
            )));
        }
        if envelope.catalog_name != self.catalog_name {
            return Err(Error::Snapshot(format!(
                "{}: snapshot belongs to catalog '{}'",
                path.display(),
                envelope.catalog_name
            )));
        }
        let actual = checksum(&envelope.catalog)?;
        if actual != envelope.checksum {
            return Err(Error::Snapshot(format!(
                "{}: checksum mismatch (expected {}, got {})",
                path.display(),
                envelope.checksum,
                actual
            )));
        }
        Ok(())
    }
}

impl SnapshotStore for LocalSnapshot {
    fn load(&self) -> Result<Option<IndexedCatalog>> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No snapshot found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: SnapshotEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))?;
        self.verify(&envelope, &path)?;

        info!(
            path = %path.display(),
            rows = envelope.catalog.len(),
            saved_at = %envelope.saved_at,
            "Loaded catalog snapshot"
        );
        Ok(Some(envelope.catalog))
    }

    fn save(&self, catalog: &IndexedCatalog) -> Result<()> {
        fs::create_dir_all(&self.checkpoint_path)?;

        let envelope = SnapshotEnvelope {
            format: SNAPSHOT_FORMAT.to_string(),
            format_version: SNAPSHOT_FORMAT_VERSION,
            catalog_name: self.catalog_name.clone(),
            saved_at: Utc::now(),
            checksum: checksum(catalog)?,
            catalog: catalog.clone(),
        };

        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(&envelope)?)?;
        fs::rename(&tmp_path, &path)?;

        debug!(path = %path.display(), rows = catalog.len(), "Saved catalog snapshot");
        Ok(())
    }
}

fn checksum(catalog: &IndexedCatalog) -> Result<String> {
    let bytes = serde_json::to_vec(catalog)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
