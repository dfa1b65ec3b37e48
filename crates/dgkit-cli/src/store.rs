//! File-backed catalog engine.
//!
//! Keeps every catalog record in one JSON document. Records are addressed by a
//! random reference link; deleted records are archived rather than dropped.

use chrono::Utc;
use dgkit_core::{
    CatalogEngine, DataCatalogRow, DataUnitPage, Error, IndexedCatalog, ObjectReference, UnitId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Store format version.
const STORE_VERSION: u32 = 1;

/// Store-side failures, surfaced as [`Error::Engine`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the store file failed.
    #[error("catalog store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file is not a valid catalog store.
    #[error("corrupt catalog store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The store was written by an unsupported format version.
    #[error("unsupported catalog store version {0}")]
    UnsupportedVersion(u32),

    /// No live record at the reference link.
    #[error("no record at {0}")]
    UnknownRecord(String),

    /// The reference link points at another unit's record.
    #[error("record {link} belongs to {actual}, not {expected}")]
    ReferenceMismatch {
        link: String,
        expected: UnitId,
        actual: UnitId,
    },

    /// A page was written for a unit without a row.
    #[error("no row for {0}")]
    MissingRow(UnitId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    row: DataCatalogRow,
    page: Option<DataUnitPage>,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    /// Records keyed by reference link.
    records: BTreeMap<String, StoredRecord>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            records: BTreeMap::new(),
        }
    }
}

/// Catalog engine persisting to a local JSON file.
#[derive(Debug)]
pub struct FileCatalogEngine {
    path: PathBuf,
    store: StoreFile,
}

impl FileCatalogEngine {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> dgkit_core::Result<Self> {
        let path = path.into();
        let store = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|source| {
                Error::engine(StoreError::Io {
                    path: path.clone(),
                    source,
                })
            })?;
            let store: StoreFile = serde_json::from_slice(&bytes).map_err(|source| {
                Error::engine(StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })
            })?;
            if store.version != STORE_VERSION {
                return Err(Error::engine(StoreError::UnsupportedVersion(store.version)));
            }
            store
        } else {
            StoreFile::default()
        };

        debug!(path = %path.display(), records = store.records.len(), "Opened catalog store");
        Ok(Self { path, store })
    }

    /// Number of records, archived ones included.
    pub fn record_count(&self) -> usize {
        self.store.records.len()
    }

    /// Number of archived records.
    pub fn archived_count(&self) -> usize {
        self.store.records.values().filter(|r| r.archived).count()
    }

    fn live_link_of(&self, id: &UnitId) -> Option<&str> {
        self.store
            .records
            .iter()
            .find(|(_, record)| !record.archived && &record.row.id == id)
            .map(|(link, _)| link.as_str())
    }

    fn live_record_mut(
        &mut self,
        reference: &ObjectReference,
    ) -> dgkit_core::Result<&mut StoredRecord> {
        let record = self
            .store
            .records
            .get_mut(&reference.reference_link)
            .filter(|record| !record.archived)
            .ok_or_else(|| {
                Error::engine(StoreError::UnknownRecord(reference.reference_link.clone()))
            })?;
        if record.row.id != reference.id {
            return Err(Error::engine(StoreError::ReferenceMismatch {
                link: reference.reference_link.clone(),
                expected: reference.id.clone(),
                actual: record.row.id.clone(),
            }));
        }
        Ok(record)
    }

    fn page_record_mut(&mut self, id: &UnitId) -> dgkit_core::Result<&mut StoredRecord> {
        let link = self
            .live_link_of(id)
            .map(str::to_string)
            .ok_or_else(|| Error::engine(StoreError::MissingRow(id.clone())))?;
        self.store
            .records
            .get_mut(&link)
            .ok_or_else(|| Error::engine(StoreError::UnknownRecord(link)))
    }

    /// Insert a new live record for `row` under a fresh link.
    fn insert_record(&mut self, row: &DataCatalogRow) -> ObjectReference {
        let now = Utc::now();
        let mut stored = row.clone();
        stored.created_time = stored.created_time.or(Some(now));
        stored.last_edited_time = Some(now);

        let link = Uuid::new_v4().to_string();
        self.store.records.insert(
            link.clone(),
            StoredRecord {
                row: stored,
                page: None,
                archived: false,
            },
        );
        ObjectReference::new(row.id.clone(), link)
    }

    /// Write the store through a temporary file.
    fn persist(&self) -> dgkit_core::Result<()> {
        let io_error = |source| {
            Error::engine(StoreError::Io {
                path: self.path.clone(),
                source,
            })
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.store)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(io_error)?;
        std::fs::rename(&tmp, &self.path).map_err(io_error)?;
        Ok(())
    }
}

impl CatalogEngine for FileCatalogEngine {
    fn pull_data_catalog(&mut self) -> dgkit_core::Result<IndexedCatalog> {
        let mut catalog = IndexedCatalog::new();
        for (link, record) in self.store.records.iter().filter(|(_, r)| !r.archived) {
            let id = record.row.id.clone();
            catalog.row_by_id.insert(id.clone(), record.row.clone());
            catalog
                .reference_by_id
                .insert(id.clone(), ObjectReference::new(id.clone(), link.clone()));
            if let Some(page) = &record.page {
                catalog.page_by_id.insert(id, page.clone());
            }
        }
        debug!(rows = catalog.len(), "Pulled catalog from store");
        Ok(catalog)
    }

    fn add_row(&mut self, row: &DataCatalogRow) -> dgkit_core::Result<ObjectReference> {
        if self.live_link_of(&row.id).is_some() {
            return Err(Error::AlreadyExists { id: row.id.clone() });
        }

        let reference = self.insert_record(row);
        self.persist()?;
        Ok(reference)
    }

    fn update_row(
        &mut self,
        row: &DataCatalogRow,
        reference: Option<&ObjectReference>,
    ) -> dgkit_core::Result<ObjectReference> {
        let reference = match reference {
            Some(reference) => reference.clone(),
            None => match self.live_link_of(&row.id).map(str::to_string) {
                Some(link) => ObjectReference::new(row.id.clone(), link),
                None => {
                    let reference = self.insert_record(row);
                    debug!(
                        unit_id = %row.id,
                        link = %reference.reference_link,
                        "Created missing record"
                    );
                    self.persist()?;
                    return Ok(reference);
                }
            },
        };

        let record = self.live_record_mut(&reference)?;
        let created_time = row.created_time.or(record.row.created_time);
        record.row = row.clone();
        record.row.created_time = created_time;
        record.row.last_edited_time = Some(Utc::now());
        self.persist()?;
        Ok(reference)
    }

    fn add_page(&mut self, page: &DataUnitPage) -> dgkit_core::Result<()> {
        let record = self.page_record_mut(page.id())?;
        if record.page.is_some() {
            return Err(Error::AlreadyExists {
                id: page.id().clone(),
            });
        }
        record.page = Some(page.clone());
        self.persist()
    }

    fn update_page(&mut self, page: &DataUnitPage) -> dgkit_core::Result<()> {
        let record = self.page_record_mut(page.id())?;
        record.page = Some(page.clone());
        record.row.last_edited_time = Some(Utc::now());
        self.persist()
    }

    fn delete_by_id(&mut self, reference: &ObjectReference) -> dgkit_core::Result<()> {
        self.live_record_mut(reference)?.archived = true;
        self.persist()
    }
}
