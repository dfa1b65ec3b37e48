//! Contract of an external catalog store.

use super::page::DataUnitPage;
use super::row::{DataCatalogRow, IndexedCatalog, ObjectReference};
use crate::error::Result;

/// Backend holding the catalog rows and pages.
///
/// Implementations perform blocking I/O and never retry. Store failures are
/// returned as [`Error::Engine`](crate::Error::Engine) wrapping the backend's own
/// error; creates of an existing record fail with
/// [`Error::AlreadyExists`](crate::Error::AlreadyExists).
pub trait CatalogEngine {
    /// Read the entire catalog.
    fn pull_data_catalog(&mut self) -> Result<IndexedCatalog>;

    /// Create a row and return the handle of the new record.
    fn add_row(&mut self, row: &DataCatalogRow) -> Result<ObjectReference>;

    /// Overwrite the row of a unit and return the handle of the written record.
    ///
    /// With a `reference` the record at that handle is rewritten. Without one
    /// the engine locates the unit's record itself and creates it when absent.
    fn update_row(
        &mut self,
        row: &DataCatalogRow,
        reference: Option<&ObjectReference>,
    ) -> Result<ObjectReference>;

    /// Create the page of a unit whose row already exists.
    fn add_page(&mut self, page: &DataUnitPage) -> Result<()>;

    /// Overwrite the page of a unit.
    fn update_page(&mut self, page: &DataUnitPage) -> Result<()>;

    /// Remove (or archive) the record at `reference` with its page.
    fn delete_by_id(&mut self, reference: &ObjectReference) -> Result<()>;
}

impl<E: CatalogEngine + ?Sized> CatalogEngine for Box<E> {
    fn pull_data_catalog(&mut self) -> Result<IndexedCatalog> {
        (**self).pull_data_catalog()
    }

    fn add_row(&mut self, row: &DataCatalogRow) -> Result<ObjectReference> {
        (**self).add_row(row)
    }

    fn update_row(
        &mut self,
        row: &DataCatalogRow,
        reference: Option<&ObjectReference>,
    ) -> Result<ObjectReference> {
        (**self).update_row(row, reference)
    }

    fn add_page(&mut self, page: &DataUnitPage) -> Result<()> {
        (**self).add_page(page)
    }

    fn update_page(&mut self, page: &DataUnitPage) -> Result<()> {
        (**self).update_page(page)
    }

    fn delete_by_id(&mut self, reference: &ObjectReference) -> Result<()> {
        (**self).delete_by_id(reference)
    }
}
