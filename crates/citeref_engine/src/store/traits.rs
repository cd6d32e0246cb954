/* 📖 # Why a ReferenceStore trait?

Reference data is written by whatever renders pages and only read here. The
lookup endpoint needs "give me what is stored for this page", so it depends on
this read-only trait rather than on a storage engine. Tests substitute an
in-memory store, or wrap one to count accesses.

Absence is `Ok(None)`: a page without stored references is a normal outcome.
`Err` is reserved for the store itself failing.
*/

use std::sync::Arc;

use citeref_base::CiterefResult;

use crate::reference::{PageId, StoredReferenceSet};

/// Read access to per-page reference sets.
pub trait ReferenceStore: Send + Sync + 'static {
    /// Retrieve what is stored for a page.
    ///
    /// # Returns
    /// * `Ok(Some(set))` - If references are stored for the page
    /// * `Ok(None)` - If nothing is stored for the page
    fn stored_references(&self, page: PageId) -> CiterefResult<Option<StoredReferenceSet>>;

    /// Number of pages with stored references.
    fn len(&self) -> CiterefResult<usize>;

    /// Returns true if no page has stored references.
    fn is_empty(&self) -> CiterefResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// A shared handle to a reference store.
///
/// Cheap to clone, so every HTTP worker thread can read from one store.
#[derive(Clone)]
pub struct StoreHandle(Arc<dyn ReferenceStore>);

impl StoreHandle {
    /// Create a new StoreHandle wrapping the given store implementation.
    pub fn new<S: ReferenceStore>(store: S) -> Self {
        Self(Arc::new(store))
    }

    /// See [`ReferenceStore::stored_references`].
    pub fn stored_references(&self, page: PageId) -> CiterefResult<Option<StoredReferenceSet>> {
        self.0.stored_references(page)
    }

    /// See [`ReferenceStore::len`].
    pub fn len(&self) -> CiterefResult<usize> {
        self.0.len()
    }

    /// See [`ReferenceStore::is_empty`].
    pub fn is_empty(&self) -> CiterefResult<bool> {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}
