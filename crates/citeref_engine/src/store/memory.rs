/* 📖 # Why provide an in-memory store implementation?

The InMemoryStore keeps reference sets in a HashMap keyed by page id. It backs the
tests and the CLI, which loads a JSON data file at startup:

    {"5": {"refs": {...}}, "9": {"refs": {...}}}

Page ids are the object keys; each value is a stored reference set.
*/

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use citeref_base::{CiterefError, CiterefResult, ErrorKind, ResultExt};
use tracing::debug;

use crate::reference::{PageId, StoredReferenceSet};
use crate::store::traits::ReferenceStore;

/// An in-memory reference store backed by a HashMap.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pages: HashMap<PageId, StoredReferenceSet>,
}

impl InMemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    /// Build a store from a JSON document mapping page ids to reference sets.
    pub fn from_json_str(json: &str) -> CiterefResult<Self> {
        let pages: BTreeMap<PageId, StoredReferenceSet> = serde_json::from_str(json)
            .map_err(|e| Box::new(CiterefError::parse("reference data", e.to_string())))?;
        debug!(pages = pages.len(), "parsed stored reference data");
        Ok(Self {
            pages: pages.into_iter().collect(),
        })
    }

    /// Load a store from a JSON data file.
    pub fn load_json_file(path: &Path) -> CiterefResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Box::new(CiterefError::new(ErrorKind::FileError {
                path: path.to_path_buf(),
                source: e,
            }))
        })?;
        Self::from_json_str(&json).with_context(|| format!("loading {}", path.display()))
    }

    /// Store the reference set for a page, replacing any previous one.
    pub fn insert(&mut self, page: PageId, references: StoredReferenceSet) -> Option<StoredReferenceSet> {
        self.pages.insert(page, references)
    }
}

impl ReferenceStore for InMemoryStore {
    fn stored_references(&self, page: PageId) -> CiterefResult<Option<StoredReferenceSet>> {
        Ok(self.pages.get(&page).cloned())
    }

    fn len(&self) -> CiterefResult<usize> {
        Ok(self.pages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreHandle;
    use std::io::Write;

    const DATA: &str = r#"{
        "5": {"refs": {"0": {"": {"": {"key": 1, "text": "Five"}}}}},
        "9": {"refs": {}}
    }"#;

    #[test]
    fn test_store_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_store_insert_replaces() {
        let mut store = InMemoryStore::new();
        let page = PageId::new(7);
        assert!(store.stored_references(page).unwrap().is_none());

        assert!(store.insert(page, StoredReferenceSet::default()).is_none());
        assert!(store.insert(page, StoredReferenceSet::default()).is_some());
        assert_eq!(
            store.stored_references(page).unwrap(),
            Some(StoredReferenceSet::default())
        );
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_from_json_str() {
        let store = InMemoryStore::from_json_str(DATA).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        let five = store.stored_references(PageId::new(5)).unwrap().unwrap();
        assert_eq!(five.record_count(), 1);
        let nine = store.stored_references(PageId::new(9)).unwrap().unwrap();
        assert_eq!(nine.record_count(), 0);
        assert!(store.stored_references(PageId::new(12)).unwrap().is_none());
    }

    #[test]
    fn test_from_json_str_rejects_bad_page_id() {
        let err = InMemoryStore::from_json_str(r#"{"five": {"refs": {}}}"#).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse reference data"));
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DATA.as_bytes()).unwrap();
        let store = InMemoryStore::load_json_file(file.path()).unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_load_json_file_missing() {
        let err = InMemoryStore::load_json_file(Path::new("/nonexistent/references.json")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FileError { .. }));
    }

    #[test]
    fn test_store_handle_reads_shared_store() {
        let mut store = InMemoryStore::new();
        store.insert(PageId::new(3), StoredReferenceSet::default());
        let handle1 = StoreHandle::new(store);
        let handle2 = handle1.clone();

        let reader = std::thread::spawn(move || handle2.stored_references(PageId::new(3)).unwrap());
        assert!(reader.join().unwrap().is_some());
        assert_eq!(handle1.len().unwrap(), 1);
        assert!(!handle1.is_empty().unwrap());
        assert!(handle1.stored_references(PageId::new(4)).unwrap().is_none());
    }
}
