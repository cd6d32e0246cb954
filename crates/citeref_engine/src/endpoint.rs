/* 📖 # How does the lookup endpoint paginate?

Requested page ids are sorted ascending and visited in that order. A continuation
cursor is the id of the first page the previous response could not fit; the next
request resumes at the first id greater or equal to it.

For each page the stored reference set is flattened and offered to the result
sink. When the sink refuses a page, the loop stops there and that page becomes the
new cursor, so no page is both returned and skipped.

Two checks happen before any storage access: the feature flag, then the cursor.
*/

use std::sync::Arc;

use citeref_base::{CiterefError, CiterefResult, ErrorKind};
use tracing::{debug, info, instrument};

use crate::config::{ConfigLookup, STORAGE_ENABLED_FLAG};
use crate::ids::ReferenceKeyEncoder;
use crate::reference::{PageId, ReferenceList, flatten_references};
use crate::result::ResultSink;
use crate::store::StoreHandle;

/// Cacheability of the endpoint's responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Responses do not depend on the requester and may be cached by shared caches.
    Public,
}

/// What a lookup did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    /// Pages handed to the sink, in visit order.
    pub processed: Vec<PageId>,
    /// Where the next request should resume, if the sink filled up.
    pub continue_from: Option<PageId>,
}

/// Read-only endpoint that returns the stored references of a set of pages.
pub struct ReferenceLookupEndpoint {
    config: Arc<dyn ConfigLookup>,
    store: StoreHandle,
    encoder: ReferenceKeyEncoder,
}

impl ReferenceLookupEndpoint {
    pub fn new(
        config: Arc<dyn ConfigLookup>,
        store: StoreHandle,
        encoder: ReferenceKeyEncoder,
    ) -> Self {
        Self {
            config,
            store,
            encoder,
        }
    }

    pub fn cache_mode(&self) -> CacheMode {
        CacheMode::Public
    }

    /// Visit `page_ids` in ascending order, starting at `continuation`, and append
    /// each page's references to `sink` until it is full.
    #[instrument(skip(self, sink), fields(pages = page_ids.len()))]
    pub fn lookup(
        &self,
        page_ids: &[PageId],
        continuation: Option<&str>,
        sink: &mut dyn ResultSink,
    ) -> CiterefResult<LookupOutcome> {
        if !self.config.get_bool(STORAGE_ENABLED_FLAG)? {
            return Err(Box::new(CiterefError::new(ErrorKind::FeatureDisabled)));
        }
        let resume_at = continuation.map(parse_continuation).transpose()?;

        let mut pages = page_ids.to_vec();
        pages.sort_unstable();
        pages.dedup();

        let mut outcome = LookupOutcome {
            processed: vec![],
            continue_from: None,
        };
        for page in pages {
            if resume_at.is_some_and(|start| page < start) {
                continue;
            }
            let references = self.page_references(page)?;
            debug!(page_id = %page, reference_count = references.len(), "fetched page references");
            if !sink.append(page, references) {
                sink.set_continue(page);
                outcome.continue_from = Some(page);
                break;
            }
            outcome.processed.push(page);
        }
        info!(
            processed = outcome.processed.len(),
            continue_from = ?outcome.continue_from,
            "reference lookup finished"
        );
        Ok(outcome)
    }

    fn page_references(&self, page: PageId) -> CiterefResult<ReferenceList> {
        Ok(match self.store.stored_references(page)? {
            Some(stored) => flatten_references(&stored, &self.encoder),
            None => ReferenceList::new(),
        })
    }
}

impl std::fmt::Debug for ReferenceLookupEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceLookupEndpoint")
            .field("store", &self.store)
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}

/// Parse a continuation cursor. Only the canonical decimal form of a page id is
/// accepted.
pub fn parse_continuation(value: &str) -> CiterefResult<PageId> {
    match value.parse::<u64>() {
        Ok(id) if id.to_string() == value => Ok(PageId::new(id)),
        _ => Err(Box::new(CiterefError::new(ErrorKind::InvalidContinuation {
            value: value.to_string(),
        }))),
    }
}
