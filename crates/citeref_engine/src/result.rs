/* 📖 # Why does the sink decide when a response is full?

Response budgets (bytes, page count) belong to whoever frames the response, not
to the lookup loop. The loop only asks "does this page still fit?" through
`ResultSink::append` and, on `false`, stops and records where to resume. That
keeps the pagination decision in one place while the budget policy can change
freely.

ApiResult is the sink used by the HTTP API. It measures each page by its
serialized JSON size. The first page of a response is always accepted, whatever
the byte or page budget says: refusing it would hand the client a cursor
pointing at the same page forever.
*/

use serde::Serialize;
use tracing::{debug, warn};

use crate::ordered::OrderedMap;
use crate::reference::{PageId, ReferenceList};

/// Receives per-page results and signals when the response is full.
pub trait ResultSink {
    /// Add a page's references. Returns `false`, without keeping the page, when
    /// the response has no room left for it.
    fn append(&mut self, page: PageId, references: ReferenceList) -> bool;

    /// Record the page the next request should resume at.
    fn set_continue(&mut self, page: PageId);
}

/// Budgets applied to one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLimits {
    pub max_result_size: usize,
    pub max_pages: usize,
}

impl ResultLimits {
    pub fn new(max_result_size: usize, max_pages: usize) -> Self {
        Self {
            max_result_size,
            max_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PageEntry {
    pageid: PageId,
    references: ReferenceList,
}

/// Size-bounded result sink that renders the query response.
#[derive(Debug)]
pub struct ApiResult {
    limits: ResultLimits,
    pages: Vec<PageEntry>,
    size: usize,
    continue_from: Option<PageId>,
}

impl ApiResult {
    pub fn new(limits: ResultLimits) -> Self {
        Self {
            limits,
            pages: vec![],
            size: 0,
            continue_from: None,
        }
    }

    /// Pages accepted so far, in order.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|entry| entry.pageid).collect()
    }

    /// References accepted for a page.
    pub fn references(&self, page: PageId) -> Option<&ReferenceList> {
        self.pages
            .iter()
            .find(|entry| entry.pageid == page)
            .map(|entry| &entry.references)
    }

    /// Serialized size of the accepted pages, in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn continue_from(&self) -> Option<PageId> {
        self.continue_from
    }

    /// Build the response document.
    pub fn into_response(self) -> QueryResponse {
        let continuation = self.continue_from.map(|page| Continuation {
            rfcontinue: page.to_string(),
            continue_: "||".to_string(),
        });
        let pages = self
            .pages
            .into_iter()
            .map(|entry| (entry.pageid.to_string(), entry))
            .collect();
        QueryResponse {
            batchcomplete: continuation.is_none(),
            continuation,
            query: QueryPages { pages },
        }
    }
}

impl ResultSink for ApiResult {
    fn append(&mut self, page: PageId, references: ReferenceList) -> bool {
        if !self.pages.is_empty() && self.pages.len() >= self.limits.max_pages {
            debug!(page_id = %page, max_pages = self.limits.max_pages, "page budget exhausted");
            return false;
        }
        let entry = PageEntry {
            pageid: page,
            references,
        };
        let entry_size = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                warn!(page_id = %page, error = %e, "failed to measure page result");
                return false;
            }
        };
        let new_size = self.size + entry_size;
        if new_size > self.limits.max_result_size {
            if !self.pages.is_empty() {
                debug!(page_id = %page, size = new_size, max_result_size = self.limits.max_result_size, "byte budget exhausted");
                return false;
            }
            warn!(page_id = %page, size = entry_size, max_result_size = self.limits.max_result_size, "single page exceeds the byte budget, sending it alone");
        }
        self.size = new_size;
        self.pages.push(entry);
        true
    }

    fn set_continue(&mut self, page: PageId) {
        self.continue_from = Some(page);
    }
}

/// Continuation block telling the client how to resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Continuation {
    pub rfcontinue: String,
    #[serde(rename = "continue")]
    pub continue_: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPages {
    pages: OrderedMap<PageEntry>,
}

/// The full response of a references query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub batchcomplete: bool,
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continuation: Option<Continuation>,
    pub query: QueryPages,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ReferenceKeyEncoder;
    use crate::reference::{StoredReferenceSet, flatten_references};
    use expect_test::expect;

    fn references(json: &str) -> ReferenceList {
        let stored: StoredReferenceSet = serde_json::from_str(json).unwrap();
        flatten_references(&stored, &ReferenceKeyEncoder::default())
    }

    #[test]
    fn test_page_budget() {
        let mut result = ApiResult::new(ResultLimits::new(usize::MAX, 2));
        assert!(result.append(PageId::new(1), ReferenceList::new()));
        assert!(result.append(PageId::new(2), ReferenceList::new()));
        assert!(!result.append(PageId::new(3), ReferenceList::new()));
        assert_eq!(result.page_ids(), [PageId::new(1), PageId::new(2)]);
    }

    #[test]
    fn test_byte_budget_refuses_page_without_keeping_it() {
        let empty_page_size = serde_json::to_vec(&PageEntry {
            pageid: PageId::new(1),
            references: ReferenceList::new(),
        })
        .unwrap()
        .len();
        let mut result = ApiResult::new(ResultLimits::new(empty_page_size * 2, 10));
        assert!(result.append(PageId::new(1), ReferenceList::new()));
        assert!(result.append(PageId::new(2), ReferenceList::new()));
        assert!(!result.append(PageId::new(3), ReferenceList::new()));
        assert_eq!(result.size(), empty_page_size * 2);
        assert!(result.references(PageId::new(3)).is_none());
    }

    #[test]
    fn test_oversized_first_page_is_accepted() {
        let mut result = ApiResult::new(ResultLimits::new(10, 10));
        let big = references(r#"{"refs": {"0": {"": {"": {"key": 1, "text": "a long citation text"}}}}}"#);
        assert!(result.append(PageId::new(4), big.clone()));
        assert!(!result.append(PageId::new(5), big));
        assert_eq!(result.page_ids(), [PageId::new(4)]);
    }

    #[test]
    fn test_zero_page_budget_still_makes_progress() {
        let mut result = ApiResult::new(ResultLimits::new(usize::MAX, 0));
        assert!(result.append(PageId::new(5), ReferenceList::new()));
        assert!(!result.append(PageId::new(9), ReferenceList::new()));
        assert_eq!(result.page_ids(), [PageId::new(5)]);
    }

    #[test]
    fn test_complete_response() {
        let mut result = ApiResult::new(ResultLimits::new(usize::MAX, 10));
        result.append(
            PageId::new(7),
            references(r#"{"refs": {"0": {"": {"": {"key": 1}, "note": {"key": 2, "text": "Note"}}}}}"#),
        );
        result.append(PageId::new(9), ReferenceList::new());

        expect![[r#"
            {
              "batchcomplete": true,
              "query": {
                "pages": {
                  "7": {
                    "pageid": 7,
                    "references": {
                      "cite_note-1": {
                        "key": 1,
                        "name": "",
                        "group": "",
                        "reflist": 0
                      },
                      "cite_note-note-2": {
                        "key": 2,
                        "name": "note",
                        "group": "",
                        "reflist": 0,
                        "text": "Note"
                      }
                    }
                  },
                  "9": {
                    "pageid": 9,
                    "references": {}
                  }
                }
              }
            }"#]]
        .assert_eq(&serde_json::to_string_pretty(&result.into_response()).unwrap());
    }

    #[test]
    fn test_continued_response() {
        let mut result = ApiResult::new(ResultLimits::new(usize::MAX, 1));
        assert!(result.append(PageId::new(5), ReferenceList::new()));
        assert!(!result.append(PageId::new(9), ReferenceList::new()));
        result.set_continue(PageId::new(9));
        assert_eq!(result.continue_from(), Some(PageId::new(9)));

        expect![[r#"{"continue":{"rfcontinue":"9","continue":"||"},"query":{"pages":{"5":{"pageid":5,"references":{}}}}}"#]]
            .assert_eq(&serde_json::to_string(&result.into_response()).unwrap());
    }
}
