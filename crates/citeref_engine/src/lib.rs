/* 📖 # What lives in citeref_engine?

Everything needed to answer "which references are stored for these pages?":
the stored data model and its flattening, anchor id encoding, the store trait,
configuration, the size-bounded result sink, the paginated lookup endpoint and
the HTTP service in front of it.
*/

pub mod api;
pub mod config;
pub mod endpoint;
pub mod ids;
pub mod ordered;
pub mod reference;
pub mod result;
pub mod store;

pub use api::{ApiService, QueryParams};
pub use config::{Config, ConfigLookup, STORAGE_ENABLED_FLAG, load_config};
pub use endpoint::{CacheMode, LookupOutcome, ReferenceLookupEndpoint, parse_continuation};
pub use ids::ReferenceKeyEncoder;
pub use ordered::OrderedMap;
pub use reference::{
    FlattenedReference, PageId, RefName, ReferenceList, ReferenceRecord, StoredReferenceSet,
    flatten_references,
};
pub use result::{ApiResult, QueryResponse, ResultLimits, ResultSink};
pub use store::{InMemoryStore, ReferenceStore, StoreHandle};
