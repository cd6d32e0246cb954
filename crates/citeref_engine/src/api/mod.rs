/* 📖 # Why an API module in citeref_engine?

The api module exposes the lookup endpoint over HTTP. ApiService implements the
HttpService trait from citeref_base, so the server loop in citeref_base can run it
without knowing anything about references.

Routes:
- `/api/query?prop=references&pageids=...` runs a lookup
- `/api/help` describes the module
*/

mod service;

pub use service::{ApiService, QueryParams};
