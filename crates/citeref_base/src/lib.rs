/* 📖 # Why have citeref_base as a core library?
citeref_base provides the error type, tracing setup and HTTP plumbing shared by the
engine and the binary. Keeping them here prevents circular dependencies and keeps
the engine free of server details.
*/

pub mod error;
pub mod http;
pub mod server;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{CiterefError, CiterefResult, ErrorKind, ResultExt};
