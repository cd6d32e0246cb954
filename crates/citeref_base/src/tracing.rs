use crate::error::{CiterefError, CiterefResult};
pub use tracing::instrument;
pub use tracing::{debug, error, info, trace, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber: fmt output, `RUST_LOG` filtering (default `info`)
/// and the error layer that lets `CiterefError` capture span traces.
pub fn init_tracing() -> CiterefResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| Box::new(CiterefError::message(format!("Failed to install tracing subscriber: {}", e))))
}
