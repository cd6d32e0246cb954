/* 📖 # Why is the CLI minimal and hardcoded?

The CLI has no argument parsing. It always reads `citeref.toml` from the current
directory, loads the configured reference data file and serves the API until the
process is stopped. New arguments can be added once a use case needs them.

The workflow:
1. Change to the directory containing `citeref.toml`
2. Run `citeref`
3. Query `http://host:port/api/query?prop=references&pageids=...`

Exit codes:
- 0: Server stopped normally
- 1: Error (config not found or invalid, data file unreadable, bind failure)
*/

use std::path::Path;
use std::process;
use std::sync::Arc;

use citeref_base::http::HttpServerConfig;
use citeref_base::server::start_http_server;
use citeref_base::tracing::init_tracing;
use citeref_engine::store::{InMemoryStore, StoreHandle};
use citeref_engine::{ApiService, ReferenceLookupEndpoint, load_config};
use tracing::info;

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Error: Failed to initialize tracing: {}", e);
        process::exit(1);
    }

    let config = match load_config(Path::new("citeref.toml")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config from citeref.toml: {}", e);
            process::exit(1);
        }
    };

    let store = match InMemoryStore::load_json_file(&config.data_file) {
        Ok(store) => StoreHandle::new(store),
        Err(e) => {
            eprintln!("Error: Failed to load reference data: {}", e);
            process::exit(1);
        }
    };
    let page_count = store.len().unwrap_or(0);

    if !config.reference_storage_enabled {
        eprintln!("Warning: reference_storage_enabled is off, every query will be rejected");
    }

    let limits = config.result_limits();
    let cache_max_age = config.server.cache_max_age;
    let server_config = HttpServerConfig::new(config.server.host.clone())
        .with_port(config.server.port)
        .with_workers(config.server.workers);
    let encoder = config.key_encoder();
    let endpoint = ReferenceLookupEndpoint::new(Arc::new(config), store, encoder);
    let service = ApiService::new(Arc::new(endpoint), limits, cache_max_age);

    let handle = match start_http_server(Box::new(service), server_config.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: Failed to start server on {}: {}", server_config.address(), e);
            process::exit(1);
        }
    };

    info!(port = handle.port(), pages = page_count, "citeref serving");
    println!("Loaded reference data for {} pages", page_count);
    println!(
        "Serving on http://{}:{}/api/query?prop=references&pageids=...",
        server_config.host,
        handle.port()
    );

    handle.join();
}
