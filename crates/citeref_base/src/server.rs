/* 📖 # Why tiny_http with a fixed worker pool?

The API is synchronous end to end: one lookup walks pages one at a time and
returns. tiny_http gives a blocking server without an async runtime, which
matches that model.

A fixed number of worker threads share the tiny_http server and each pull the
next request from it. Concurrency is bounded by the pool size, so a burst of
clients queues inside tiny_http instead of spawning a thread per request. Each
worker polls with a timeout so it notices the shutdown flag.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{CiterefError, CiterefResult};
use crate::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService,
    HttpStatusCode,
};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bind the configured address and serve requests on `config.workers` threads.
///
/// Returns once the socket is bound and the workers are running. The workers
/// stop when the returned handle is dropped or `shutdown()` is called.
pub fn start_http_server(
    service: Box<dyn HttpService>,
    config: HttpServerConfig,
) -> CiterefResult<HttpServerHandle> {
    let address = config.address();
    let server = tiny_http::Server::http(&address).map_err(|e| {
        Box::new(CiterefError::message(format!(
            "Failed to bind HTTP server to {}: {}",
            address, e
        )))
    })?;
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .unwrap_or(0);
    let worker_count = config.workers.max(1);
    info!(address = %address, port, workers = worker_count, server_name = %config.server_name, "HTTP server listening");

    let server = Arc::new(server);
    let service: Arc<dyn HttpService> = Arc::from(service);
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut workers = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let server = server.clone();
        let service = service.clone();
        let worker_shutdown = shutdown.clone();
        let server_name = config.server_name.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("citeref-http-{}", worker_id))
            .spawn(move || worker_loop(worker_id, server, service, worker_shutdown, server_name));
        match spawned {
            Ok(worker) => workers.push(worker),
            Err(e) => {
                shutdown.store(true, Ordering::SeqCst);
                for worker in workers {
                    let _ = worker.join();
                }
                return Err(Box::new(CiterefError::message(format!(
                    "Failed to spawn HTTP worker thread: {}",
                    e
                ))));
            }
        }
    }

    Ok(HttpServerHandle::new(port, shutdown, workers))
}

fn worker_loop(
    worker_id: usize,
    server: Arc<tiny_http::Server>,
    service: Arc<dyn HttpService>,
    shutdown: Arc<AtomicBool>,
    server_name: String,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let request = match server.recv_timeout(ACCEPT_POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                error!(worker_id, error = %e, "failed to receive HTTP request");
                continue;
            }
        };
        respond(request, service.as_ref(), &server_name);
    }
    debug!(worker_id, "HTTP worker stopped");
}

fn respond(request: tiny_http::Request, service: &dyn HttpService, server_name: &str) {
    let response = match HttpMethod::parse(request.method().as_str()) {
        Some(method) => dispatch(service, HttpRequest::new(method, request.url())),
        None => {
            warn!(method = %request.method(), "unsupported HTTP method");
            HttpResponse::new(HttpStatusCode::MethodNotAllowed)
        }
    };

    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let mut outgoing = tiny_http::Response::from_data(response.into_body()).with_status_code(status);
    for (key, value) in &headers {
        match tiny_http::Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            Ok(header) => outgoing.add_header(header),
            Err(()) => warn!(header = %key, "dropping invalid response header"),
        }
    }
    if let Ok(header) = tiny_http::Header::from_bytes(&b"Server"[..], server_name.as_bytes()) {
        outgoing.add_header(header);
    }
    if let Err(e) = request.respond(outgoing) {
        debug!(error = %e, "client went away before the response was sent");
    }
}

/// Run the service and turn any error into the JSON error response.
pub fn dispatch(service: &dyn HttpService, request: HttpRequest) -> HttpResponse {
    let method = request.method().clone();
    let path = request.path().to_string();
    match service.handle_request(request) {
        Ok(response) => {
            debug!(%method, %path, status = response.status().as_u16(), "request handled");
            response
        }
        Err(e) => {
            warn!(%method, %path, code = e.code(), error = %e, "request failed");
            HttpResponse::api_error(e.code(), &e.to_string())
        }
    }
}
