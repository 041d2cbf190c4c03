//! Blocking HTTP front end for the inference service.
//!
//! One `tiny_http` listener is shared by a fixed pool of worker threads. Each
//! worker reads a bounded body, routes it through [`routes::handle`] and
//! writes a JSON response.

pub mod routes;

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};

use crate::config::ServerConfig;
use crate::inference::InferenceService;
use routes::{ApiResponse, RouteLimits};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
    #[error("Listener on {0} has no IP address")]
    NoLocalAddr(String),
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}

/// Running server; dropping it without [`ServerHandle::shutdown`] leaves the
/// workers serving.
pub struct ServerHandle {
    addr: SocketAddr,
    server: Arc<Server>,
    stopping: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests and wait for the workers to exit.
    pub fn shutdown(self) -> Result<(), ServerError> {
        self.stopping.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.server.unblock();
        }
        self.join()
    }

    /// Block until every worker exits.
    pub fn join(self) -> Result<(), ServerError> {
        let panicked = self
            .workers
            .into_iter()
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count();
        if panicked > 0 {
            return Err(ServerError::WorkerPanicked(panicked));
        }
        Ok(())
    }
}

/// Bind the listener and start the worker pool.
pub fn start(
    config: &ServerConfig,
    service: Arc<InferenceService>,
) -> Result<ServerHandle, ServerError> {
    let server = Server::http(config.bind.as_str()).map_err(|err| ServerError::Bind {
        addr: config.bind.clone(),
        message: err.to_string(),
    })?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| ServerError::NoLocalAddr(config.bind.clone()))?;
    let server = Arc::new(server);
    let stopping = Arc::new(AtomicBool::new(false));
    let settings = WorkerSettings {
        limits: RouteLimits {
            max_batch_len: config.max_batch_len,
        },
        max_body_bytes: config.max_body_bytes,
    };

    let mut workers = Vec::with_capacity(config.workers.max(1));
    for idx in 0..config.workers.max(1) {
        let worker_server = Arc::clone(&server);
        let worker_service = Arc::clone(&service);
        let worker_stopping = Arc::clone(&stopping);
        let worker = thread::Builder::new()
            .name(format!("churn-http-{idx}"))
            .spawn(move || {
                worker_loop(&worker_server, &worker_service, &worker_stopping, settings)
            });
        match worker {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                stopping.store(true, Ordering::SeqCst);
                for _ in &workers {
                    server.unblock();
                }
                return Err(ServerError::Spawn(err));
            }
        }
    }

    tracing::info!(%addr, workers = workers.len(), "Churn prediction API listening");
    Ok(ServerHandle {
        addr,
        server,
        stopping,
        workers,
    })
}

/// Serve until the process exits.
pub fn serve(config: &ServerConfig, service: Arc<InferenceService>) -> Result<(), ServerError> {
    start(config, service)?.join()
}

#[derive(Debug, Clone, Copy)]
struct WorkerSettings {
    limits: RouteLimits,
    max_body_bytes: usize,
}

fn worker_loop(
    server: &Server,
    service: &InferenceService,
    stopping: &AtomicBool,
    settings: WorkerSettings,
) {
    loop {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match server.recv() {
            Ok(request) => respond(request, service, settings),
            Err(err) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                tracing::warn!("Failed to receive request: {err}");
            }
        }
    }
}

fn respond(mut request: Request, service: &InferenceService, settings: WorkerSettings) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_string();

    let response = match read_body(&mut request, settings.max_body_bytes) {
        Ok(body) => routes::handle(service, &settings.limits, &method, &url, &body),
        Err(response) => response,
    };
    let status = response.status;
    if let Err(err) = request.respond(json_response(response)) {
        tracing::warn!(%method, path = %url, "Failed to send response: {err}");
    }
    tracing::info!(
        %method,
        path = %url,
        status,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "Handled request"
    );
}

fn read_body(request: &mut Request, max_bytes: usize) -> Result<Vec<u8>, ApiResponse> {
    let too_large = || ApiResponse::error(413, format!("Request body exceeds {max_bytes} bytes"));
    if request.body_length().is_some_and(|len| len > max_bytes) {
        return Err(too_large());
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|err| ApiResponse::error(400, format!("Failed to read request body: {err}")))?;
    if body.len() > max_bytes {
        return Err(too_large());
    }
    Ok(body)
}

fn json_response(response: ApiResponse) -> Response<std::io::Cursor<Vec<u8>>> {
    let bytes = serde_json::to_vec(&response.body).unwrap_or_else(|_| b"{}".to_vec());
    let mut out = Response::from_data(bytes).with_status_code(response.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        out.add_header(header);
    }
    out
}
