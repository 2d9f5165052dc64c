//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection. Routing is a
//! plain match over (method, path); the pipeline and its collaborators
//! live in `AppState` behind Arcs and are shared read-only.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Args;
use crate::convert::ConversionPipeline;
use crate::db::ProvenanceStore;
use crate::delivery::LocalDiskSink;
use crate::license::LicenseGate;
use crate::routes;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Conversion pipeline with gate/sink/provenance injected
    pub pipeline: Arc<ConversionPipeline>,
    /// License gate, also used directly by /api/check-license
    pub gate: Arc<dyn LicenseGate>,
    /// Provenance store for recovery lookups (None in dev mode without MongoDB)
    pub provenance: Option<ProvenanceStore>,
    /// Local sink handle for /downloads serving (None in object mode)
    pub local_sink: Option<Arc<LocalDiskSink>>,
}

impl AppState {
    pub fn new(
        args: Args,
        pipeline: Arc<ConversionPipeline>,
        gate: Arc<dyn LicenseGate>,
        provenance: Option<ProvenanceStore>,
        local_sink: Option<Arc<LocalDiskSink>>,
    ) -> Self {
        Self {
            args,
            pipeline,
            gate,
            provenance,
            local_sink,
        }
    }

    /// CORS origin to echo for a request.
    ///
    /// An empty configured list means any origin; otherwise the request
    /// origin is echoed only when it is on the list.
    pub fn cors_origin(&self, request_origin: Option<&str>) -> String {
        let allowed = self.args.origin_list();
        if allowed.is_empty() {
            return "*".to_string();
        }
        match request_origin {
            Some(origin) if allowed.iter().any(|a| a == origin) => origin.to_string(),
            // Unlisted origins get the first allowed one back; the browser
            // will refuse the mismatch.
            _ => allowed[0].clone(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Converter listening on {}", state.args.listen);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let request_origin = req
        .headers()
        .get("origin")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let origin = state.cors_origin(request_origin.as_deref());

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Uptime-monitor probe
        (Method::GET, "/") => routes::index(),

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(&origin),

        // Main conversion flow
        (Method::POST, "/api/convert") | (Method::POST, "/convert") => {
            routes::handle_convert(req, Arc::clone(&state), &origin).await
        }

        // Read-only license check
        (Method::POST, "/api/check-license") | (Method::POST, "/check-license") => {
            routes::handle_check_license(req, Arc::clone(&state), &origin).await
        }

        // Lost-link recovery (aliases kept from earlier clients)
        (Method::POST, "/api/recover-link")
        | (Method::POST, "/recover-link")
        | (Method::POST, "/api/recover-session")
        | (Method::POST, "/recover-session") => {
            routes::handle_recover_link(req, Arc::clone(&state), &origin).await
        }

        // Locally stored packs
        (Method::GET, p) if p.starts_with("/downloads/") => {
            let rel = p.strip_prefix("/downloads/").unwrap_or("");
            routes::handle_download(Arc::clone(&state), rel).await
        }

        // Not found
        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response(origin: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Credentials", "true")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "message": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
