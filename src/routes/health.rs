//! Liveness endpoints
//!
//! `GET /` is the plain-text probe uptime monitors hit; `GET /health`
//! returns a JSON status body.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::config::StorageMode;
use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: &'static str,
    timestamp: String,
    mode: &'static str,
    storage: &'static str,
    #[serde(rename = "provenanceConnected")]
    provenance_connected: bool,
}

/// Handle `GET /` (uptime-monitor probe).
pub fn index() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from(
            "ArtyPacks Converter Backend is running.",
        )))
        .unwrap()
}

/// Handle `GET /health`.
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        storage: match state.args.storage_mode {
            StorageMode::Local => "local",
            StorageMode::Object => "object",
        },
        provenance_connected: state.provenance.is_some(),
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
