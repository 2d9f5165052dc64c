//! HTTP routes for the converter backend

pub mod convert;
pub mod downloads;
pub mod health;
pub mod license;
pub mod recover;

pub use convert::handle_convert;
pub use downloads::handle_download;
pub use health::{health_check, index};
pub use license::handle_check_license;
pub use recover::handle_recover_link;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::types::ConvertError;

/// Build a JSON response with CORS headers.
pub fn json_response(
    status: StatusCode,
    body: &serde_json::Value,
    origin: &str,
) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Credentials", "true")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Stable error envelope: `{"message": ...}` with the taxonomy status code.
///
/// Server-side variants log their detail at the raise site; only the
/// client-safe message leaves the process.
pub fn error_response(err: &ConvertError, origin: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "message": err.client_message() });
    json_response(err.status_code(), &body, origin)
}
