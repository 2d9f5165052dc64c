//! License status route
//!
//! `POST /api/check-license` looks up a key's validity and remaining
//! credits without charging it.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::routes::{error_response, json_response};
use crate::server::AppState;
use crate::types::ConvertError;

#[derive(Deserialize)]
struct CheckLicenseBody {
    #[serde(rename = "licenseKey")]
    license_key: Option<String>,
}

/// Handle `POST /api/check-license`.
pub async fn handle_check_license(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<Full<Bytes>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "check-license body read failed");
            return error_response(
                &ConvertError::InvalidInput("Failed to read request body.".to_string()),
                origin,
            );
        }
    };

    let license_key = match serde_json::from_slice::<CheckLicenseBody>(&body) {
        Ok(CheckLicenseBody {
            license_key: Some(key),
        }) if !key.trim().is_empty() => key,
        _ => {
            return error_response(
                &ConvertError::InvalidInput(
                    "Invalid request: Missing license key.".to_string(),
                ),
                origin,
            );
        }
    };

    match state.gate.status(&license_key).await {
        Ok(Some(status)) => {
            let body = serde_json::to_value(&status)
                .unwrap_or_else(|_| serde_json::json!({ "isValid": false }));
            json_response(StatusCode::OK, &body, origin)
        }
        Ok(None) => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({ "isValid": false, "message": "License key not found." }),
            origin,
        ),
        Err(e) => {
            warn!(error = %e, "license status lookup failed");
            error_response(
                &ConvertError::LicenseUnavailable(e.to_string()),
                origin,
            )
        }
    }
}
