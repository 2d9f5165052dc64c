//! Conversion upload route
//!
//! `POST /api/convert` accepts a multipart form with a `file` part (the
//! brushset container) and a `licenseKey` text part, runs the pipeline,
//! and answers with the download URL.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use multer::{Constraints, Multipart, SizeLimit};
use std::sync::Arc;
use tracing::{info, warn};

use crate::convert::ConversionRequest;
use crate::routes::{error_response, json_response};
use crate::server::AppState;
use crate::types::{ConvertError, Result};

/// Parsed multipart form for a conversion request.
struct ConvertForm {
    license_key: String,
    filename: String,
    data: Vec<u8>,
}

async fn parse_form(req: Request<Incoming>, max_bytes: u64) -> Result<ConvertForm> {
    let boundary = req
        .headers()
        .get("content-type")
        .and_then(|ct| ct.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| {
            ConvertError::InvalidInput("Expected a multipart/form-data request.".to_string())
        })?;

    // Reject obviously oversized uploads before reading the body.
    if let Some(length) = req
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if length > max_bytes {
            return Err(ConvertError::InvalidInput(format!(
                "Upload exceeds the {} MB limit.",
                max_bytes / (1024 * 1024)
            )));
        }
    }

    let constraints = Constraints::new()
        .allowed_fields(vec!["file", "licenseKey"])
        .size_limit(SizeLimit::new().whole_stream(max_bytes));

    let stream = req.into_body().into_data_stream();
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    let mut license_key: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("licenseKey") => {
                license_key = Some(field.text().await?.trim().to_string());
            }
            Some("file") => {
                filename = field.file_name().map(|s| s.to_string());
                data = Some(field.bytes().await?.to_vec());
            }
            _ => {}
        }
    }

    let license_key = match license_key {
        Some(key) if !key.is_empty() => key,
        _ => return Err(ConvertError::MissingLicense),
    };

    let filename = filename
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ConvertError::InvalidInput("No file was uploaded.".to_string()))?;

    let data = data
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ConvertError::InvalidInput("No selected file.".to_string()))?;

    Ok(ConvertForm {
        license_key,
        filename,
        data,
    })
}

/// Handle `POST /api/convert`.
pub async fn handle_convert(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<Full<Bytes>> {
    let form = match parse_form(req, state.args.max_upload_bytes()).await {
        Ok(form) => form,
        Err(e) => {
            warn!(error = %e, "convert request rejected at parse");
            return error_response(&e, origin);
        }
    };

    info!(
        filename = %form.filename,
        size = form.data.len(),
        "conversion requested"
    );

    let outcome = state
        .pipeline
        .run(ConversionRequest {
            license_key: form.license_key,
            original_filename: form.filename,
            data: form.data,
        })
        .await;

    match outcome {
        Ok(result) => {
            info!(
                url = %result.download_url,
                stamps = result.stamp_count,
                "conversion complete"
            );
            json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "downloadUrl": result.download_url,
                    "originalFilename": result.original_filename,
                }),
                origin,
            )
        }
        Err(e) => {
            warn!(error = %e, "conversion failed");
            error_response(&e, origin)
        }
    }
}
