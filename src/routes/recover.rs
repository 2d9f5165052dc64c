//! Link recovery route
//!
//! `POST /api/recover-link` returns a buyer's recent conversions so a lost
//! download link can be re-fetched without spending another credit.
//! Lookup failures degrade to an empty list: recovery is a convenience,
//! never an error surface.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::db::schemas::RecoveredLink;
use crate::routes::json_response;
use crate::server::AppState;

#[derive(Deserialize)]
struct RecoverBody {
    #[serde(rename = "licenseKey")]
    license_key: Option<String>,
}

/// Handle `POST /api/recover-link`.
pub async fn handle_recover_link(
    req: Request<Incoming>,
    state: Arc<AppState>,
    origin: &str,
) -> Response<Full<Bytes>> {
    let empty = || json_response(StatusCode::OK, &serde_json::json!([]), origin);

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "recover-link body read failed");
            return empty();
        }
    };

    let license_key = match serde_json::from_slice::<RecoverBody>(&body) {
        Ok(RecoverBody {
            license_key: Some(key),
        }) if !key.trim().is_empty() => key,
        _ => return empty(),
    };

    let Some(ref provenance) = state.provenance else {
        return empty();
    };

    let records = match provenance
        .recent(
            &license_key,
            state.args.recovery_window_hours,
            state.args.recovery_limit,
        )
        .await
    {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "history recovery lookup failed");
            return empty();
        }
    };

    let links: Vec<RecoveredLink> = records.into_iter().map(RecoveredLink::from).collect();
    let body = serde_json::to_value(&links).unwrap_or_else(|_| serde_json::json!([]));
    json_response(StatusCode::OK, &body, origin)
}
