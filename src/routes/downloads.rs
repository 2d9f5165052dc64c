//! Local download serving
//!
//! `GET /downloads/{path}` serves packs stored by the local-disk sink.
//! Only active in local storage mode; object-store deliveries return
//! provider URLs instead.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

use crate::server::AppState;

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(
            r#"{"message": "Download not found."}"#,
        )))
        .unwrap()
}

/// Handle `GET /downloads/{path}`.
pub async fn handle_download(state: Arc<AppState>, path: &str) -> Response<Full<Bytes>> {
    let Some(ref sink) = state.local_sink else {
        return not_found();
    };

    // resolve() refuses traversal components.
    let Some(full_path) = sink.resolve(path) else {
        debug!(path = %path, "download path rejected");
        return not_found();
    };

    match tokio::fs::read(&full_path).await {
        Ok(bytes) => {
            let file_name = path.rsplit('/').next().unwrap_or("pack.zip");
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/zip")
                .header(
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", file_name),
                )
                .body(Full::new(Bytes::from(bytes)))
                .unwrap()
        }
        Err(_) => not_found(),
    }
}
