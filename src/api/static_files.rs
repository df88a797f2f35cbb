//! Serving uploaded files from disk
//!
//! Upload names are random, so responses are cached for a year. Every
//! response carries a sandboxing Content-Security-Policy so scripts in an
//! uploaded SVG cannot run on the site origin.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::{Component, PathBuf};
use tokio::fs;

use crate::api::middleware::{cache_control_static, AppState};

const UPLOAD_CSP: &str = "sandbox; default-src 'none'; img-src 'self' data:; style-src 'unsafe-inline'";

/// GET /uploads/{*path}
pub async fn serve_upload(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let Some(relative) = safe_relative_path(&path) else {
        tracing::warn!("Rejected upload path {:?}", path);
        return not_found();
    };

    let file_path = state.media_service.upload_dir().join(&relative);
    let cache_control = cache_control_static(31536000, true);
    match fs::read(&file_path).await {
        Ok(contents) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, get_content_type(&path)),
                (header::CACHE_CONTROL, cache_control.as_str()),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
                (header::CONTENT_SECURITY_POLICY, UPLOAD_CSP),
            ],
            contents,
        )
            .into_response(),
        Err(_) => not_found(),
    }
}

/// Relative path made only of normal components, or `None`
fn safe_relative_path(path: &str) -> Option<PathBuf> {
    if path.is_empty() || path.contains('\\') || path.contains('\0') {
        return None;
    }
    let candidate = PathBuf::from(path);
    candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(candidate)
}

/// 404 response
fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("").to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
