//! Media API endpoints
//!
//! - GET    /api/v1/media      - List uploads (page, per_page)
//! - POST   /api/v1/media      - Upload a file (multipart field `file`)
//! - GET    /api/v1/media/{id} - Get upload by ID
//! - PUT    /api/v1/media/{id} - Set alt text
//! - DELETE /api/v1/media/{id} - Delete the record and the file

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState};
use crate::models::Media;

/// Upload record with its public URL
#[derive(Debug, Serialize, Deserialize)]
pub struct MediaResponse {
    #[serde(flatten)]
    pub media: Media,
    pub url: String,
}

impl From<Media> for MediaResponse {
    fn from(media: Media) -> Self {
        let url = media.url();
        Self { media, url }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMediaRequest {
    #[serde(default)]
    pub alt_text: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_media).post(upload_media))
        .route("/{id}", get(get_media).put(update_media).delete(delete_media))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new("PAYLOAD_TOO_LARGE", e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// GET /api/v1/media
async fn list_media(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Json<PageResponse<MediaResponse>>, ApiError> {
    let result = state.media_service.list(&query.params()).await?;
    Ok(Json(result.map(MediaResponse::from).into()))
}

/// POST /api/v1/media
///
/// Accepts multipart/form-data with a single file field named "file".
async fn upload_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<MediaResponse>), ApiError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field.bytes().await.map_err(multipart_error)?;

        let media = state
            .media_service
            .upload(&filename, &content_type, &data)
            .await?;
        return Ok((StatusCode::CREATED, Json(media.into())));
    }

    Err(ApiError::validation_error("No file provided"))
}

/// GET /api/v1/media/{id}
async fn get_media(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MediaResponse>, ApiError> {
    Ok(Json(state.media_service.get(id).await?.into()))
}

/// PUT /api/v1/media/{id}
async fn update_media(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateMediaRequest>,
) -> Result<Json<MediaResponse>, ApiError> {
    let media = state
        .media_service
        .update_alt_text(id, body.alt_text.as_deref())
        .await?;
    Ok(Json(media.into()))
}

/// DELETE /api/v1/media/{id}
async fn delete_media(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.media_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::test_server;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{json, Value};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    fn file_form(name: &str, mime: &str, data: Vec<u8>) -> MultipartForm {
        MultipartForm::new().add_part("file", Part::bytes(data).file_name(name).mime_type(mime))
    }

    #[tokio::test]
    async fn test_upload_serve_and_delete() {
        let (server, dir) = test_server().await;

        let response = server
            .post("/api/v1/media")
            .multipart(file_form("cover.png", "image/png", PNG.to_vec()))
            .await;
        response.assert_status(StatusCode::CREATED);
        let media: Value = response.json();
        assert_eq!(media["original_name"], "cover.png");
        assert_eq!(media["mime_type"], "image/png");
        let url = media["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/uploads/") && url.ends_with(".png"));

        let filename = media["filename"].as_str().unwrap();
        assert!(dir.path().join("uploads").join(filename).exists());

        let served = server.get(&url).await;
        served.assert_status_ok();
        assert_eq!(served.as_bytes().as_ref(), PNG);
        assert_eq!(served.header("content-type"), "image/png");
        assert!(served
            .header("content-security-policy")
            .to_str()
            .unwrap()
            .starts_with("sandbox"));

        let updated: Value = server
            .put(&format!("/api/v1/media/{}", media["id"]))
            .json(&json!({ "alt_text": "Cover image" }))
            .await
            .json();
        assert_eq!(updated["alt_text"], "Cover image");

        let list: Value = server.get("/api/v1/media").await.json();
        assert_eq!(list["total"], 1);

        server
            .delete(&format!("/api/v1/media/{}", media["id"]))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        assert!(!dir.path().join("uploads").join(filename).exists());
        server.get(&url).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (server, _dir) = test_server().await;

        server
            .post("/api/v1/media")
            .multipart(file_form("run.sh", "text/x-shellscript", b"echo hi".to_vec()))
            .await
            .assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);

        // The test server allows 4 KiB uploads
        server
            .post("/api/v1/media")
            .multipart(file_form("big.png", "image/png", vec![0u8; 8 * 1024]))
            .await
            .assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let form = MultipartForm::new().add_text("title", "no file here");
        server
            .post("/api/v1/media")
            .multipart(form)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/v1/media")
            .json(&json!({ "file": "cover.png" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        server
            .get("/api/v1/media/42")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
