//! Media service
//!
//! Stores uploaded files on local disk under `upload.path` as
//! `{uuid}.{ext}` and keeps one `media` row per file. The row and the file
//! are written together: if the insert fails the file is removed again.

use crate::config::UploadConfig;
use crate::db::repositories::MediaRepository;
use crate::models::{CreateMediaInput, ListParams, Media, PagedResult};
use anyhow::Context;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

const MAX_ORIGINAL_NAME_LENGTH: usize = 255;
const MAX_ALT_TEXT_LENGTH: usize = 500;

/// Error types for media operations
#[derive(Debug, thiserror::Error)]
pub enum MediaServiceError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MediaService {
    repo: Arc<dyn MediaRepository>,
    config: UploadConfig,
}

impl MediaService {
    pub fn new(repo: Arc<dyn MediaRepository>, config: UploadConfig) -> Self {
        Self { repo, config }
    }

    /// Directory uploads are written to and served from
    pub fn upload_dir(&self) -> &Path {
        &self.config.path
    }

    /// Largest accepted upload in bytes
    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Validate, store and record an uploaded file
    ///
    /// # Errors
    /// - `ValidationError` for an empty file
    /// - `UnsupportedType` if the MIME type is not in `upload.allowed_types`
    /// - `TooLarge` if the file exceeds `upload.max_file_size`
    pub async fn upload(
        &self,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<Media, MediaServiceError> {
        let mime_type = normalize_mime(content_type);
        if !self.config.is_type_allowed(&mime_type) {
            return Err(MediaServiceError::UnsupportedType(mime_type));
        }

        let size = data.len() as u64;
        if size == 0 {
            return Err(MediaServiceError::ValidationError(
                "Uploaded file is empty".to_string(),
            ));
        }
        if size > self.config.max_file_size {
            return Err(MediaServiceError::TooLarge {
                size,
                max: self.config.max_file_size,
            });
        }

        fs::create_dir_all(&self.config.path)
            .await
            .with_context(|| format!("Failed to create upload directory {:?}", self.config.path))?;

        let filename = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(&mime_type));
        let file_path = self.config.path.join(&filename);
        fs::write(&file_path, data)
            .await
            .with_context(|| format!("Failed to write {:?}", file_path))?;

        let input = CreateMediaInput {
            filename,
            original_name: clean_original_name(original_name),
            mime_type,
            size: size as i64,
            alt_text: None,
        };

        match self.repo.create(&input).await {
            Ok(media) => {
                tracing::info!(
                    "Stored upload {} as {} ({} bytes)",
                    media.original_name,
                    media.filename,
                    media.size
                );
                Ok(media)
            }
            Err(err) => {
                if let Err(io_err) = fs::remove_file(&file_path).await {
                    tracing::warn!("Failed to remove orphaned upload {:?}: {}", file_path, io_err);
                }
                Err(err.context("Failed to record upload").into())
            }
        }
    }

    pub async fn get(&self, id: i64) -> Result<Media, MediaServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get media")?
            .ok_or_else(|| MediaServiceError::NotFound(format!("Media with ID {} not found", id)))
    }

    /// Uploaded files, newest first
    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Media>, MediaServiceError> {
        let items = self
            .repo
            .list(params.offset(), params.limit())
            .await
            .context("Failed to list media")?;
        let total = self.repo.count().await.context("Failed to count media")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Set or clear (blank) the alt text
    pub async fn update_alt_text(
        &self,
        id: i64,
        alt_text: Option<&str>,
    ) -> Result<Media, MediaServiceError> {
        let alt_text = alt_text.map(str::trim).filter(|a| !a.is_empty());
        if alt_text.is_some_and(|a| a.chars().count() > MAX_ALT_TEXT_LENGTH) {
            return Err(MediaServiceError::ValidationError(format!(
                "Alt text cannot exceed {} characters",
                MAX_ALT_TEXT_LENGTH
            )));
        }

        let updated = self
            .repo
            .update_alt_text(id, alt_text)
            .await
            .context("Failed to update alt text")?;
        if !updated {
            return Err(MediaServiceError::NotFound(format!(
                "Media with ID {} not found",
                id
            )));
        }
        self.get(id).await
    }

    /// Delete the row and the stored file; a file already gone is not an error
    pub async fn delete(&self, id: i64) -> Result<(), MediaServiceError> {
        let media = self.get(id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete media")?;

        let path = self.file_path(&media);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::warn!("Upload {:?} was already missing", path);
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to remove {:?}", path))
                    .into())
            }
        }
        Ok(())
    }

    /// Files count and their total size in bytes
    pub async fn usage(&self) -> Result<(i64, i64), MediaServiceError> {
        let count = self.repo.count().await.context("Failed to count media")?;
        let size = self
            .repo
            .total_size()
            .await
            .context("Failed to sum media sizes")?;
        Ok((count, size))
    }

    fn file_path(&self, media: &Media) -> PathBuf {
        self.config.path.join(&media.filename)
    }
}

/// `image/PNG; charset=x` -> `image/png`
fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Keep only the final path component of a client-supplied file name
fn clean_original_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let base = if base.is_empty() { "upload" } else { base };
    base.chars().take(MAX_ORIGINAL_NAME_LENGTH).collect()
}
