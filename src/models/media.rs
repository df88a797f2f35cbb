//! Media model
//!
//! Uploaded files live on disk under the configured upload directory; the
//! database keeps one row per file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uploaded file record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Media {
    pub id: i64,
    /// Stored file name, `{uuid}.{ext}`
    pub filename: String,
    /// Name of the file as uploaded by the client
    pub original_name: String,
    pub mime_type: String,
    /// Size in bytes
    pub size: i64,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Media {
    /// Public URL of the file
    pub fn url(&self) -> String {
        format!("/uploads/{}", self.filename)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Input for recording an uploaded file
#[derive(Debug, Clone)]
pub struct CreateMediaInput {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub alt_text: Option<String>,
}
