//! Settings API endpoints
//!
//! - GET /api/v1/settings - Typed site settings plus every stored key
//! - PUT /api/v1/settings - Update several settings at once (all or nothing)

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::services::SiteSettings;

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub site: SiteSettings,
    pub settings: BTreeMap<String, String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

async fn load(state: &AppState) -> Result<SettingsResponse, ApiError> {
    Ok(SettingsResponse {
        site: state.settings_service.get_site_settings().await?,
        settings: state.settings_service.get_all().await?,
    })
}

/// GET /api/v1/settings
async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>, ApiError> {
    Ok(Json(load(&state).await?))
}

/// PUT /api/v1/settings
///
/// Body is a flat object of string values, e.g. `{"site_name": "My Blog"}`.
async fn update_settings(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<HashMap<String, String>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::validation_error("No settings provided"));
    }
    state.settings_service.set_many(&body).await?;
    Ok(Json(load(&state).await?))
}
