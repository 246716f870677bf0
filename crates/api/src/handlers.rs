use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use models::{CategoryDefinition, CategoryKind, FieldMapping, MonitorConfig};
use sheets_client::SheetsClient;

use crate::{auth::authenticate, error::ApiError, Result, SharedState};

/// Monitor-configuration form data; the field mapping rides along flattened,
/// exactly as it is stored and served.
#[derive(Debug, Deserialize)]
pub struct ConfigPayload {
    pub name: String,
    pub spreadsheet_url: String,
    #[serde(default)]
    pub worksheets: String,
    #[serde(flatten)]
    pub mapping: FieldMapping,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    #[serde(flatten)]
    pub config: MonitorConfig,
    pub categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    pub name: String,
    pub cell: String,
    pub kind: CategoryKind,
    #[serde(default)]
    pub is_clean: bool,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsPayload {
    pub service_account_json: String,
}

fn validate_config(payload: &ConfigPayload) -> Result<()> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    if payload.spreadsheet_url.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "spreadsheet_url must not be empty".to_string(),
        ));
    }
    if payload.mapping.col_date.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "col_date must name the date column".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/configs
pub async fn list_configs(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    let configs = state.store.list_configs(user.id)?;
    Ok(Json(configs))
}

/// POST /api/configs
pub async fn create_config(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(payload): Json<ConfigPayload>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    validate_config(&payload)?;

    let mut config = MonitorConfig {
        id: 0,
        user_id: user.id,
        name: payload.name.trim().to_string(),
        spreadsheet_url: payload.spreadsheet_url.trim().to_string(),
        worksheets: payload.worksheets,
        mapping: payload.mapping,
    };
    config.id = state.store.create_config(&config)?;

    Ok((StatusCode::CREATED, Json(config)))
}

/// GET /api/configs/:id
/// Returns the configuration together with its category definitions.
pub async fn get_config(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    let config = state
        .store
        .get_config(id, user.id)?
        .ok_or_else(|| ApiError::NotFound(format!("configuration {} not found", id)))?;
    let categories = state.store.list_categories(config.id)?;
    Ok(Json(ConfigResponse { config, categories }))
}

/// PUT /api/configs/:id
pub async fn update_config(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Json(payload): Json<ConfigPayload>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    validate_config(&payload)?;

    let config = MonitorConfig {
        id,
        user_id: user.id,
        name: payload.name.trim().to_string(),
        spreadsheet_url: payload.spreadsheet_url.trim().to_string(),
        worksheets: payload.worksheets,
        mapping: payload.mapping,
    };
    if !state.store.update_config(&config)? {
        return Err(ApiError::NotFound(format!("configuration {} not found", id)));
    }
    Ok(Json(config))
}

/// DELETE /api/configs/:id
/// Removes the configuration and, with it, its categories.
pub async fn delete_config(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    if !state.store.delete_config(id, user.id)? {
        return Err(ApiError::NotFound(format!("configuration {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/configs/:id/categories
pub async fn add_category(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryPayload>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    // Ownership check before touching the category table
    state
        .store
        .get_config(id, user.id)?
        .ok_or_else(|| ApiError::NotFound(format!("configuration {} not found", id)))?;
    if payload.name.trim().is_empty() || payload.cell.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "category name and cell must not be empty".to_string(),
        ));
    }

    let mut category = CategoryDefinition {
        id: 0,
        config_id: id,
        name: payload.name.trim().to_string(),
        cell: payload.cell.trim().to_string(),
        kind: payload.kind,
        is_clean: payload.is_clean,
        position: payload.position,
    };
    category.id = state.store.add_category(&category)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/configs/:id/categories/:category_id
pub async fn update_category(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((id, category_id)): Path<(i64, i64)>,
    Json(payload): Json<CategoryPayload>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    state
        .store
        .get_config(id, user.id)?
        .ok_or_else(|| ApiError::NotFound(format!("configuration {} not found", id)))?;

    let category = CategoryDefinition {
        id: category_id,
        config_id: id,
        name: payload.name.trim().to_string(),
        cell: payload.cell.trim().to_string(),
        kind: payload.kind,
        is_clean: payload.is_clean,
        position: payload.position,
    };
    if !state.store.update_category(&category)? {
        return Err(ApiError::NotFound(format!(
            "category {} not found",
            category_id
        )));
    }
    Ok(Json(category))
}

/// DELETE /api/configs/:id/categories/:category_id
pub async fn delete_category(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((id, category_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &jar)?;
    state
        .store
        .get_config(id, user.id)?
        .ok_or_else(|| ApiError::NotFound(format!("configuration {} not found", id)))?;
    if !state.store.delete_category(category_id, id)? {
        return Err(ApiError::NotFound(format!(
            "category {} not found",
            category_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/credentials
/// Stores the Google service-account JSON, encrypted. The blob is validated
/// (parse + usable private key) before anything is written.
pub async fn set_credentials(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(payload): Json<CredentialsPayload>,
) -> Result<impl IntoResponse> {
    authenticate(&state, &jar)?;

    if let Err(e) = SheetsClient::from_service_account_json(&payload.service_account_json) {
        return Err(ApiError::BadRequest(e.to_string()));
    }

    let encrypted = state.cipher.encrypt(&payload.service_account_json)?;
    state.store.set_credentials(&encrypted)?;

    tracing::info!("service account credentials updated");
    Ok(Json(serde_json::json!({ "status": "saved" })))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "ledgerboard-api"
    }))
}
