//! Settings API endpoints
//!
//! Global settings act as the last fallback for inherited values such as
//! `root_pass`.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};

use crate::{
    models::{Setting, UpdateSettingRequest},
    utils::AppError,
    AppState,
};

/// Create routes for settings endpoints
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_settings))
        .route("/{key}", put(update_setting))
}

async fn list_settings(State(state): State<AppState>) -> Result<Json<Vec<Setting>>, AppError> {
    Ok(Json(state.hostgroups.settings().await?))
}

async fn update_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<UpdateSettingRequest>,
) -> Result<Json<Setting>, AppError> {
    if key.trim().is_empty() {
        return Err(AppError::bad_request("Setting key cannot be empty"));
    }
    let ctx = state.mutation_context();
    let setting = state
        .hostgroups
        .update_setting(&ctx, &key, &payload.value, payload.description.as_deref())
        .await?;
    Ok(Json(setting))
}
