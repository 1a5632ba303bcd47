use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::db::inputs::PreferencePatch;
use crate::db::models::UserPreference;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, ValidJson};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/preferences",
        get(get_preferences)
            .put(update_preferences)
            .patch(update_preferences),
    )
}

/// GET /api/preferences: the caller's row, or `{}` before the first save
async fn get_preferences(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let response = match state.storage.get_preferences(user.id()).await? {
        Some(prefs) => Json(prefs).into_response(),
        None => Json(serde_json::json!({})).into_response(),
    };
    Ok(response)
}

/// PUT /api/preferences: create on first save, merge afterwards
async fn update_preferences(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(patch): ValidJson<PreferencePatch>,
) -> AppResult<Json<UserPreference>> {
    let prefs = state.storage.upsert_preferences(user.id(), patch).await?;
    Ok(Json(prefs))
}
