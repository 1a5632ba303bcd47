use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};

use crate::db::inputs::NewMemory;
use crate::db::models::Memory;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, ValidJson, ValidPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/memories", get(list_memories).post(create_memory))
        .route("/api/memories/{id}", delete(delete_memory))
}

async fn list_memories(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Memory>>> {
    let scope = state.config.board.scope_for(user.id());
    Ok(Json(state.storage.list_memories(&scope).await?))
}

async fn create_memory(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(memory): ValidJson<NewMemory>,
) -> AppResult<(StatusCode, Json<Memory>)> {
    let memory = state.storage.create_memory(user.id(), memory).await?;
    Ok((StatusCode::CREATED, Json(memory)))
}

// Memories are immutable once posted; delete is the only mutation.
async fn delete_memory(
    State(state): State<AppState>,
    _user: CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> AppResult<StatusCode> {
    state.storage.delete_memory(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
