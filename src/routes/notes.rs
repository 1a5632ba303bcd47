use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::inputs::{NewNote, NotePatch};
use crate::db::models::Note;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, ValidJson, ValidPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/{id}",
            axum::routing::put(update_note)
                .patch(update_note)
                .delete(delete_note),
        )
}

/// GET /api/notes: everything on the fridge, newest first
async fn list_notes(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Note>>> {
    let scope = state.config.board.scope_for(user.id());
    Ok(Json(state.storage.list_notes(&scope).await?))
}

/// POST /api/notes
async fn create_note(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(note): ValidJson<NewNote>,
) -> AppResult<(StatusCode, Json<Note>)> {
    let note = state.storage.create_note(user.id(), note).await?;
    tracing::debug!(note_id = note.id, user_id = user.id(), "Note stuck on the fridge");
    Ok((StatusCode::CREATED, Json(note)))
}

/// PUT /api/notes/{id}: merge the given fields
async fn update_note(
    State(state): State<AppState>,
    _user: CurrentUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(patch): ValidJson<NotePatch>,
) -> AppResult<Json<Note>> {
    state
        .storage
        .update_note(id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Note not found".into()))
}

/// DELETE /api/notes/{id}: succeeds whether or not the note still exists
async fn delete_note(
    State(state): State<AppState>,
    _user: CurrentUser,
    ValidPath(id): ValidPath<i64>,
) -> AppResult<StatusCode> {
    state.storage.delete_note(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
