use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::auth::{self, session, upsert_user, IdentityClaims};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/login", get(login))
        .route("/api/logout", get(logout).post(logout))
        .route("/api/auth/user", get(current_user))
}

/// GET /api/login: trade the identity asserted by the upstream proxy for a
/// session cookie, then go home.
async fn login(State(state): State<AppState>, request: Request) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();
    let Some(claims) = IdentityClaims::from_headers(&parts.headers, &state.config.auth) else {
        tracing::warn!("Login attempted without a forwarded identity");
        return Err(AppError::Unauthorized);
    };

    let user = upsert_user(&state.db, &claims)?;
    let token = session::create_session(&state.db, &user.id, state.config.auth.session_hours)?;

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (
                header::SET_COOKIE,
                auth::session_cookie(
                    &state.config.auth.cookie_name,
                    &token,
                    state.config.auth.session_hours,
                ),
            ),
        ],
    )
        .into_response())
}

/// GET|POST /api/logout: delete session and redirect
async fn logout(State(state): State<AppState>, request: Request) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = auth::get_cookie_value(&parts, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, auth::clear_session_cookie(cookie_name)),
        ],
    )
        .into_response())
}

/// GET /api/auth/user
async fn current_user(user: CurrentUser) -> Json<User> {
    Json(user.0)
}

/// Test-only: seed a user + session and return the session cookie.
/// Only mounted when TOGETHER_TEST_SEED is set.
pub async fn test_seed(State(state): State<AppState>) -> AppResult<Response> {
    let user = upsert_user(
        &state.db,
        &IdentityClaims {
            id: "testuser".to_string(),
            first_name: Some("Test".to_string()),
            ..Default::default()
        },
    )?;
    let token = session::create_session(&state.db, &user.id, 1)?;

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            auth::session_cookie(&state.config.auth.cookie_name, &token, 1),
        )],
        Json(user),
    )
        .into_response())
}
