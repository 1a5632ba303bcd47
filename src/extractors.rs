use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::auth::{get_cookie_value, session, upsert_user, IdentityClaims};
use crate::db::inputs::Validate;
use crate::db::models::User;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated user behind the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

/// Extractor that requires authentication.
/// Returns 401 if neither a live session cookie nor a forwarded identity is present.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = get_cookie_value(parts, &state.config.auth.cookie_name) {
            if let Some(user) = session::find_session_user(&state.db, token)? {
                return Ok(CurrentUser(user));
            }
        }

        // Fall back to the identity the upstream proxy vouches for
        if let Some(claims) = IdentityClaims::from_headers(&parts.headers, &state.config.auth) {
            let user = upsert_user(&state.db, &claims)?;
            return Ok(CurrentUser(user));
        }

        Err(AppError::Unauthorized)
    }
}

/// JSON body that must decode and pass [`Validate`]; anything else is a 400
/// carrying the first problem found.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate().map_err(AppError::BadRequest)?;
        Ok(ValidJson(value))
    }
}

/// Path parameters that reject with a JSON 400 instead of axum's plain text.
pub struct ValidPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(ValidPath(value))
    }
}

/// Query string counterpart of [`ValidPath`].
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(ValidQuery(value))
    }
}
