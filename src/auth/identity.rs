//! Identity claims asserted by the upstream identity provider.
//!
//! Credential checks happen outside this server. An authenticating proxy
//! forwards the verified user id (and optionally email / display name) in
//! request headers; we mirror those claims into `users` so rows can carry a
//! foreign key to their author.

use axum::http::HeaderMap;
use chrono::Utc;
use rusqlite::{params, Row};

use crate::config::AuthConfig;
use crate::db::models::User;
use crate::db::StorageError;
use crate::state::DbPool;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaims {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
}

impl IdentityClaims {
    /// Read claims from the configured proxy headers. `None` when identity
    /// forwarding is disabled or the id header is missing or blank.
    pub fn from_headers(headers: &HeaderMap, auth: &AuthConfig) -> Option<Self> {
        let id_header = auth.identity_header.as_deref()?;
        let id = header_value(headers, id_header)?;

        let email = auth
            .email_header
            .as_deref()
            .and_then(|h| header_value(headers, h));

        let (first_name, last_name) = auth
            .name_header
            .as_deref()
            .and_then(|h| header_value(headers, h))
            .map(|name| split_name(&name))
            .unwrap_or((None, None));

        Some(Self {
            id,
            email,
            first_name,
            last_name,
            profile_image_url: None,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn split_name(full: &str) -> (Option<String>, Option<String>) {
    let mut parts = full.trim().splitn(2, ' ');
    let first = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    let last = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    (first, last)
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        profile_image_url: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Insert or refresh the mirrored user row for a set of claims.
///
/// Claims the provider did not send keep their stored value.
pub fn upsert_user(pool: &DbPool, claims: &IdentityClaims) -> Result<User, StorageError> {
    let conn = pool.get()?;
    let now = Utc::now();

    conn.execute(
        "INSERT INTO users (id, email, first_name, last_name, profile_image_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(id) DO UPDATE SET
           email = COALESCE(excluded.email, users.email),
           first_name = COALESCE(excluded.first_name, users.first_name),
           last_name = COALESCE(excluded.last_name, users.last_name),
           profile_image_url = COALESCE(excluded.profile_image_url, users.profile_image_url),
           updated_at = excluded.updated_at",
        params![
            claims.id,
            claims.email,
            claims.first_name,
            claims.last_name,
            claims.profile_image_url,
            now
        ],
    )?;

    let user = conn.query_row(
        "SELECT id, email, first_name, last_name, profile_image_url, created_at, updated_at
         FROM users WHERE id = ?1",
        params![claims.id],
        user_from_row,
    )?;
    Ok(user)
}
