use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::models::User;
use crate::db::StorageError;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> Result<String, StorageError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let hours = i64::try_from(hours).unwrap_or(i64::MAX / 3600);
    let expires_at = Utc::now() + Duration::hours(hours);

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, user_id, token, expires_at],
    )?;

    tracing::info!(user_id, "Issued session");
    Ok(token)
}

/// Resolve an unexpired session token to its user.
pub fn find_session_user(pool: &DbPool, token: &str) -> Result<Option<User>, StorageError> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.email, u.first_name, u.last_name, u.profile_image_url,
                    u.created_at, u.updated_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > ?2",
            params![token, Utc::now()],
            crate::auth::identity::user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), StorageError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every expired session. Returns how many were removed.
pub fn purge_expired(pool: &DbPool) -> Result<usize, StorageError> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![Utc::now()],
    )?;
    Ok(removed)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
