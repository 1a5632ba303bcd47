// Storage access layer - one table per operation, no cross-entity transactions
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use thiserror::Error;

use crate::db::inputs::{NewMemory, NewNote, NotePatch, PreferencePatch};
use crate::db::models::{
    ListScope, Memory, Note, UserPreference, DEFAULT_PARTNER_TIMEZONE, DEFAULT_THEME_COLOR,
};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// All visible notes, newest first.
    async fn list_notes(&self, scope: &ListScope) -> Result<Vec<Note>, StorageError>;

    /// The newest `limit` visible notes.
    async fn recent_notes(&self, scope: &ListScope, limit: u32)
        -> Result<Vec<Note>, StorageError>;

    async fn create_note(&self, user_id: &str, note: NewNote) -> Result<Note, StorageError>;

    /// Merge a patch onto a note. `None` when the id does not exist.
    async fn update_note(&self, id: i64, patch: NotePatch) -> Result<Option<Note>, StorageError>;

    /// Remove a note; returns whether a row was deleted.
    async fn delete_note(&self, id: i64) -> Result<bool, StorageError>;

    /// All visible memories, most recent `date` first.
    async fn list_memories(&self, scope: &ListScope) -> Result<Vec<Memory>, StorageError>;

    async fn latest_memory(&self, scope: &ListScope) -> Result<Option<Memory>, StorageError>;

    async fn create_memory(&self, user_id: &str, memory: NewMemory)
        -> Result<Memory, StorageError>;

    async fn delete_memory(&self, id: i64) -> Result<bool, StorageError>;

    async fn get_preferences(&self, user_id: &str)
        -> Result<Option<UserPreference>, StorageError>;

    /// Create the caller's preference row or merge into the existing one.
    async fn upsert_preferences(
        &self,
        user_id: &str,
        patch: PreferencePatch,
    ) -> Result<UserPreference, StorageError>;
}

/// SQLite implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: DbPool,
}

impl SqliteStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const NOTE_COLUMNS: &str = "id, user_id, content, color, rotation, x, y, is_draft, created_at";
const MEMORY_COLUMNS: &str = "id, user_id, image_url, caption, date, created_at";
const PREFERENCE_COLUMNS: &str = "id, user_id, partner_name, partner_timezone, \
     relationship_start_date, background_image_url, theme_color";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        color: row.get(3)?,
        rotation: row.get(4)?,
        x: row.get(5)?,
        y: row.get(6)?,
        is_draft: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        image_url: row.get(2)?,
        caption: row.get(3)?,
        date: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn preference_from_row(row: &Row<'_>) -> rusqlite::Result<UserPreference> {
    Ok(UserPreference {
        id: row.get(0)?,
        user_id: row.get(1)?,
        partner_name: row.get(2)?,
        partner_timezone: row.get(3)?,
        relationship_start_date: row.get(4)?,
        background_image_url: row.get(5)?,
        theme_color: row.get(6)?,
    })
}

fn find_note(conn: &Connection, id: i64) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS),
        params![id],
        note_from_row,
    )
    .optional()
}

fn find_preferences(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UserPreference>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM user_preferences WHERE user_id = ?1 ORDER BY id LIMIT 1",
            PREFERENCE_COLUMNS
        ),
        params![user_id],
        preference_from_row,
    )
    .optional()
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_notes(&self, scope: &ListScope) -> Result<Vec<Note>, StorageError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE (?1 IS NULL OR user_id = ?1)
             ORDER BY created_at DESC, id DESC",
            NOTE_COLUMNS
        ))?;
        let notes = stmt
            .query_map(params![scope.owner()], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    async fn recent_notes(
        &self,
        scope: &ListScope,
        limit: u32,
    ) -> Result<Vec<Note>, StorageError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE (?1 IS NULL OR user_id = ?1)
             ORDER BY created_at DESC, id DESC LIMIT ?2",
            NOTE_COLUMNS
        ))?;
        let notes = stmt
            .query_map(params![scope.owner(), limit], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    async fn create_note(&self, user_id: &str, note: NewNote) -> Result<Note, StorageError> {
        let conn = self.pool.get()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO notes (user_id, content, color, rotation, x, y, is_draft, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                note.content,
                note.color,
                note.rotation,
                note.x,
                note.y,
                note.is_draft,
                created_at
            ],
        )?;

        Ok(Note {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            content: note.content,
            color: note.color,
            rotation: note.rotation,
            x: note.x,
            y: note.y,
            is_draft: note.is_draft,
            created_at,
        })
    }

    async fn update_note(&self, id: i64, patch: NotePatch) -> Result<Option<Note>, StorageError> {
        let conn = self.pool.get()?;

        let Some(mut note) = find_note(&conn, id)? else {
            return Ok(None);
        };
        patch.apply(&mut note);

        conn.execute(
            "UPDATE notes SET content = ?2, color = ?3, rotation = ?4, x = ?5, y = ?6, is_draft = ?7
             WHERE id = ?1",
            params![
                id,
                note.content,
                note.color,
                note.rotation,
                note.x,
                note.y,
                note.is_draft
            ],
        )?;

        Ok(Some(note))
    }

    async fn delete_note(&self, id: i64) -> Result<bool, StorageError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn list_memories(&self, scope: &ListScope) -> Result<Vec<Memory>, StorageError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memories WHERE (?1 IS NULL OR user_id = ?1)
             ORDER BY date DESC, id DESC",
            MEMORY_COLUMNS
        ))?;
        let memories = stmt
            .query_map(params![scope.owner()], memory_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(memories)
    }

    async fn latest_memory(&self, scope: &ListScope) -> Result<Option<Memory>, StorageError> {
        let conn = self.pool.get()?;
        let memory = conn
            .query_row(
                &format!(
                    "SELECT {} FROM memories WHERE (?1 IS NULL OR user_id = ?1)
                     ORDER BY date DESC, id DESC LIMIT 1",
                    MEMORY_COLUMNS
                ),
                params![scope.owner()],
                memory_from_row,
            )
            .optional()?;
        Ok(memory)
    }

    async fn create_memory(
        &self,
        user_id: &str,
        memory: NewMemory,
    ) -> Result<Memory, StorageError> {
        let conn = self.pool.get()?;
        let created_at = Utc::now();
        let date = memory.date.unwrap_or(created_at);

        conn.execute(
            "INSERT INTO memories (user_id, image_url, caption, date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, memory.image_url, memory.caption, date, created_at],
        )?;

        Ok(Memory {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            image_url: memory.image_url,
            caption: memory.caption,
            date,
            created_at,
        })
    }

    async fn delete_memory(&self, id: i64) -> Result<bool, StorageError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn get_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<UserPreference>, StorageError> {
        let conn = self.pool.get()?;
        Ok(find_preferences(&conn, user_id)?)
    }

    async fn upsert_preferences(
        &self,
        user_id: &str,
        patch: PreferencePatch,
    ) -> Result<UserPreference, StorageError> {
        let mut conn = self.pool.get()?;
        // IMMEDIATE takes the write lock up front so two upserts for the same
        // user cannot both see "absent" and insert twice
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let prefs = match find_preferences(&tx, user_id)? {
            Some(mut prefs) => {
                patch.apply(&mut prefs);
                tx.execute(
                    "UPDATE user_preferences SET partner_name = ?2, partner_timezone = ?3,
                       relationship_start_date = ?4, background_image_url = ?5, theme_color = ?6
                     WHERE id = ?1",
                    params![
                        prefs.id,
                        prefs.partner_name,
                        prefs.partner_timezone,
                        prefs.relationship_start_date,
                        prefs.background_image_url,
                        prefs.theme_color
                    ],
                )?;
                prefs
            }
            None => {
                let mut prefs = UserPreference {
                    id: 0,
                    user_id: user_id.to_string(),
                    partner_name: None,
                    partner_timezone: Some(DEFAULT_PARTNER_TIMEZONE.to_string()),
                    relationship_start_date: None,
                    background_image_url: None,
                    theme_color: Some(DEFAULT_THEME_COLOR.to_string()),
                };
                patch.apply(&mut prefs);
                tx.execute(
                    "INSERT INTO user_preferences (user_id, partner_name, partner_timezone,
                       relationship_start_date, background_image_url, theme_color)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        prefs.user_id,
                        prefs.partner_name,
                        prefs.partner_timezone,
                        prefs.relationship_start_date,
                        prefs.background_image_url,
                        prefs.theme_color
                    ],
                )?;
                prefs.id = tx.last_insert_rowid();
                tracing::info!(user_id, "Created preferences");
                prefs
            }
        };

        tx.commit()?;
        Ok(prefs)
    }
}
