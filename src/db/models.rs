use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PARTNER_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_THEME_COLOR: &str = "blue";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    pub id: i64,
    pub user_id: String,
    pub partner_name: Option<String>,
    pub partner_timezone: Option<String>,
    pub relationship_start_date: Option<DateTime<Utc>>,
    pub background_image_url: Option<String>,
    pub theme_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    pub color: NoteColor,
    pub rotation: i64,
    pub x: i64,
    pub y: i64,
    pub is_draft: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: i64,
    pub user_id: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Sticky-note paper colors offered on the fridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Blue,
    Pink,
    Green,
    Purple,
}

impl NoteColor {
    pub const ALL: [NoteColor; 5] = [
        NoteColor::Yellow,
        NoteColor::Blue,
        NoteColor::Pink,
        NoteColor::Green,
        NoteColor::Purple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteColor::Yellow => "yellow",
            NoteColor::Blue => "blue",
            NoteColor::Pink => "pink",
            NoteColor::Green => "green",
            NoteColor::Purple => "purple",
        }
    }
}

impl fmt::Display for NoteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoteColor::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown note color: {}", s))
    }
}

impl ToSql for NoteColor {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for NoteColor {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        // Rows written before the palette existed fall back to yellow
        Ok(value.as_str()?.parse().unwrap_or_default())
    }
}

/// Which rows a list query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// Every row in the instance; one deployment serves one couple.
    Shared,
    /// Only rows written by the given user.
    Personal(String),
}

impl ListScope {
    pub(crate) fn owner(&self) -> Option<&str> {
        match self {
            ListScope::Shared => None,
            ListScope::Personal(user_id) => Some(user_id),
        }
    }
}
