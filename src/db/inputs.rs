// Request payloads shared by the HTTP layer, the storage layer and the client.
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::models::{Note, NoteColor, UserPreference};

/// Checks a decoded payload; the error is the first violation found.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub color: NoteColor,
    #[serde(default)]
    pub rotation: i64,
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    #[serde(default)]
    pub is_draft: bool,
}

impl Validate for NewNote {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.content, "Content is required")
    }
}

impl NewNote {
    /// A fresh note as the fridge composer makes it: slightly tilted.
    pub fn tilted(content: impl Into<String>, color: NoteColor) -> Self {
        Self {
            content: content.into(),
            color,
            rotation: rand::thread_rng().gen_range(-3..=2),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<NoteColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
}

impl Validate for NotePatch {
    fn validate(&self) -> Result<(), String> {
        match &self.content {
            Some(content) => require_text(content, "Content cannot be empty"),
            None => Ok(()),
        }
    }
}

impl NotePatch {
    /// Merge the present fields onto an existing note.
    pub fn apply(self, note: &mut Note) {
        if let Some(content) = self.content {
            note.content = content;
        }
        if let Some(color) = self.color {
            note.color = color;
        }
        if let Some(rotation) = self.rotation {
            note.rotation = rotation;
        }
        if let Some(x) = self.x {
            note.x = x;
        }
        if let Some(y) = self.y {
            note.y = y;
        }
        if let Some(is_draft) = self.is_draft {
            note.is_draft = is_draft;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemory {
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// When the photo was taken; defaults to the time of upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl Validate for NewMemory {
    fn validate(&self) -> Result<(), String> {
        require_text(&self.image_url, "Image URL is required")
    }
}

/// Partial preference update.
///
/// Nullable columns use `Option<Option<T>>`: an absent key leaves the stored
/// value alone while an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencePatch {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub partner_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_timezone: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub relationship_start_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_image_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
}

impl Validate for PreferencePatch {
    fn validate(&self) -> Result<(), String> {
        if let Some(tz) = &self.partner_timezone {
            tz.parse::<Tz>()
                .map_err(|_| format!("Invalid timezone: {}", tz))?;
        }
        if let Some(color) = &self.theme_color {
            require_text(color, "Theme color cannot be empty")?;
        }
        Ok(())
    }
}

impl PreferencePatch {
    pub fn apply(self, prefs: &mut UserPreference) {
        if let Some(name) = self.partner_name {
            prefs.partner_name = name;
        }
        if let Some(tz) = self.partner_timezone {
            prefs.partner_timezone = Some(tz);
        }
        if let Some(start) = self.relationship_start_date {
            prefs.relationship_start_date = start;
        }
        if let Some(url) = self.background_image_url {
            prefs.background_image_url = url;
        }
        if let Some(color) = self.theme_color {
            prefs.theme_color = Some(color);
        }
    }
}

fn require_text(value: &str, message: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(message.to_string())
    } else {
        Ok(())
    }
}

// Marks a key as present even when its value is null.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
