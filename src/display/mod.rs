//! Dashboard display math. Everything here is a pure function of "now",
//! a timezone and the stored preferences; nothing is persisted.

pub mod clock;
pub mod duration;

pub use clock::{ClockFace, DualClock};
pub use duration::RelationshipDuration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::db::models::{UserPreference, DEFAULT_PARTNER_TIMEZONE};

/// The parts of a preference row the dashboard needs, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CoupleSettings {
    pub partner_name: Option<String>,
    pub partner_timezone: Tz,
    pub relationship_start: Option<DateTime<Utc>>,
}

impl Default for CoupleSettings {
    fn default() -> Self {
        Self {
            partner_name: None,
            partner_timezone: default_partner_timezone(),
            relationship_start: None,
        }
    }
}

impl CoupleSettings {
    pub fn from_preferences(prefs: Option<&UserPreference>) -> Self {
        let Some(prefs) = prefs else {
            return Self::default();
        };
        Self {
            partner_name: prefs.partner_name.clone(),
            partner_timezone: prefs
                .partner_timezone
                .as_deref()
                .and_then(|tz| tz.parse().ok())
                .unwrap_or_else(default_partner_timezone),
            relationship_start: prefs.relationship_start_date,
        }
    }
}

fn default_partner_timezone() -> Tz {
    DEFAULT_PARTNER_TIMEZONE.parse().unwrap_or(chrono_tz::Asia::Tokyo)
}

/// What the dashboard shows for a single second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub at: DateTime<Utc>,
    pub clock: DualClock,
    /// `None` until a relationship start date is set.
    pub together: Option<RelationshipDuration>,
}

impl Tick {
    pub fn compute(now: DateTime<Utc>, viewer_tz: Tz, settings: &CoupleSettings) -> Self {
        Self {
            at: now,
            clock: DualClock::at(
                now,
                viewer_tz,
                settings.partner_timezone,
                settings.partner_name.as_deref(),
            ),
            together: settings
                .relationship_start
                .map(|start| RelationshipDuration::between(start, now)),
        }
    }
}
