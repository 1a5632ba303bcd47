use chrono::{DateTime, Datelike, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One rendered clock card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockFace {
    pub label: String,
    pub timezone: String,
    /// Human place name taken from the zone id, e.g. "New York".
    pub place: String,
    /// `HH:MM`, 24-hour.
    pub time: String,
    /// `SS`
    pub seconds: String,
    /// e.g. "Friday, October 16th"
    pub date_line: String,
    pub utc_offset_minutes: i32,
}

impl ClockFace {
    pub fn at(now: DateTime<Utc>, tz: Tz, label: impl Into<String>) -> Self {
        let local = now.with_timezone(&tz);
        Self {
            label: label.into(),
            timezone: tz.name().to_string(),
            place: place_name(tz.name()),
            time: local.format("%H:%M").to_string(),
            seconds: local.format("%S").to_string(),
            date_line: format!(
                "{}, {} {}",
                local.format("%A"),
                local.format("%B"),
                ordinal(local.day())
            ),
            utc_offset_minutes: offset_minutes(&tz, now),
        }
    }
}

/// "My Time" next to the partner's time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualClock {
    pub mine: ClockFace,
    pub partner: ClockFace,
    /// How far the partner's wall clock is ahead of ours (negative when behind).
    pub difference_minutes: i32,
}

impl DualClock {
    pub fn at(now: DateTime<Utc>, local_tz: Tz, partner_tz: Tz, partner_name: Option<&str>) -> Self {
        let name = partner_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Partner");
        let mine = ClockFace::at(now, local_tz, "My Time");
        let partner = ClockFace::at(now, partner_tz, format!("{}'s Time", name));
        let difference_minutes = partner.utc_offset_minutes - mine.utc_offset_minutes;
        Self {
            mine,
            partner,
            difference_minutes,
        }
    }
}

fn offset_minutes(tz: &Tz, now: DateTime<Utc>) -> i32 {
    tz.offset_from_utc_datetime(&now.naive_utc())
        .fix()
        .local_minus_utc()
        / 60
}

fn place_name(zone: &str) -> String {
    match zone.rsplit_once('/') {
        Some((_, city)) => city.replace('_', " "),
        None => zone.to_string(),
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}
