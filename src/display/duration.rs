use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MINUTE: i64 = 60;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;
/// Fixed-length month used by the counter. Not a calendar month.
pub const MONTH: i64 = 30 * DAY;
/// Fixed-length year used by the counter. Ignores leap days.
pub const YEAR: i64 = 365 * DAY;

/// "Together for" counter.
///
/// Every field is taken from the same whole-second total using fixed unit
/// lengths, so `days` is the remainder within a 30-day block rather than
/// what is left over after whole months:
///
/// ```text
/// years   = t / YEAR
/// months  = (t % YEAR)  / MONTH
/// days    = (t % MONTH) / DAY
/// hours   = (t % DAY)   / HOUR
/// minutes = (t % HOUR)  / MINUTE
/// seconds =  t % MINUTE
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDuration {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl RelationshipDuration {
    /// Break down a total number of seconds. Negative totals count as zero.
    pub fn from_seconds(total: i64) -> Self {
        let t = total.max(0);
        Self {
            years: t / YEAR,
            months: (t % YEAR) / MONTH,
            days: (t % MONTH) / DAY,
            hours: (t % DAY) / HOUR,
            minutes: (t % HOUR) / MINUTE,
            seconds: t % MINUTE,
        }
    }

    /// Time elapsed from `start` to `now`, truncated to whole seconds.
    pub fn between(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_seconds((now - start).num_seconds())
    }
}
