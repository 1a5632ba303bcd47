use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use chrono_tz::Tz;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt as _;

use crate::config::Config;
use crate::db::models::{Memory, Note};
use crate::display::{CoupleSettings, Tick};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, ValidQuery};
use crate::state::AppState;

/// Notes shown in the "On the fridge" peek.
const RECENT_NOTES: u32 = 2;

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    /// The viewer's own IANA timezone.
    tz: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    #[serde(flatten)]
    pub tick: Tick,
    pub recent_notes: Vec<Note>,
    pub latest_memory: Option<Memory>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(snapshot))
        .route("/api/dashboard/stream", get(stream))
}

fn viewer_timezone(tz: Option<&str>, config: &Config) -> AppResult<Tz> {
    match tz {
        Some(name) => name
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Invalid timezone: {}", name))),
        None => Ok(config.local_timezone()),
    }
}

async fn settings_for(state: &AppState, user: &CurrentUser) -> AppResult<CoupleSettings> {
    let prefs = state.storage.get_preferences(user.id()).await?;
    Ok(CoupleSettings::from_preferences(prefs.as_ref()))
}

/// GET /api/dashboard: clocks, counter and the latest fridge/gallery items
async fn snapshot(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidQuery(query): ValidQuery<ViewerQuery>,
) -> AppResult<Json<DashboardSnapshot>> {
    let viewer_tz = viewer_timezone(query.tz.as_deref(), &state.config)?;
    let settings = settings_for(&state, &user).await?;
    let scope = state.config.board.scope_for(user.id());

    Ok(Json(DashboardSnapshot {
        tick: Tick::compute(Utc::now(), viewer_tz, &settings),
        recent_notes: state.storage.recent_notes(&scope, RECENT_NOTES).await?,
        latest_memory: state.storage.latest_memory(&scope).await?,
    }))
}

/// GET /api/dashboard/stream: one `tick` event per second.
///
/// Each connection owns its interval; it stops when the client goes away.
/// Settings are read once at subscribe time, so clients reconnect after
/// saving preferences.
async fn stream(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidQuery(query): ValidQuery<ViewerQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let viewer_tz = viewer_timezone(query.tz.as_deref(), &state.config)?;
    let settings = settings_for(&state, &user).await?;

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ticks = IntervalStream::new(interval).map(move |_| {
        let tick = Tick::compute(Utc::now(), viewer_tz, &settings);
        Event::default().event("tick").json_data(&tick)
    });

    Ok(Sse::new(ticks).keep_alive(KeepAlive::default()))
}
