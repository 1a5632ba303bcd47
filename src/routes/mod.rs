pub mod auth;
pub mod dashboard;
pub mod memories;
pub mod notes;
pub mod preferences;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every API route, still waiting for state.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(notes::router())
        .merge(memories::router())
        .merge(preferences::router())
        .merge(dashboard::router())
}

/// The fully assembled application. `test_seed` mounts `/test/seed`.
pub fn app(state: AppState, test_seed: bool) -> Router {
    let mut app = router();
    if test_seed {
        app = app.route("/test/seed", get(auth::test_seed));
    }
    app.layer(TraceLayer::new_for_http()).with_state(state)
}
