#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use together::config::{BoardScope, Config};
use together::db::{self, SqliteStorage};
use together::state::AppState;

pub const IDENTITY_HEADER: &str = "x-forwarded-user";

/// Config that trusts `x-forwarded-user` as the upstream identity.
pub fn proxy_config(scope: BoardScope) -> Config {
    let mut config = Config::default();
    config.auth.identity_header = Some(IDENTITY_HEADER.to_string());
    config.auth.email_header = Some("x-forwarded-email".to_string());
    config.board.scope = scope;
    config
}

/// Fresh on-disk database plus state. Keep the TempDir alive for the test.
pub fn test_state(config: Config) -> (TempDir, AppState) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pool = db::create_pool(&db_path).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let state = AppState {
        db: pool.clone(),
        storage: Arc::new(SqliteStorage::new(pool)),
        config,
    };
    (temp_dir, state)
}
