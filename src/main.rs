use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use together::auth::session;
use together::config::{Cli, Config};
use together::db::{self, SqliteStorage};
use together::routes;
use together::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    let purged = session::purge_expired(&pool)?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    tracing::info!("Board scope: {:?}", config.board.scope);

    let state = AppState {
        db: pool.clone(),
        storage: Arc::new(SqliteStorage::new(pool)),
        config: config.clone(),
    };

    // Test-only seed endpoint: creates a user + session, returns session cookie
    let test_seed = std::env::var("TOGETHER_TEST_SEED").is_ok();
    if test_seed {
        tracing::warn!("TOGETHER_TEST_SEED is set; /test/seed is mounted");
    }
    let app = routes::app(state, test_seed);

    // Start server
    let listener = config.server.bind().await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
