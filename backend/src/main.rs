use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use habit_tracker_api::config::Config;
use habit_tracker_api::store::{postgres, MemoryStore, PgStore};
use habit_tracker_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "habit_tracker_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env()?);

    let state = match &config.database_url {
        Some(url) => {
            let db = postgres::create_pool(url, config.store_timeout()).await?;
            let store = Arc::new(PgStore::new(db));
            store.migrate().await?;
            tracing::info!("Database migrations applied");
            AppState::new(config.clone(), store.clone(), store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            AppState::in_memory(config.clone(), MemoryStore::new())
        }
    };

    state.rate_limiter.spawn_cleanup();

    let app = habit_tracker_api::router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
