use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use attendance_server::clock::SystemClock;
use attendance_server::config::{Config, StoreBackend};
use attendance_server::store::PgStore;
use attendance_server::{api, Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::from_env()?;
    let registry = Arc::new(connect(&config).await?);
    let app = api::router(registry);

    let addr = config.socket_addr();
    log::info!("Starting attendance HTTP server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<Registry> {
    match config.backend {
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store, records will not survive a restart");
            Ok(Registry::in_memory(Arc::new(SystemClock)))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is not defined in environment variables")?;
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
                .context("could not connect to the database")?;
            log::info!("Database connected successfully");

            let store = Arc::new(PgStore::new(pool));
            store.prepare().await?;
            Ok(Registry::with_system_clock(store.clone(), store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Could not listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
