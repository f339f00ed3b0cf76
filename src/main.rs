use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttt_arena::{
    config::Config, crud::PgStore, memory::MemoryStore, route::create_router,
    service::GameService, store::GameStore, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::debug!(game = ?config.game, "loaded configuration");

    let store: Arc<dyn GameStore> = match &config.database_url {
        Some(db_connection_str) => {
            // set up connection pool
            let pool = postgres::PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(3))
                .connect(db_connection_str)
                .await
                .context("can't connect to database")?;

            // Run migrations
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("can't run migrations")?;

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, games will be kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(GameService::new(store, config.game));
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("can't bind {}", config.bind_addr))?;
    tracing::debug!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
