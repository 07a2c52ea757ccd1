mod api;
mod application;
mod commands;
mod config;
mod error;
mod infrastructure;
mod models;
mod state;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::ports::KvStore;
use config::{AppConfig, LogFormat, StoreBackend};
use infrastructure::circleci::CircleCiClient;
use infrastructure::database::{MemoryKvStore, SqliteKvStore};
use infrastructure::notifications::MattermostClient;
use state::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    info!("Starting CircleCI bridge");

    let store = open_store(&config.store).await?;
    let sink = Arc::new(MattermostClient::new(&config.mattermost_url, &config.mattermost_bot_token)?);
    let ci = Arc::new(CircleCiClient::new(&config.circleci_api_url)?);

    let listen_addr = config.listen_addr;
    let ctx = AppContext::new(config, store, sink, ci);
    let app = api::router(ctx);

    info!("Listening on {}", listen_addr);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn KvStore>> {
    match backend {
        StoreBackend::Memory => {
            info!("Using in-memory KV store; data is lost on restart");
            Ok(Arc::new(MemoryKvStore::new()))
        }
        StoreBackend::Sqlite(database_url) => {
            info!("Connecting to database: {}", database_url);
            let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
            if let Some(dir) = options.get_filename().parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
            }
            let pool = SqlitePool::connect_with(options).await?;

            info!("Running database migrations");
            sqlx::migrate!("./migrations").run(&pool).await?;

            Ok(Arc::new(SqliteKvStore::new(pool)))
        }
    }
}
