//! OpenSASE Storefront - catalog, cart and review service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_storefront::api::{self, AppState};
use opensase_storefront::config::Config;
use opensase_storefront::publisher::{EventPublisher, LogPublisher, NatsPublisher};
use opensase_storefront::repository::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                info!(%url, "connected to NATS");
                Arc::new(NatsPublisher::new(client))
            }
            Err(e) => {
                warn!(%url, error = %e, "NATS unavailable, domain events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let state = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(config.max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!(max_connections = config.max_connections, "connected to Postgres");
            AppState::from_store(PgStore::new(pool), events, config.low_stock_threshold)
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            AppState::from_store(MemoryStore::new(), events, config.low_stock_threshold)
        }
    };

    let app = api::router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    info!("OpenSASE Storefront listening on {addr}");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
