mod api_doc;
mod auth;
mod config;
mod dispatch;
mod error;
mod handlers;
mod models;
mod routes;
mod seed;
mod state;
mod store;
mod template;

use anyhow::Context;
use config::{Config, StoreBackend};
use state::AppState;
use std::sync::Arc;
use store::{InMemoryRouteStore, RouteStore, SpannerRouteStore};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("rust-spanner-mock starting");

    let config = Config::from_env()?;
    config.log_startup();

    let store: Arc<dyn RouteStore> = match (config.store_backend, &config.spanner) {
        (StoreBackend::Spanner, Some(spanner)) => {
            Arc::new(SpannerRouteStore::from_config(spanner).await?)
        }
        (StoreBackend::Spanner, None) => anyhow::bail!("Spanner backend selected without Spanner settings"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using the in-memory route store; routes are lost on restart");
            Arc::new(InMemoryRouteStore::new())
        }
    };

    if config.seed_sample_routes {
        seed::seed_sample_routes(store.as_ref()).await?;
    }

    let active = store
        .list_active()
        .await
        .context("Failed to load active routes")?;
    tracing::info!("{} active mock routes", active.len());

    let bind_address = config.bind_address();
    let app = routes::router(AppState::new(store, config));

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("rust-spanner-mock stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
