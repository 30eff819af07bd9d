// src/main.rs
use crate::config::AppConfig;
use crate::server::AppState;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod connectors;
mod core;
mod error;
mod server;
mod types;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Missing or empty credentials stop us here, before any route is served.
    let config = AppConfig::new()?;

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening for alerts on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
