//! # tokreg-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the compliance registry API.
//! Binds to a configurable port (default 8080).

use std::sync::Arc;
use std::time::Duration;

use tokreg_api::state::{AppConfig, AppState};
use tokreg_core::{ClaimTopic, WalletAddress};
use tokreg_store::{Cache, DocumentStore, MemoryCache, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let defaults = AppConfig::default();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults.port);

    let auth_token = std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());

    let cache_ttl = std::env::var("CACHE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(defaults.cache_ttl);

    let required_topics = match std::env::var("REQUIRED_TOPICS") {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::parse::<ClaimTopic>)
            .collect::<Result<Vec<_>, _>>()?,
        Err(_) => defaults.required_topics,
    };

    let privileged_addresses = match std::env::var("PRIVILEGED_ADDRESSES") {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| WalletAddress::new(a.to_string()))
            .collect::<Result<std::collections::BTreeSet<_>, _>>()?,
        Err(_) => defaults.privileged_addresses,
    };

    let config = AppConfig {
        port,
        auth_token,
        cache_ttl,
        required_topics,
        privileged_addresses,
    };

    // Backing store: Postgres when DATABASE_URL is set, in-memory otherwise.
    let store: Arc<dyn DocumentStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pg = PgStore::connect(&url).await.map_err(|e| {
                tracing::error!("Database initialization failed: {e}");
                e
            })?;
            tracing::info!("Connected to Postgres document store");
            Arc::new(pg)
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());

    let state = AppState::with_backends(config, store, cache);
    let app = tokreg_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Tokreg API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
