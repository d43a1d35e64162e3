mod cache;
mod clock;
mod config;
mod db;
mod errors;
mod geo;
mod geocoding;
mod home;
mod models;
mod routes;
mod search;
mod state;
mod store;
mod workers;
mod zones;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::db::create_pool;
use crate::geocoding::NominatimClient;
use crate::home::engine::HomeEngineConfig;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MarketStore, PgMarketStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting marketplace API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn MarketStore> =
        Arc::new(PgMarketStore::new(create_pool(&config.database_url).await?));

    let geocoder = NominatimClient::new(config.geocoder_url.clone(), &config.geocoder_user_agent)?;
    info!("Reverse geocoder: {}", config.geocoder_url);

    let home_config = HomeEngineConfig {
        default_radius_km: config.home_default_radius_km,
        block_max_items: config.home_block_max_items,
        business_utc_offset_hours: config.business_utc_offset_hours,
    };

    let state = AppState::new(store, Arc::new(geocoder), Arc::new(SystemClock), home_config);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // mini-app is served from another origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
