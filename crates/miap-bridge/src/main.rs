//! miap HTTP Bridge
//!
//! Axum server that embeds one store adapter and lets a webview front end
//! drive it: fire the platform-ready signal, push identity changes, look up
//! prices, purchase, restore, and open subscription management.
//!
//! Runs against the in-memory sandbox SDK, stocked from the configured
//! product catalog.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use miap_core::{ApiKeys, MockPurchases, Platform, ProductCatalog, StoreSettings};

use crate::handlers::{
    get_price, health_check, list_products, manage_subscription, platform_ready, purchase,
    restore_purchases, set_identity,
};
use crate::state::AppState;

/// Price of every sandbox product
fn sandbox_price() -> Decimal {
    Decimal::new(499, 2)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let platform: Platform = std::env::var("MIAP_PLATFORM")
        .unwrap_or_else(|_| "web".into())
        .parse()?;
    let settings = load_settings(platform)?;

    let mut sdk =
        MockPurchases::from_catalog(&settings.products, platform, sandbox_price(), "USD");
    if let Ok(url) = std::env::var("MIAP_MANAGEMENT_URL") {
        sdk = sdk.with_management_url(url);
    }
    tracing::info!("✓ Sandbox purchases SDK stocked for {}", platform);

    let state = AppState::build(settings, platform, Arc::new(sdk));

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("miap bridge running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                         - Health check");
    tracing::info!("  POST /api/platform/ready             - Fire platform-ready signal");
    tracing::info!("  PUT  /api/identity                   - Push current identity");
    tracing::info!("  GET  /api/products                   - List catalog products");
    tracing::info!("  GET  /api/products/{{key}}/price       - Localized price");
    tracing::info!("  POST /api/products/{{key}}/purchase    - Purchase");
    tracing::info!("  POST /api/restore                    - Restore purchases");
    tracing::info!("  POST /api/subscription/manage        - Open subscription management");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Settings from `MIAP_SETTINGS` (JSON file), or API keys from the environment
fn load_settings(platform: Platform) -> anyhow::Result<StoreSettings> {
    if let Ok(path) = std::env::var("MIAP_SETTINGS") {
        let settings = StoreSettings::from_json_file(&path)?;
        if settings.products.is_empty() {
            tracing::warn!("⚠ {} lists no products", path);
        } else {
            tracing::info!("✓ Loaded {} products from {}", settings.products.len(), path);
        }
        return Ok(settings);
    }

    let api_keys = match ApiKeys::from_env() {
        Ok(keys) => keys,
        Err(e) if platform.has_store() => return Err(e.into()),
        Err(_) => ApiKeys::default(),
    };
    tracing::warn!("⚠ MIAP_SETTINGS not set - starting with an empty catalog");

    Ok(StoreSettings::new(api_keys, ProductCatalog::new()))
}

fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Host signals
        .route("/api/platform/ready", post(platform_ready))
        .route("/api/identity", put(set_identity))
        // Store
        .route("/api/products", get(list_products))
        .route("/api/products/{key}/price", get(get_price))
        .route("/api/products/{key}/purchase", post(purchase))
        .route("/api/restore", post(restore_purchases))
        .route("/api/subscription/manage", post(manage_subscription))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
