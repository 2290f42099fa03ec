mod config;
mod entitlements;
mod settings;
mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::{trace::TraceLayer, cors::CorsLayer};
use tracing_subscriber::{EnvFilter, fmt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use entitlements::{EntitlementService, OnlineConfig, OnlineValidator, ResultCache, TokenVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();

    let cfg = config::AppConfig::from_env()?;
    let verifier = TokenVerifier::from_base64(&cfg.license_public_key)?;
    let online = OnlineValidator::new(OnlineConfig {
        base_url: cfg.license_api.clone(),
        product_id: cfg.product_id.clone(),
        store_id: cfg.store_id.clone(),
        timeout: cfg.license_timeout,
    })?;
    let ents = Arc::new(EntitlementService::new(
        Arc::new(settings::InMemorySettingsStore::new()),
        verifier,
        Arc::new(online),
        ResultCache::new(cfg.cache_ttl),
        cfg.instance_id.clone(),
    ));

    if let Err(err) = ents.load_subscription().await {
        tracing::warn!(error = %err, "starting on the free plan");
    }

    let cancel = CancellationToken::new();
    let refresher = entitlements::spawn_refresh(ents.clone(), cfg.refresh_interval, cancel.clone());

    let app = api::router(api::AppState::new(ents))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = cfg.bind_addr.parse()?;
    tracing::info!(%addr, instance = %cfg.instance_id, "waypoint starting");
    let listener = TcpListener::bind(addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await?;

    cancel.cancel();
    refresher.await?;
    Ok(())
}
