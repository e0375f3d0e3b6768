use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::api::{self, AppState};
use crate::backfill::BackfillService;
use crate::cache::CacheStore;
use crate::config::WeatherGatewayConfig;
use crate::resolver::WeatherService;

/// Shared state for the routes
pub fn state(service: Arc<WeatherService>, config: &WeatherGatewayConfig) -> AppState {
    let backfill = Arc::new(BackfillService::new(&service, config.backfill.max_days_back));
    AppState {
        service,
        backfill,
        admin_api_key: Arc::from(config.server.admin_api_key.as_str()),
        backfill_limits: config.backfill.clone(),
    }
}

pub fn app(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api::router(state, request_timeout))
        .layer(cors)
}

/// Periodically drop expired cache entries
pub fn spawn_expiry_sweep(cache: CacheStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Expired cache entries swept"),
                Err(e) => tracing::warn!(error = %e, "Cache sweep failed"),
            }
        }
    })
}

pub async fn run(config: &WeatherGatewayConfig, state: AppState) -> Result<()> {
    let timeout = Duration::from_secs(config.server.request_timeout_seconds.into());
    let app = app(state, timeout);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
        })
        .await
        .context("Web server failed")
}
