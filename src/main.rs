use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tiered_weather::{
    CacheStore, Clock, HistoricalStore, OpenMeteoProvider, StaticGazetteer, SystemClock,
    WeatherGatewayConfig, WeatherProvider, WeatherService, config::LoggingConfig, web,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = WeatherGatewayConfig::load()?;
    init_tracing(&config.logging);
    tracing::info!(version = tiered_weather::VERSION, "Starting tiered-weather");

    let db = fjall::Database::builder(&config.storage.path)
        .open()
        .with_context(|| format!("Failed to open database at {}", config.storage.path))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = Arc::new(OpenMeteoProvider::new(&config.upstream)?);
    let cache = CacheStore::open(
        &db,
        config.cache.ttl_policy(),
        Arc::clone(&clock),
        provider.name(),
    )?;
    let history = HistoricalStore::open(&db, config.history.tracked_cities.iter().cloned())?;
    tracing::info!(
        tracked = ?config.history.tracked_cities,
        "Historical tracking enabled"
    );

    let service = Arc::new(WeatherService::new(
        Arc::new(StaticGazetteer),
        cache,
        history,
        provider,
        clock,
    ));

    let sweep_every = Duration::from_secs(u64::from(config.cache.sweep_interval_minutes) * 60);
    let sweeper = web::spawn_expiry_sweep(service.cache().clone(), sweep_every);

    let state = web::state(Arc::clone(&service), &config);
    let result = web::run(&config, state).await;
    sweeper.abort();
    result
}
