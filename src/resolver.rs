//! Tiered resolution: cache, then historical store, then upstream.
//!
//! Each tier is a [`Resolver`]. The chain is walked in order until one tier
//! produces a value; every tier ahead of the one that answered then gets a
//! chance to keep a copy. All values travel through the chain in canonical
//! units and are converted to the caller's units only at hand-off.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheKey, CacheStats, CacheStore, PurgeResult};
use crate::clock::Clock;
use crate::gazetteer::Gazetteer;
use crate::history::{HistoricalStore, StoreStats};
use crate::models::{City, DataKind, Tier, WeatherMeta, WeatherPayload};
use crate::provider::WeatherProvider;
use crate::units::Units;
use crate::{Result, WeatherError};

/// What is being asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Current,
    Historical { date: NaiveDate },
    Forecast { date: NaiveDate },
    Stats { start: NaiveDate, end: NaiveDate },
}

impl Query {
    #[must_use]
    pub fn kind(&self) -> DataKind {
        match self {
            Query::Current => DataKind::Current,
            Query::Historical { .. } => DataKind::Historical,
            Query::Forecast { .. } => DataKind::Forecast,
            Query::Stats { .. } => DataKind::Stats,
        }
    }

    fn cache_key(&self, city: &str, today: NaiveDate) -> CacheKey {
        match *self {
            Query::Current => CacheKey::for_date(city, today, DataKind::Current),
            Query::Historical { date } => CacheKey::for_date(city, date, DataKind::Historical),
            Query::Forecast { date } => CacheKey::for_date(city, date, DataKind::Forecast),
            Query::Stats { start, end } => CacheKey::for_range(city, start, end),
        }
    }
}

/// A validated request as seen by the tiers
#[derive(Debug, Clone)]
pub struct Lookup {
    pub city: City,
    pub query: Query,
    pub key: CacheKey,
}

/// One stage of the resolution chain
#[async_trait]
pub trait Resolver: Send + Sync {
    fn tier(&self) -> Tier;

    /// Canonical-unit value, or `None` on a miss
    async fn try_get(&self, lookup: &Lookup) -> Result<Option<WeatherPayload>>;

    /// Keep a copy of a value produced by a later tier
    async fn write_back(&self, _lookup: &Lookup, _value: &WeatherPayload) -> Result<()> {
        Ok(())
    }
}

pub struct CacheResolver {
    cache: CacheStore,
}

#[async_trait]
impl Resolver for CacheResolver {
    fn tier(&self) -> Tier {
        Tier::Cache
    }

    async fn try_get(&self, lookup: &Lookup) -> Result<Option<WeatherPayload>> {
        Ok(self.cache.get(&lookup.key, Units::CANONICAL).await?)
    }

    async fn write_back(&self, lookup: &Lookup, value: &WeatherPayload) -> Result<()> {
        Ok(self.cache.set(&lookup.key, value).await?)
    }
}

/// Answers historical queries for tracked cities only
pub struct StoreResolver {
    history: HistoricalStore,
}

#[async_trait]
impl Resolver for StoreResolver {
    fn tier(&self) -> Tier {
        Tier::Store
    }

    async fn try_get(&self, lookup: &Lookup) -> Result<Option<WeatherPayload>> {
        let Query::Historical { date } = lookup.query else {
            return Ok(None);
        };
        let reading = self
            .history
            .get(&lookup.city.key, date, Units::CANONICAL)
            .await?;
        Ok(reading.map(WeatherPayload::from))
    }

    async fn write_back(&self, lookup: &Lookup, value: &WeatherPayload) -> Result<()> {
        if let (Query::Historical { .. }, Some(reading)) = (lookup.query, value.as_reading()) {
            self.history.store(&lookup.city.key, reading).await?;
        }
        Ok(())
    }
}

pub struct UpstreamResolver {
    provider: Arc<dyn WeatherProvider>,
}

#[async_trait]
impl Resolver for UpstreamResolver {
    fn tier(&self) -> Tier {
        Tier::Upstream
    }

    async fn try_get(&self, lookup: &Lookup) -> Result<Option<WeatherPayload>> {
        let at = lookup.city.coordinates;
        let units = Units::CANONICAL;
        let payload: WeatherPayload = match lookup.query {
            Query::Current => self.provider.get_current(at, units).await?.into(),
            Query::Historical { date } => self.provider.get_historical(at, date, units).await?.into(),
            Query::Forecast { date } => self.provider.get_forecast(at, date, units).await?.into(),
            Query::Stats { start, end } => {
                self.provider.get_stats(at, start, end, units).await?.into()
            }
        };
        Ok(Some(payload.without_meta().to_units(units)))
    }
}

/// Entry point for every weather read and the admin operations on the tiers
pub struct WeatherService {
    gazetteer: Arc<dyn Gazetteer>,
    cache: CacheStore,
    history: HistoricalStore,
    provider: Arc<dyn WeatherProvider>,
    clock: Arc<dyn Clock>,
    chain: Vec<Box<dyn Resolver>>,
}

impl WeatherService {
    pub fn new(
        gazetteer: Arc<dyn Gazetteer>,
        cache: CacheStore,
        history: HistoricalStore,
        provider: Arc<dyn WeatherProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let chain: Vec<Box<dyn Resolver>> = vec![
            Box::new(CacheResolver {
                cache: cache.clone(),
            }),
            Box::new(StoreResolver {
                history: history.clone(),
            }),
            Box::new(UpstreamResolver {
                provider: Arc::clone(&provider),
            }),
        ];
        Self {
            gazetteer,
            cache,
            history,
            provider,
            clock,
            chain,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn history(&self) -> &HistoricalStore {
        &self.history
    }

    pub fn provider(&self) -> &Arc<dyn WeatherProvider> {
        &self.provider
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn gazetteer(&self) -> &Arc<dyn Gazetteer> {
        &self.gazetteer
    }

    /// Gazetteer entry for a key or city name
    pub fn city(&self, city: &str) -> Result<City> {
        self.gazetteer
            .lookup(city)
            .ok_or_else(|| WeatherError::city_not_found(city))
    }

    /// Reject dates outside the window the data kind allows
    pub fn validate(&self, query: &Query) -> Result<()> {
        let today = self.clock.today();
        let yesterday = today - Duration::days(1);
        let limits = self.provider.limits();
        let horizon = today + Duration::days(limits.forecast_horizon_days);

        match *query {
            Query::Current => Ok(()),
            Query::Historical { date } => {
                if date < limits.historical_floor || date > yesterday {
                    return Err(WeatherError::validation(format!(
                        "historical date must be between {} and {yesterday}",
                        limits.historical_floor
                    )));
                }
                Ok(())
            }
            Query::Forecast { date } => {
                let tomorrow = today + Duration::days(1);
                if date < tomorrow || date > horizon {
                    return Err(WeatherError::validation(format!(
                        "forecast date must be between {tomorrow} and {horizon}"
                    )));
                }
                Ok(())
            }
            Query::Stats { start, end } => {
                if start > end {
                    return Err(WeatherError::validation_with_code(
                        "INVALID_DATE_RANGE",
                        "start_date must not be after end_date",
                    ));
                }
                if start < limits.historical_floor || end > yesterday {
                    return Err(WeatherError::validation(format!(
                        "statistics range must lie between {} and {yesterday}",
                        limits.historical_floor
                    )));
                }
                Ok(())
            }
        }
    }

    /// Resolve one request through the tier chain.
    ///
    /// Cache and store failures count as misses. An upstream failure is
    /// returned unchanged and nothing is written.
    #[instrument(skip(self), fields(kind = %query.kind()))]
    pub async fn resolve(&self, city: &str, query: Query, units: Units) -> Result<WeatherPayload> {
        self.validate(&query)?;
        let city = self.city(city)?;
        let key = query.cache_key(&city.key, self.clock.today());
        let lookup = Lookup { city, query, key };

        for (position, resolver) in self.chain.iter().enumerate() {
            let tier = resolver.tier();
            let value = match resolver.try_get(&lookup).await {
                Ok(Some(value)) => value,
                Ok(None) => {
                    debug!(%tier, "Miss");
                    continue;
                }
                Err(e) if tier == Tier::Upstream => return Err(e),
                Err(e) => {
                    warn!(%tier, error = %e, "Tier lookup failed, treating as miss");
                    continue;
                }
            };

            debug!(%tier, "Hit");
            for earlier in &self.chain[..position] {
                if let Err(e) = earlier.write_back(&lookup, &value).await {
                    warn!(tier = %earlier.tier(), error = %e, "Write-back failed");
                }
            }

            let meta = WeatherMeta::new(tier, self.provider.name(), query.kind());
            return Ok(value.to_units(units).with_meta(meta));
        }

        Err(WeatherError::not_found(format!(
            "no tier produced {} data for {}",
            query.kind(),
            lookup.city.key
        )))
    }

    /// Drop every cache entry of a city
    pub async fn purge_city(&self, city: &str) -> Result<PurgeResult> {
        let key = self.city_key(city);
        Ok(self.cache.clear_city(&key).await?)
    }

    /// Drop every historical record of a city
    pub async fn purge_history(&self, city: &str) -> Result<usize> {
        let key = self.city_key(city);
        Ok(self.history.clear_city(&key).await?)
    }

    pub async fn cache_stats(&self) -> Result<CacheStats> {
        Ok(self.cache.stats().await?)
    }

    pub async fn store_stats(&self) -> StoreStats {
        self.history.stats().await
    }

    /// Gazetteer key when known, otherwise the normalised input
    pub fn city_key(&self, city: &str) -> String {
        self.gazetteer
            .lookup(city)
            .map_or_else(|| city.trim().to_lowercase(), |c| c.key)
    }
}
