//! Shared harness: a scripted provider and a service over a temporary database

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;
use tiered_weather::models::{
    CloudCover, Humidity, Precipitation, PrecipitationStats, Pressure, Temperature,
    TemperatureStats, Wind, WindMax, WindStats,
};
use tiered_weather::{
    BackfillService, CacheStore, Clock, Coordinates, DataKind, FixedClock, HistoricalStore,
    ProviderLimits, Reading, StaticGazetteer, Statistics, TtlPolicy, Units, WeatherError,
    WeatherGatewayConfig, WeatherProvider, WeatherService,
};

pub const PROVIDER: &str = "MockMeteo";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

pub fn days_ago(days: i64) -> NaiveDate {
    today() - chrono::Duration::days(days)
}

/// A day of London weather in standard units
pub fn sample_reading(coordinates: Coordinates, date: NaiveDate) -> Reading {
    Reading {
        lat: coordinates.lat,
        lon: coordinates.lon,
        date,
        units: Units::Standard,
        cloud_cover: CloudCover { afternoon: 40 },
        humidity: Humidity { afternoon: 71 },
        precipitation: Precipitation { total: 1.2 },
        temperature: Temperature {
            min: 280.15,
            max: 291.15,
            afternoon: 289.65,
            night: 281.15,
            evening: 287.15,
            morning: 283.15,
        },
        pressure: Pressure { afternoon: 1013.2 },
        wind: Wind {
            max: WindMax {
                speed: 4.0,
                direction: 240,
            },
        },
        meta: None,
    }
}

pub fn sample_stats(coordinates: Coordinates, start: NaiveDate, end: NaiveDate) -> Statistics {
    Statistics {
        lat: coordinates.lat,
        lon: coordinates.lon,
        start_date: start,
        end_date: end,
        units: Units::Standard,
        temperature: TemperatureStats {
            min: 275.15,
            max: 295.15,
            average: 285.15,
        },
        precipitation: PrecipitationStats {
            total: 12.5,
            days_with_precipitation: 4,
        },
        wind: WindStats {
            average_speed: 4.0,
            max_speed: 10.0,
        },
        meta: None,
    }
}

/// Provider that answers from fixed samples, records every call and fails
/// on request for chosen dates
#[derive(Default)]
pub struct MockProvider {
    calls: Mutex<Vec<(DataKind, Option<NaiveDate>)>>,
    failing: Mutex<HashSet<NaiveDate>>,
    not_found: Mutex<HashSet<NaiveDate>>,
    latency: Mutex<Option<Duration>>,
}

impl MockProvider {
    pub fn fail_on(&self, date: NaiveDate) {
        self.failing.lock().unwrap().insert(date);
    }

    pub fn missing_on(&self, date: NaiveDate) {
        self.not_found.lock().unwrap().insert(date);
    }

    /// Delay every answer by `latency`
    pub fn respond_after(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self) -> Vec<(DataKind, Option<NaiveDate>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn was_called_for(&self, date: NaiveDate) -> bool {
        self.calls().iter().any(|(_, d)| *d == Some(date))
    }

    async fn record(&self, kind: DataKind, date: Option<NaiveDate>) -> tiered_weather::Result<()> {
        self.calls.lock().unwrap().push((kind, date));
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(date) = date {
            if self.failing.lock().unwrap().contains(&date) {
                return Err(WeatherError::provider(format!("upstream timeout for {date}")));
            }
            if self.not_found.lock().unwrap().contains(&date) {
                return Err(WeatherError::not_found(format!("no data for {date}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WeatherProvider for MockProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn limits(&self) -> ProviderLimits {
        ProviderLimits {
            historical_floor: NaiveDate::from_ymd_opt(1979, 1, 2).unwrap(),
            forecast_horizon_days: 7,
        }
    }

    async fn get_current(
        &self,
        coordinates: Coordinates,
        units: Units,
    ) -> tiered_weather::Result<Reading> {
        self.record(DataKind::Current, None).await?;
        Ok(sample_reading(coordinates, today()).to_units(units))
    }

    async fn get_historical(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        units: Units,
    ) -> tiered_weather::Result<Reading> {
        self.record(DataKind::Historical, Some(date)).await?;
        Ok(sample_reading(coordinates, date).to_units(units))
    }

    async fn get_forecast(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        units: Units,
    ) -> tiered_weather::Result<Reading> {
        self.record(DataKind::Forecast, Some(date)).await?;
        Ok(sample_reading(coordinates, date).to_units(units))
    }

    async fn get_stats(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
        units: Units,
    ) -> tiered_weather::Result<Statistics> {
        self.record(DataKind::Stats, Some(start)).await?;
        Ok(sample_stats(coordinates, start, end).to_units(units))
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub config: WeatherGatewayConfig,
    pub provider: Arc<MockProvider>,
    pub service: Arc<WeatherService>,
    pub backfill: BackfillService,
}

pub fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let db = fjall::Database::builder(dir.path()).open().unwrap();
    let config = WeatherGatewayConfig::default();

    let clock: Arc<dyn Clock> = Arc::new(FixedClock(today()));
    let provider = Arc::new(MockProvider::default());
    let cache = CacheStore::open(&db, TtlPolicy::default(), Arc::clone(&clock), PROVIDER).unwrap();
    let history = HistoricalStore::open(&db, config.history.tracked_cities.clone()).unwrap();

    let service = Arc::new(WeatherService::new(
        Arc::new(StaticGazetteer),
        cache,
        history,
        provider.clone(),
        clock,
    ));
    let backfill = BackfillService::new(&service, config.backfill.max_days_back);

    Harness {
        dir,
        config,
        provider,
        service,
        backfill,
    }
}
