//! Upstream weather providers
//!
//! The resolution pipeline only calls a provider after both local tiers
//! missed. Providers do not retry; a failure is reported as either
//! [`WeatherError::NotFound`](crate::WeatherError::NotFound) or
//! [`WeatherError::Provider`](crate::WeatherError::Provider).

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::Result;
use crate::models::{Coordinates, Reading, Statistics};
use crate::units::Units;

pub mod open_meteo;

pub use open_meteo::OpenMeteoProvider;

/// Date range a provider can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderLimits {
    /// Earliest date with historical data
    pub historical_floor: NaiveDate,
    /// Furthest day ahead a forecast is available for
    pub forecast_horizon_days: i64,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Name reported in response provenance
    fn name(&self) -> &str;

    fn limits(&self) -> ProviderLimits;

    async fn get_current(&self, coordinates: Coordinates, units: Units) -> Result<Reading>;

    async fn get_historical(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        units: Units,
    ) -> Result<Reading>;

    async fn get_forecast(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        units: Units,
    ) -> Result<Reading>;

    async fn get_stats(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
        units: Units,
    ) -> Result<Statistics>;
}
