//! `TieredWeather` - weather gateway with a cache, a historical store and an
//! upstream fallback
//!
//! Requests are answered by the first tier that has the data. Everything the
//! tiers keep is stored in canonical (standard) units and converted to the
//! caller's unit system on the way out.

pub mod api;
pub mod backfill;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gazetteer;
pub mod history;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod units;
pub mod web;

// Re-export core types for public API
pub use backfill::{BackfillManifest, BackfillService, DateOutcome, OutcomeStatus};
pub use cache::{CacheKey, CacheStats, CacheStore, PurgeResult, TtlPolicy};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::WeatherGatewayConfig;
pub use error::WeatherError;
pub use gazetteer::{Gazetteer, StaticGazetteer};
pub use history::{CityCoverage, HistoricalStore, StoreStats, StoreStatus};
pub use models::{City, Coordinates, DataKind, Reading, Statistics, Tier, WeatherMeta, WeatherPayload};
pub use provider::{OpenMeteoProvider, ProviderLimits, WeatherProvider};
pub use resolver::{Query, WeatherService};
pub use units::Units;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
