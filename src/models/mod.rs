//! Data models for the weather gateway
//!
//! - Location: coordinates and gazetteer entries
//! - Weather: readings, statistics and the payload sum type
//! - Meta: data kinds, tiers and response provenance

pub mod location;
pub mod meta;
pub mod weather;

// Re-export all public types for convenient access
pub use location::{City, Coordinates};
pub use meta::{DataKind, Tier, WeatherMeta};
pub use weather::{
    CloudCover, Humidity, Precipitation, PrecipitationStats, Pressure, Reading, Statistics,
    Temperature, TemperatureStats, WeatherPayload, Wind, WindMax, WindStats,
};
