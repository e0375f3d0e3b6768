//! Provenance metadata attached to values handed to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical kind of weather data; determines TTL and which tiers apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Current,
    Historical,
    Forecast,
    Stats,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::Current,
        DataKind::Historical,
        DataKind::Forecast,
        DataKind::Stats,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Current => "current",
            DataKind::Historical => "historical",
            DataKind::Forecast => "forecast",
            DataKind::Stats => "stats",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution tier that served a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cache,
    Store,
    Upstream,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Cache => "cache",
            Tier::Store => "store",
            Tier::Upstream => "upstream",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response-only annotation. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherMeta {
    /// Whether the value came out of the cache tier
    pub cached: bool,
    /// Tier that satisfied the request
    pub tier: Tier,
    /// Upstream provider the data originates from
    pub provider: String,
    pub data_type: DataKind,
    /// Time the value was handed off
    pub served_at: DateTime<Utc>,
}

impl WeatherMeta {
    #[must_use]
    pub fn new(tier: Tier, provider: &str, data_type: DataKind) -> Self {
        Self {
            cached: tier == Tier::Cache,
            tier,
            provider: provider.to_string(),
            data_type,
            served_at: Utc::now(),
        }
    }
}
