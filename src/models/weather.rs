//! Weather readings, aggregated statistics and their unit conversion

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::meta::{DataKind, WeatherMeta};
use crate::units::{Quantity, Units, convert};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudCover {
    /// Cloud cover percentage at 12:00
    pub afternoon: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Humidity {
    /// Relative humidity percentage at 12:00
    pub afternoon: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    /// Total precipitation in mm
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    /// Sea level pressure in hPa at 12:00
    pub afternoon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub min: f64,
    pub max: f64,
    /// 12:00
    pub afternoon: f64,
    /// 00:00
    pub night: f64,
    /// 18:00
    pub evening: f64,
    /// 06:00
    pub morning: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindMax {
    pub speed: f64,
    /// Direction in degrees (0-360)
    pub direction: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub max: WindMax,
}

/// One weather observation or forecast point for a day.
///
/// Every numeric field is encoded in `units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
    pub units: Units,
    pub cloud_cover: CloudCover,
    pub humidity: Humidity,
    pub precipitation: Precipitation,
    pub temperature: Temperature,
    pub pressure: Pressure,
    pub wind: Wind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<WeatherMeta>,
}

impl Reading {
    /// Re-encode temperature and wind fields in `target` units.
    #[must_use]
    pub fn to_units(mut self, target: Units) -> Self {
        if self.units == target {
            return self;
        }
        let from = self.units;
        let temp = |v: f64| convert(v, from, target, Quantity::Temperature);

        let t = &mut self.temperature;
        t.min = temp(t.min);
        t.max = temp(t.max);
        t.afternoon = temp(t.afternoon);
        t.night = temp(t.night);
        t.evening = temp(t.evening);
        t.morning = temp(t.morning);
        self.wind.max.speed = convert(self.wind.max.speed, from, target, Quantity::WindSpeed);
        self.units = target;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecipitationStats {
    /// Total precipitation in mm
    pub total: f64,
    pub days_with_precipitation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindStats {
    pub average_speed: f64,
    pub max_speed: f64,
}

/// Aggregate over a date range for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub lat: f64,
    pub lon: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub units: Units,
    pub temperature: TemperatureStats,
    pub precipitation: PrecipitationStats,
    pub wind: WindStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<WeatherMeta>,
}

impl Statistics {
    #[must_use]
    pub fn to_units(mut self, target: Units) -> Self {
        if self.units == target {
            return self;
        }
        let from = self.units;
        let temp = |v: f64| convert(v, from, target, Quantity::Temperature);
        let wind = |v: f64| convert(v, from, target, Quantity::WindSpeed);

        self.temperature.min = temp(self.temperature.min);
        self.temperature.max = temp(self.temperature.max);
        self.temperature.average = temp(self.temperature.average);
        self.wind.average_speed = wind(self.wind.average_speed);
        self.wind.max_speed = wind(self.wind.max_speed);
        self.units = target;
        self
    }
}

/// A value produced by the resolution pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WeatherPayload {
    Reading(Reading),
    Stats(Statistics),
}

impl WeatherPayload {
    #[must_use]
    pub fn units(&self) -> Units {
        match self {
            WeatherPayload::Reading(r) => r.units,
            WeatherPayload::Stats(s) => s.units,
        }
    }

    #[must_use]
    pub fn to_units(self, target: Units) -> Self {
        match self {
            WeatherPayload::Reading(r) => WeatherPayload::Reading(r.to_units(target)),
            WeatherPayload::Stats(s) => WeatherPayload::Stats(s.to_units(target)),
        }
    }

    #[must_use]
    pub fn meta(&self) -> Option<&WeatherMeta> {
        match self {
            WeatherPayload::Reading(r) => r.meta.as_ref(),
            WeatherPayload::Stats(s) => s.meta.as_ref(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: WeatherMeta) -> Self {
        match &mut self {
            WeatherPayload::Reading(r) => r.meta = Some(meta),
            WeatherPayload::Stats(s) => s.meta = Some(meta),
        }
        self
    }

    #[must_use]
    pub fn without_meta(mut self) -> Self {
        match &mut self {
            WeatherPayload::Reading(r) => r.meta = None,
            WeatherPayload::Stats(s) => s.meta = None,
        }
        self
    }

    /// Whether this variant is the one stored under `kind`
    #[must_use]
    pub fn matches_kind(&self, kind: DataKind) -> bool {
        matches!(
            (self, kind),
            (WeatherPayload::Stats(_), DataKind::Stats)
                | (
                    WeatherPayload::Reading(_),
                    DataKind::Current | DataKind::Historical | DataKind::Forecast
                )
        )
    }

    /// Encode as the canonical JSON blob stored in the cache tier
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            WeatherPayload::Reading(r) => serde_json::to_string(r),
            WeatherPayload::Stats(s) => serde_json::to_string(s),
        }
    }

    /// Decode a JSON blob stored under `kind`
    pub fn from_json(kind: DataKind, json: &str) -> serde_json::Result<Self> {
        match kind {
            DataKind::Stats => serde_json::from_str(json).map(WeatherPayload::Stats),
            _ => serde_json::from_str(json).map(WeatherPayload::Reading),
        }
    }

    #[must_use]
    pub fn as_reading(&self) -> Option<&Reading> {
        match self {
            WeatherPayload::Reading(r) => Some(r),
            WeatherPayload::Stats(_) => None,
        }
    }

    #[must_use]
    pub fn as_stats(&self) -> Option<&Statistics> {
        match self {
            WeatherPayload::Stats(s) => Some(s),
            WeatherPayload::Reading(_) => None,
        }
    }
}

impl From<Reading> for WeatherPayload {
    fn from(reading: Reading) -> Self {
        WeatherPayload::Reading(reading)
    }
}

impl From<Statistics> for WeatherPayload {
    fn from(stats: Statistics) -> Self {
        WeatherPayload::Stats(stats)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn reading(date: NaiveDate) -> Reading {
        Reading {
            lat: 51.5074,
            lon: -0.1278,
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

    pub fn stats(start: NaiveDate, end: NaiveDate) -> Statistics {
        Statistics {
            lat: 51.5074,
            lon: -0.1278,
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
}
