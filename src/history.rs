//! Durable per-day history for a fixed set of tracked cities.
//!
//! Records live in their own fjall keyspace under `{city}|{YYYY-MM-DD}` so a
//! prefix scan over one city yields its days in date order. Every record is
//! stored in canonical units.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task;

use crate::models::{
    CloudCover, Humidity, Precipitation, Pressure, Reading, Temperature, Wind, WindMax,
};
use crate::units::Units;

const KEYSPACE: &str = "historical_weather";
const SEPARATOR: char = '|';

/// One stored day, flattened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub city_key: String,
    pub date: NaiveDate,
    pub lat: f64,
    pub lon: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub temperature_afternoon: f64,
    pub temperature_night: f64,
    pub temperature_evening: f64,
    pub temperature_morning: f64,
    pub precipitation_total: f64,
    pub wind_speed: f64,
    pub wind_direction: u16,
    pub cloud_cover: u8,
    pub humidity: u8,
    pub pressure: f64,
    pub last_updated: DateTime<Utc>,
}

impl HistoricalRecord {
    fn from_reading(city_key: &str, reading: &Reading) -> Self {
        let reading = reading.clone().to_units(Units::CANONICAL);
        let t = &reading.temperature;
        Self {
            city_key: city_key.to_string(),
            date: reading.date,
            lat: reading.lat,
            lon: reading.lon,
            temperature_min: t.min,
            temperature_max: t.max,
            temperature_afternoon: t.afternoon,
            temperature_night: t.night,
            temperature_evening: t.evening,
            temperature_morning: t.morning,
            precipitation_total: reading.precipitation.total,
            wind_speed: reading.wind.max.speed,
            wind_direction: reading.wind.max.direction,
            cloud_cover: reading.cloud_cover.afternoon,
            humidity: reading.humidity.afternoon,
            pressure: reading.pressure.afternoon,
            last_updated: Utc::now(),
        }
    }

    /// Rebuild the canonical-unit reading
    #[must_use]
    pub fn into_reading(self) -> Reading {
        Reading {
            lat: self.lat,
            lon: self.lon,
            date: self.date,
            units: Units::CANONICAL,
            cloud_cover: CloudCover {
                afternoon: self.cloud_cover,
            },
            humidity: Humidity {
                afternoon: self.humidity,
            },
            precipitation: Precipitation {
                total: self.precipitation_total,
            },
            temperature: Temperature {
                min: self.temperature_min,
                max: self.temperature_max,
                afternoon: self.temperature_afternoon,
                night: self.temperature_night,
                evening: self.temperature_evening,
                morning: self.temperature_morning,
            },
            pressure: Pressure {
                afternoon: self.pressure,
            },
            wind: Wind {
                max: WindMax {
                    speed: self.wind_speed,
                    direction: self.wind_direction,
                },
            },
            meta: None,
        }
    }
}

/// Stored date span of one city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityCoverage {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub total_days_in_span: i64,
    pub actual_record_count: usize,
    pub missing_days: i64,
    pub coverage_percent: f64,
}

impl CityCoverage {
    fn new(first_date: NaiveDate, last_date: NaiveDate, actual_record_count: usize) -> Self {
        let total_days_in_span = (last_date - first_date).num_days() + 1;
        let coverage_percent =
            (actual_record_count as f64 / total_days_in_span as f64 * 10000.0).round() / 100.0;
        Self {
            first_date,
            last_date,
            total_days_in_span,
            actual_record_count,
            missing_days: total_days_in_span - actual_record_count as i64,
            coverage_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Operational,
    Error,
}

/// Aggregate view of the historical store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub status: StoreStatus,
    pub total_records: usize,
    pub earliest_record: Option<NaiveDate>,
    pub latest_record: Option<NaiveDate>,
    pub records_by_city: BTreeMap<String, usize>,
    pub cities_tracked: Vec<String>,
    pub date_coverage: BTreeMap<String, CityCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreStats {
    fn failed(cities_tracked: Vec<String>, error: String) -> Self {
        Self {
            status: StoreStatus::Error,
            total_records: 0,
            earliest_record: None,
            latest_record: None,
            records_by_city: BTreeMap::new(),
            cities_tracked,
            date_coverage: BTreeMap::new(),
            error: Some(error),
        }
    }
}

fn record_key(city: &str, date: NaiveDate) -> Vec<u8> {
    format!("{city}{SEPARATOR}{}", date.format("%Y-%m-%d")).into_bytes()
}

fn city_prefix(city: &str) -> Vec<u8> {
    format!("{city}{SEPARATOR}").into_bytes()
}

/// Historical tier. Cheap to clone.
#[derive(Clone)]
pub struct HistoricalStore {
    records: Keyspace,
    tracked: Arc<BTreeSet<String>>,
}

impl HistoricalStore {
    pub fn open<I, S>(db: &Database, tracked: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = db.keyspace(KEYSPACE, KeyspaceCreateOptions::default)?;
        Ok(Self {
            records,
            tracked: Arc::new(tracked.into_iter().map(Into::into).collect()),
        })
    }

    #[must_use]
    pub fn is_tracked(&self, city: &str) -> bool {
        self.tracked.contains(city)
    }

    /// Stored reading for `city` on `date` in `units`. Untracked cities are
    /// answered without touching the keyspace.
    #[tracing::instrument(name = "query_history", level = "debug", skip(self))]
    pub async fn get(&self, city: &str, date: NaiveDate, units: Units) -> Result<Option<Reading>> {
        if !self.is_tracked(city) {
            return Ok(None);
        }
        let records = self.records.clone();
        let key = record_key(city, date);
        let bytes = task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
            Ok(records.get(key)?.map(|v| v.to_vec()))
        })
        .await??;

        match bytes {
            Some(bytes) => {
                let record: HistoricalRecord = serde_json::from_slice(&bytes)?;
                Ok(Some(record.into_reading().to_units(units)))
            }
            None => Ok(None),
        }
    }

    /// Whether a record exists, without decoding it
    pub async fn contains(&self, city: &str, date: NaiveDate) -> Result<bool> {
        if !self.is_tracked(city) {
            return Ok(false);
        }
        let records = self.records.clone();
        let key = record_key(city, date);
        Ok(task::spawn_blocking(move || records.contains_key(key)).await??)
    }

    /// Upsert the reading for its date. Returns `false` when `city` is not
    /// tracked and nothing was written.
    #[tracing::instrument(name = "put_history", level = "debug", skip(self, reading), fields(date = %reading.date))]
    pub async fn store(&self, city: &str, reading: &Reading) -> Result<bool> {
        if !self.is_tracked(city) {
            tracing::debug!("City not tracked, dropping write");
            return Ok(false);
        }
        let record = HistoricalRecord::from_reading(city, reading);
        let key = record_key(city, record.date);
        let bytes = serde_json::to_vec(&record)?;

        let records = self.records.clone();
        task::spawn_blocking(move || records.insert(key, bytes)).await??;
        Ok(true)
    }

    /// Delete every record of `city`
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn clear_city(&self, city: &str) -> Result<usize> {
        let records = self.records.clone();
        let prefix = city_prefix(city);
        let removed = task::spawn_blocking(move || -> Result<usize> {
            let mut keys = Vec::new();
            for guard in records.prefix(prefix) {
                let (key, _) = guard.into_inner()?;
                keys.push(key.to_vec());
            }
            let removed = keys.len();
            for key in keys {
                records.remove(key)?;
            }
            Ok(removed)
        })
        .await??;

        tracing::info!(records_removed = removed, "Historical records cleared");
        Ok(removed)
    }

    /// Per-city date span and gap count
    pub async fn coverage_stats(&self) -> Result<BTreeMap<String, CityCoverage>> {
        let days = self.scan_days().await?;
        Ok(days
            .into_iter()
            .filter_map(|(city, dates)| {
                let first = *dates.first()?;
                let last = *dates.last()?;
                Some((city, CityCoverage::new(first, last, dates.len())))
            })
            .collect())
    }

    /// Store-wide summary. A backend failure yields an `error` status instead
    /// of partial numbers.
    pub async fn stats(&self) -> StoreStats {
        let cities_tracked: Vec<String> = self.tracked.iter().cloned().collect();
        let days = match self.scan_days().await {
            Ok(days) => days,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to compute historical store stats");
                return StoreStats::failed(cities_tracked, format!("{e:#}"));
            }
        };

        let mut stats = StoreStats {
            status: StoreStatus::Operational,
            total_records: 0,
            earliest_record: None,
            latest_record: None,
            records_by_city: BTreeMap::new(),
            cities_tracked,
            date_coverage: BTreeMap::new(),
            error: None,
        };
        for (city, dates) in days {
            let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
                continue;
            };
            stats.total_records += dates.len();
            stats.earliest_record = Some(stats.earliest_record.map_or(first, |d| d.min(first)));
            stats.latest_record = Some(stats.latest_record.map_or(last, |d| d.max(last)));
            stats.records_by_city.insert(city.clone(), dates.len());
            stats
                .date_coverage
                .insert(city, CityCoverage::new(first, last, dates.len()));
        }
        stats
    }

    /// Stored dates of tracked cities, grouped by city, ascending
    async fn scan_days(&self) -> Result<BTreeMap<String, Vec<NaiveDate>>> {
        let records = self.records.clone();
        let tracked = Arc::clone(&self.tracked);
        task::spawn_blocking(move || -> Result<BTreeMap<String, Vec<NaiveDate>>> {
            let mut days: BTreeMap<String, Vec<NaiveDate>> = BTreeMap::new();
            for guard in records.iter() {
                let (key, _) = guard.into_inner()?;
                let key = String::from_utf8_lossy(&key).into_owned();
                let Some((city, date)) = key.rsplit_once(SEPARATOR) else {
                    continue;
                };
                // left over from a city no longer tracked
                if !tracked.contains(city) {
                    continue;
                }
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
                days.entry(city.to_string()).or_default().push(date);
            }
            Ok(days)
        })
        .await?
    }

    #[cfg(test)]
    async fn raw_record(&self, city: &str, date: NaiveDate) -> Result<Option<HistoricalRecord>> {
        let records = self.records.clone();
        let key = record_key(city, date);
        let bytes = task::spawn_blocking(move || records.get(key)).await??;
        Ok(bytes.map(|b| serde_json::from_slice(&b.to_vec())).transpose()?)
    }
}
