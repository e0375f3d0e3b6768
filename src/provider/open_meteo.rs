//! Open-Meteo client
//!
//! Point readings combine the daily aggregates with hourly samples at
//! 00/06/12/18 local time. Values arrive in Celsius and m/s and are
//! re-encoded in the units the caller asked for.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::{ProviderLimits, WeatherProvider};
use crate::config::UpstreamConfig;
use crate::models::{
    CloudCover, Coordinates, Humidity, Precipitation, PrecipitationStats, Pressure, Reading,
    Statistics, Temperature, TemperatureStats, Wind, WindMax, WindStats,
};
use crate::units::{Units, round2};
use crate::{Result, WeatherError};

const PROVIDER_NAME: &str = "OpenMeteo";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,wind_speed_10m_max,wind_direction_10m_dominant";
const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,cloud_cover,pressure_msl";
const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,cloud_cover,pressure_msl,wind_speed_10m,wind_direction_10m";
const SLOW_RESPONSE: Duration = Duration::from_secs(5);

// Used when the archive has no hourly sample for a day
const FALLBACK_CLOUD_COVER: u8 = 50;
const FALLBACK_HUMIDITY: u8 = 70;
const FALLBACK_PRESSURE: f64 = 1013.0;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<DailyData>,
    hourly: Option<HourlyData>,
    current: Option<CurrentData>,
}

#[derive(Debug, Deserialize)]
struct DailyData {
    time: Vec<NaiveDate>,
    #[serde(rename = "temperature_2m_max")]
    temperature_max: Vec<Option<f64>>,
    #[serde(rename = "temperature_2m_min")]
    temperature_min: Vec<Option<f64>>,
    #[serde(rename = "precipitation_sum")]
    precipitation: Vec<Option<f64>>,
    #[serde(rename = "wind_speed_10m_max")]
    wind_speed_max: Vec<Option<f64>>,
    #[serde(rename = "wind_direction_10m_dominant", default)]
    wind_direction: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct HourlyData {
    time: Vec<String>,
    #[serde(rename = "temperature_2m")]
    temperature: Vec<Option<f64>>,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Vec<Option<f64>>,
    cloud_cover: Vec<Option<f64>>,
    pressure_msl: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    #[serde(rename = "temperature_2m")]
    temperature: f64,
    #[serde(rename = "relative_humidity_2m")]
    humidity: f64,
    cloud_cover: f64,
    pressure_msl: f64,
    #[serde(rename = "wind_speed_10m")]
    wind_speed: f64,
    #[serde(rename = "wind_direction_10m")]
    wind_direction: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    reason: String,
}

fn percent(v: f64) -> u8 {
    v.round().clamp(0.0, 100.0) as u8
}

fn degrees(v: f64) -> u16 {
    (v.round() as i64).rem_euclid(360) as u16
}

fn daily_value(series: &[Option<f64>], idx: usize, field: &str, date: NaiveDate) -> Result<f64> {
    series
        .get(idx)
        .copied()
        .flatten()
        .ok_or_else(|| WeatherError::not_found(format!("no {field} for {date}")))
}

/// Hourly values at one point in time
#[derive(Debug, Default, Clone, Copy)]
struct Sample {
    temperature: Option<f64>,
    humidity: Option<f64>,
    cloud_cover: Option<f64>,
    pressure: Option<f64>,
}

impl HourlyData {
    fn sample_at(&self, date: NaiveDate, hour: u32) -> Sample {
        let stamp = format!("{}T{hour:02}:00", date.format("%Y-%m-%d"));
        let Some(idx) = self.time.iter().position(|t| *t == stamp) else {
            return Sample::default();
        };
        let value = |series: &[Option<f64>]| series.get(idx).copied().flatten();
        Sample {
            temperature: value(&self.temperature),
            humidity: value(&self.humidity),
            cloud_cover: value(&self.cloud_cover),
            pressure: value(&self.pressure_msl),
        }
    }
}

impl ForecastResponse {
    fn daily(&self) -> Result<&DailyData> {
        self.daily
            .as_ref()
            .ok_or_else(|| WeatherError::provider("response carries no daily data"))
    }

    /// Metric reading for one day of a daily+hourly response
    fn reading_for(&self, coordinates: Coordinates, date: NaiveDate) -> Result<Reading> {
        let daily = self.daily()?;
        let idx = daily
            .time
            .iter()
            .position(|d| *d == date)
            .ok_or_else(|| WeatherError::not_found(format!("no data for {date}")))?;

        let min = daily_value(&daily.temperature_min, idx, "minimum temperature", date)?;
        let max = daily_value(&daily.temperature_max, idx, "maximum temperature", date)?;
        let midpoint = (min + max) / 2.0;

        let at = |hour: u32| {
            self.hourly
                .as_ref()
                .map(|h| h.sample_at(date, hour))
                .unwrap_or_default()
        };
        let (night, morning, noon, evening) = (at(0), at(6), at(12), at(18));

        Ok(Reading {
            lat: coordinates.lat,
            lon: coordinates.lon,
            date,
            units: Units::Metric,
            cloud_cover: CloudCover {
                afternoon: noon.cloud_cover.map_or(FALLBACK_CLOUD_COVER, percent),
            },
            humidity: Humidity {
                afternoon: noon.humidity.map_or(FALLBACK_HUMIDITY, percent),
            },
            precipitation: Precipitation {
                total: daily_value(&daily.precipitation, idx, "precipitation", date)?,
            },
            temperature: Temperature {
                min,
                max,
                afternoon: noon.temperature.unwrap_or(midpoint),
                night: night.temperature.unwrap_or(min),
                evening: evening.temperature.unwrap_or(midpoint),
                morning: morning.temperature.unwrap_or(midpoint),
            },
            pressure: Pressure {
                afternoon: noon.pressure.unwrap_or(FALLBACK_PRESSURE),
            },
            wind: Wind {
                max: WindMax {
                    speed: daily_value(&daily.wind_speed_max, idx, "wind speed", date)?,
                    direction: Self::direction(daily, idx),
                },
            },
            meta: None,
        })
    }

    fn direction(daily: &DailyData, idx: usize) -> u16 {
        daily
            .wind_direction
            .get(idx)
            .copied()
            .flatten()
            .map_or(0, degrees)
    }

    fn current_reading(&self, coordinates: Coordinates) -> Result<Reading> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| WeatherError::provider("response carries no current data"))?;
        let daily = self.daily()?;
        let date = *daily
            .time
            .first()
            .ok_or_else(|| WeatherError::provider("response carries no daily rows"))?;

        let temp = current.temperature;
        Ok(Reading {
            lat: coordinates.lat,
            lon: coordinates.lon,
            date,
            units: Units::Metric,
            cloud_cover: CloudCover {
                afternoon: percent(current.cloud_cover),
            },
            humidity: Humidity {
                afternoon: percent(current.humidity),
            },
            precipitation: Precipitation {
                total: daily_value(&daily.precipitation, 0, "precipitation", date)?,
            },
            temperature: Temperature {
                min: daily_value(&daily.temperature_min, 0, "minimum temperature", date)?,
                max: daily_value(&daily.temperature_max, 0, "maximum temperature", date)?,
                afternoon: temp,
                night: temp,
                evening: temp,
                morning: temp,
            },
            pressure: Pressure {
                afternoon: current.pressure_msl,
            },
            wind: Wind {
                max: WindMax {
                    speed: current.wind_speed,
                    direction: degrees(current.wind_direction),
                },
            },
            meta: None,
        })
    }

    /// Metric aggregate over every day of a daily response
    fn statistics(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Statistics> {
        let daily = self.daily()?;
        let present = |series: &[Option<f64>]| -> Vec<f64> { series.iter().flatten().copied().collect() };

        let mins = present(&daily.temperature_min);
        let maxs = present(&daily.temperature_max);
        let precipitation = present(&daily.precipitation);
        let winds = present(&daily.wind_speed_max);
        if mins.is_empty() || maxs.is_empty() || winds.is_empty() {
            return Err(WeatherError::not_found(format!(
                "no data between {start} and {end}"
            )));
        }

        let fold_min = |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min);
        let fold_max = |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum = |v: &[f64]| v.iter().sum::<f64>();

        Ok(Statistics {
            lat: coordinates.lat,
            lon: coordinates.lon,
            start_date: start,
            end_date: end,
            units: Units::Metric,
            temperature: TemperatureStats {
                min: fold_min(&mins),
                max: fold_max(&maxs),
                average: round2((sum(&mins) + sum(&maxs)) / (mins.len() + maxs.len()) as f64),
            },
            precipitation: PrecipitationStats {
                total: round2(sum(&precipitation)),
                days_with_precipitation: precipitation.iter().filter(|p| **p > 0.0).count()
                    as u32,
            },
            wind: WindStats {
                average_speed: round2(sum(&winds) / winds.len() as f64),
                max_speed: fold_max(&winds),
            },
            meta: None,
        })
    }
}

/// Open-Meteo forecast and historical-forecast endpoints
pub struct OpenMeteoProvider {
    client: Client,
    forecast_url: String,
    historical_url: String,
    limits: ProviderLimits,
}

impl OpenMeteoProvider {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Self::with_urls(
            &config.forecast_url,
            &config.historical_url,
            ProviderLimits {
                historical_floor: config.historical_floor,
                forecast_horizon_days: i64::from(config.forecast_horizon_days),
            },
            config.timeout(),
        )
    }

    pub fn with_urls(
        forecast_url: &str,
        historical_url: &str,
        limits: ProviderLimits,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tiered-weather/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeatherError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            forecast_url: forecast_url.trim_end_matches('/').to_string(),
            historical_url: historical_url.trim_end_matches('/').to_string(),
            limits,
        })
    }

    fn day_url(base: &str, coordinates: Coordinates, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{base}?latitude={}&longitude={}&start_date={}&end_date={}&daily={DAILY_FIELDS}&hourly={HOURLY_FIELDS}&timezone=auto&wind_speed_unit=ms",
            coordinates.lat,
            coordinates.lon,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        )
    }

    #[instrument(skip(self, url))]
    async fn fetch(&self, url: &str) -> Result<ForecastResponse> {
        debug!("Open-Meteo request URL: {url}");
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WeatherError::provider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.reason)
                .unwrap_or(body);
            warn!(%status, %reason, "Open-Meteo request failed");
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => WeatherError::not_found(reason),
                _ => WeatherError::provider(format!("HTTP {status}: {reason}")),
            });
        }

        let parsed = response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| WeatherError::provider(format!("invalid response body: {e}")))?;

        let elapsed = started.elapsed();
        if elapsed > SLOW_RESPONSE {
            warn!("Slow Open-Meteo response: {:.3}s", elapsed.as_secs_f64());
        } else {
            debug!("Open-Meteo responded in {:.3}s", elapsed.as_secs_f64());
        }
        Ok(parsed)
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn limits(&self) -> ProviderLimits {
        self.limits
    }

    async fn get_current(&self, coordinates: Coordinates, units: Units) -> Result<Reading> {
        let url = format!(
            "{}?latitude={}&longitude={}&current={CURRENT_FIELDS}&daily={DAILY_FIELDS}&timezone=auto&forecast_days=1&wind_speed_unit=ms",
            self.forecast_url, coordinates.lat, coordinates.lon,
        );
        let response = self.fetch(&url).await?;
        Ok(response.current_reading(coordinates)?.to_units(units))
    }

    async fn get_historical(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        units: Units,
    ) -> Result<Reading> {
        let url = Self::day_url(&self.historical_url, coordinates, date, date);
        let response = self.fetch(&url).await?;
        Ok(response.reading_for(coordinates, date)?.to_units(units))
    }

    async fn get_forecast(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        units: Units,
    ) -> Result<Reading> {
        let url = Self::day_url(&self.forecast_url, coordinates, date, date);
        let response = self.fetch(&url).await?;
        Ok(response.reading_for(coordinates, date)?.to_units(units))
    }

    async fn get_stats(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
        units: Units,
    ) -> Result<Statistics> {
        let url = format!(
            "{}?latitude={}&longitude={}&start_date={}&end_date={}&daily={DAILY_FIELDS}&timezone=auto&wind_speed_unit=ms",
            self.historical_url,
            coordinates.lat,
            coordinates.lon,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        );
        let response = self.fetch(&url).await?;
        Ok(response.statistics(coordinates, start, end)?.to_units(units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn london() -> Coordinates {
        Coordinates::new(51.5074, -0.1278)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn provider(server: &MockServer) -> OpenMeteoProvider {
        OpenMeteoProvider::with_urls(
            &format!("{}/v1/forecast", server.uri()),
            &format!("{}/v1/archive", server.uri()),
            ProviderLimits {
                historical_floor: NaiveDate::from_ymd_opt(1979, 1, 2).unwrap(),
                forecast_horizon_days: 7,
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn day_body() -> serde_json::Value {
        let hours: Vec<String> = (0..24).map(|h| format!("2024-05-01T{h:02}:00")).collect();
        let mut temps = vec![json!(10.0); 24];
        temps[0] = json!(9.0);
        temps[6] = json!(11.0);
        temps[12] = json!(17.0);
        temps[18] = json!(14.0);
        let mut humidity = vec![json!(60); 24];
        humidity[12] = json!(55);
        json!({
            "latitude": 51.5,
            "longitude": -0.12,
            "daily": {
                "time": ["2024-05-01"],
                "temperature_2m_max": [18.0],
                "temperature_2m_min": [7.0],
                "precipitation_sum": [0.4],
                "wind_speed_10m_max": [4.0],
                "wind_direction_10m_dominant": [241.6]
            },
            "hourly": {
                "time": hours,
                "temperature_2m": temps,
                "relative_humidity_2m": humidity,
                "cloud_cover": vec![json!(20); 24],
                "pressure_msl": vec![json!(1012.4); 24]
            }
        })
    }

    #[tokio::test]
    async fn test_historical_reading_uses_hourly_samples() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/archive"))
            .and(query_param("start_date", "2024-05-01"))
            .and(query_param("wind_speed_unit", "ms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(day_body()))
            .expect(1)
            .mount(&server)
            .await;

        let reading = provider(&server)
            .get_historical(london(), day(), Units::Metric)
            .await
            .unwrap();

        assert_eq!(reading.date, day());
        assert_eq!(reading.units, Units::Metric);
        assert_eq!(reading.temperature.night, 9.0);
        assert_eq!(reading.temperature.morning, 11.0);
        assert_eq!(reading.temperature.afternoon, 17.0);
        assert_eq!(reading.temperature.evening, 14.0);
        assert_eq!(reading.humidity.afternoon, 55);
        assert_eq!(reading.cloud_cover.afternoon, 20);
        assert_eq!(reading.wind.max.direction, 242);
    }

    #[tokio::test]
    async fn test_reading_is_converted_to_requested_units() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(day_body()))
            .mount(&server)
            .await;

        let reading = provider(&server)
            .get_forecast(london(), day(), Units::Standard)
            .await
            .unwrap();

        assert_eq!(reading.units, Units::Standard);
        assert!((reading.temperature.min - 280.15).abs() < 1e-9);
        assert!((reading.wind.max.speed - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_bad_request_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": true,
                "reason": "Parameter 'start_date' is out of allowed range"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_historical(london(), day(), Units::Metric)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::NotFound { .. }));
        assert!(err.to_string().contains("out of allowed range"));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_forecast(london(), day(), Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_undecodable_body_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_historical(london(), day(), Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_missing_daily_value_is_not_found() {
        let server = MockServer::start().await;
        let mut body = day_body();
        body["daily"]["temperature_2m_max"] = json!([null]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_historical(london(), day(), Units::Metric)
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_current_reading() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("forecast_days", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current": {
                    "temperature_2m": 15.5,
                    "relative_humidity_2m": 62,
                    "precipitation": 0.0,
                    "cloud_cover": 75,
                    "pressure_msl": 1009.8,
                    "wind_speed_10m": 3.2,
                    "wind_direction_10m": 180
                },
                "daily": {
                    "time": ["2024-05-01"],
                    "temperature_2m_max": [18.0],
                    "temperature_2m_min": [7.0],
                    "precipitation_sum": [0.0],
                    "wind_speed_10m_max": [6.0],
                    "wind_direction_10m_dominant": [190]
                }
            })))
            .mount(&server)
            .await;

        let reading = provider(&server)
            .get_current(london(), Units::Metric)
            .await
            .unwrap();
        assert_eq!(reading.date, day());
        assert_eq!(reading.temperature.afternoon, 15.5);
        assert_eq!(reading.cloud_cover.afternoon, 75);
        assert_eq!(reading.wind.max.direction, 180);
    }

    #[tokio::test]
    async fn test_stats_aggregate_daily_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/archive"))
            .and(query_param("start_date", "2024-05-01"))
            .and(query_param("end_date", "2024-05-03"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "daily": {
                    "time": ["2024-05-01", "2024-05-02", "2024-05-03"],
                    "temperature_2m_max": [18.0, 20.0, 16.0],
                    "temperature_2m_min": [8.0, 10.0, 6.0],
                    "precipitation_sum": [0.0, 2.5, 1.5],
                    "wind_speed_10m_max": [3.0, 6.0, 9.0],
                    "wind_direction_10m_dominant": [200, 210, 220]
                }
            })))
            .mount(&server)
            .await;

        let end = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let stats = provider(&server)
            .get_stats(london(), day(), end, Units::Metric)
            .await
            .unwrap();

        assert_eq!(stats.temperature.min, 6.0);
        assert_eq!(stats.temperature.max, 20.0);
        assert!((stats.temperature.average - 13.0).abs() < 1e-9);
        assert!((stats.precipitation.total - 4.0).abs() < 1e-9);
        assert_eq!(stats.precipitation.days_with_precipitation, 2);
        assert!((stats.wind.average_speed - 6.0).abs() < 1e-9);
        assert_eq!(stats.wind.max_speed, 9.0);
    }
}
