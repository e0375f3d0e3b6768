//! HTTP routes over the weather service

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query as QueryParams, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::timeout::TimeoutLayer;

use crate::backfill::{BackfillManifest, BackfillService};
use crate::config::BackfillConfig;
use crate::models::WeatherPayload;
use crate::resolver::{Query, WeatherService};
use crate::units::Units;
use crate::WeatherError;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
    pub backfill: Arc<BackfillService>,
    pub admin_api_key: Arc<str>,
    pub backfill_limits: BackfillConfig,
}

/// Error body: `{"error": {"code", "message", "details"}}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        let status = match &err {
            WeatherError::Validation { .. } | WeatherError::UntrackedCity { .. } => {
                StatusCode::BAD_REQUEST
            }
            WeatherError::CityNotFound { .. } | WeatherError::NotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            WeatherError::Provider { .. } => StatusCode::BAD_GATEWAY,
            WeatherError::Storage { .. } | WeatherError::Config { .. } | WeatherError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if err.is_client_error() {
            tracing::debug!(error = %err, "Request rejected");
        } else {
            tracing::error!(error = %err, "Request failed");
        }
        Self {
            status,
            code: err.code(),
            message: err.user_message(),
            details: Some(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Read routes answer within `request_timeout`. Admin routes are untimed
/// since a backfill may run for minutes.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let admin = Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/cache/{city}", delete(clear_city))
        .route("/cache/populate/{city}", post(populate))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/weather/current/{city}", get(current))
        .route("/weather/historical/{city}", get(historical))
        .route("/weather/forecast/{city}", get(forecast))
        .route("/weather/stats/{city}", get(stats))
        .route("/cities", get(list_cities))
        .route("/cities/search", get(search_cities))
        .route_layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .merge(admin)
        .with_state(state)
}

/// Compare without short-circuiting on the first differing byte
fn keys_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

async fn require_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        None => ApiError::new(
            StatusCode::UNAUTHORIZED,
            "MISSING_API_KEY",
            "Admin API key required in the X-API-Key header",
        )
        .into_response(),
        Some(key) if !keys_match(key, &state.admin_api_key) => {
            tracing::warn!("Rejected admin request with invalid API key");
            ApiError::new(StatusCode::FORBIDDEN, "INVALID_API_KEY", "Invalid admin API key")
                .into_response()
        }
        Some(_) => next.run(request).await,
    }
}

fn parse_units(units: Option<&str>) -> ApiResult<Units> {
    units.map_or(Ok(Units::Metric), |u| u.parse::<Units>().map_err(ApiError::from))
}

fn parse_date(field: &str, value: Option<&str>) -> ApiResult<NaiveDate> {
    let value = value.ok_or_else(|| {
        ApiError::bad_request("MISSING_PARAMETER", format!("'{field}' is required"))
    })?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiError::bad_request(
            "INVALID_DATE_FORMAT",
            format!("'{field}' must be a date in YYYY-MM-DD format"),
        )
    })
}

#[derive(Debug, Deserialize)]
struct WeatherParams {
    date: Option<String>,
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    start_date: Option<String>,
    end_date: Option<String>,
    units: Option<String>,
}

async fn resolve(
    state: &AppState,
    city: &str,
    query: Query,
    units: Units,
) -> ApiResult<Json<WeatherPayload>> {
    Ok(Json(state.service.resolve(city, query, units).await?))
}

async fn current(
    State(state): State<AppState>,
    Path(city): Path<String>,
    QueryParams(params): QueryParams<WeatherParams>,
) -> ApiResult<Json<WeatherPayload>> {
    let units = parse_units(params.units.as_deref())?;
    resolve(&state, &city, Query::Current, units).await
}

async fn historical(
    State(state): State<AppState>,
    Path(city): Path<String>,
    QueryParams(params): QueryParams<WeatherParams>,
) -> ApiResult<Json<WeatherPayload>> {
    let units = parse_units(params.units.as_deref())?;
    let date = parse_date("date", params.date.as_deref())?;
    resolve(&state, &city, Query::Historical { date }, units).await
}

async fn forecast(
    State(state): State<AppState>,
    Path(city): Path<String>,
    QueryParams(params): QueryParams<WeatherParams>,
) -> ApiResult<Json<WeatherPayload>> {
    let units = parse_units(params.units.as_deref())?;
    let date = parse_date("date", params.date.as_deref())?;
    resolve(&state, &city, Query::Forecast { date }, units).await
}

async fn stats(
    State(state): State<AppState>,
    Path(city): Path<String>,
    QueryParams(params): QueryParams<StatsParams>,
) -> ApiResult<Json<WeatherPayload>> {
    let units = parse_units(params.units.as_deref())?;
    let start = parse_date("start_date", params.start_date.as_deref())?;
    let end = parse_date("end_date", params.end_date.as_deref())?;
    resolve(&state, &city, Query::Stats { start, end }, units).await
}

#[derive(Debug, Serialize)]
struct CityEntry {
    key: String,
    name: String,
    country: String,
    lat: f64,
    lon: f64,
    tracked: bool,
}

fn city_entries(state: &AppState, cities: Vec<crate::models::City>) -> Vec<CityEntry> {
    cities
        .into_iter()
        .map(|c| CityEntry {
            tracked: state.service.history().is_tracked(&c.key),
            key: c.key,
            name: c.name,
            country: c.country,
            lat: c.coordinates.lat,
            lon: c.coordinates.lon,
        })
        .collect()
}

async fn list_cities(State(state): State<AppState>) -> Json<Value> {
    let cities = city_entries(&state, state.service.gazetteer().all());
    Json(json!({ "total": cities.len(), "cities": cities }))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<usize>,
}

async fn search_cities(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> ApiResult<Json<Value>> {
    let q = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("MISSING_PARAMETER", "'q' is required"))?;
    let limit = params.limit.unwrap_or(1).clamp(1, 10);

    let results = state.service.gazetteer().search(&q, limit);
    if results.is_empty() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "CITY_NOT_FOUND",
            format!("No cities found matching '{q}'"),
        ));
    }
    Ok(Json(json!({ "results": city_entries(&state, results) })))
}

async fn cache_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let cache = state.service.cache_stats().await?;
    let store = state.service.store_stats().await;
    Ok(Json(json!({ "cache": cache, "store": store })))
}

#[derive(Debug, Deserialize)]
struct ClearParams {
    clear_historical: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ClearStatus {
    Success,
    NoData,
    PartialError,
}

#[derive(Debug, Serialize)]
struct CacheClear {
    keys_removed: usize,
    bytes_freed: u64,
}

#[derive(Debug, Serialize)]
struct HistoricalClear {
    status: &'static str,
    records_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    status: ClearStatus,
    timestamp: chrono::DateTime<Utc>,
    city: String,
    cache_clear: CacheClear,
    #[serde(skip_serializing_if = "Option::is_none")]
    historical_clear: Option<HistoricalClear>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn clear_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
    QueryParams(params): QueryParams<ClearParams>,
) -> ApiResult<Json<ClearResponse>> {
    let city = state.service.city_key(&city);
    let purged = state.service.purge_city(&city).await?;

    let historical_clear = if params.clear_historical.unwrap_or(true) {
        Some(match state.service.purge_history(&city).await {
            Ok(records_removed) => HistoricalClear {
                status: "success",
                records_removed,
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear historical records");
                HistoricalClear {
                    status: "error",
                    records_removed: 0,
                    error: Some(e.to_string()),
                }
            }
        })
    } else {
        None
    };

    let removed_any = purged.keys_removed > 0
        || historical_clear
            .as_ref()
            .is_some_and(|h| h.records_removed > 0);
    let historical_failed = historical_clear
        .as_ref()
        .is_some_and(|h| h.error.is_some());
    let status = if removed_any {
        ClearStatus::Success
    } else if historical_failed {
        ClearStatus::PartialError
    } else {
        ClearStatus::NoData
    };

    Ok(Json(ClearResponse {
        message: matches!(status, ClearStatus::NoData)
            .then(|| "No data found to clear for the specified city".to_string()),
        status,
        timestamp: Utc::now(),
        city,
        cache_clear: CacheClear {
            keys_removed: purged.keys_removed,
            bytes_freed: purged.bytes_freed,
        },
        historical_clear,
    }))
}

#[derive(Debug, Deserialize)]
struct PopulateParams {
    days_back: Option<String>,
    delay: Option<String>,
}

fn parse_delay(value: Option<&str>, limits: &BackfillConfig) -> ApiResult<Duration> {
    let Some(value) = value else {
        return Ok(Duration::from_millis(limits.default_delay_ms));
    };
    let (min, max) = (
        limits.min_delay_ms as f64 / 1000.0,
        limits.max_delay_ms as f64 / 1000.0,
    );
    let invalid = || {
        ApiError::bad_request(
            "INVALID_DELAY",
            format!("'delay' must be a number of seconds between {min} and {max}"),
        )
    };
    let seconds: f64 = value.trim().parse().map_err(|_| invalid())?;
    if !(min..=max).contains(&seconds) {
        return Err(invalid());
    }
    Ok(Duration::from_secs_f64(seconds))
}

async fn populate(
    State(state): State<AppState>,
    Path(city): Path<String>,
    QueryParams(params): QueryParams<PopulateParams>,
) -> ApiResult<Json<BackfillManifest>> {
    let days_back: u32 = params
        .days_back
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("MISSING_PARAMETER", "'days_back' is required"))?
        .trim()
        .parse()
        .map_err(|_| {
            ApiError::bad_request("INVALID_DAYS_BACK", "'days_back' must be a positive integer")
        })?;
    let delay = parse_delay(params.delay.as_deref(), &state.backfill_limits)?;

    Ok(Json(state.backfill.backfill(&city, days_back, delay).await?))
}
