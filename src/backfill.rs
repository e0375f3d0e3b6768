//! Bulk population of the historical store for one tracked city
//!
//! Dates are processed one at a time, oldest first, with a pause after each
//! upstream fetch. A failing date is recorded and the run moves on.

use chrono::{Duration as DateDuration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::gazetteer::Gazetteer;
use crate::history::HistoricalStore;
use crate::models::City;
use crate::provider::WeatherProvider;
use crate::resolver::WeatherService;
use crate::units::Units;
use crate::{Result, WeatherError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Skipped,
    Failed,
}

/// What happened to one date of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateOutcome {
    pub date: NaiveDate,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DateOutcome {
    fn success(date: NaiveDate) -> Self {
        Self {
            date,
            status: OutcomeStatus::Success,
            reason: None,
            error: None,
        }
    }

    fn skipped(date: NaiveDate) -> Self {
        Self {
            date,
            status: OutcomeStatus::Skipped,
            reason: Some("data_exists".to_string()),
            error: None,
        }
    }

    fn failed(date: NaiveDate, error: &WeatherError) -> Self {
        Self {
            date,
            status: OutcomeStatus::Failed,
            reason: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of a backfill run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillManifest {
    pub city: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_requested: u32,
    /// Dates that were fetched or already present
    pub days_processed: usize,
    pub days_succeeded: usize,
    pub days_skipped: usize,
    pub days_failed: usize,
    /// One entry per date, oldest first
    pub outcomes: Vec<DateOutcome>,
}

impl BackfillManifest {
    fn new(city: &City, start_date: NaiveDate, end_date: NaiveDate, days_requested: u32) -> Self {
        Self {
            city: city.key.clone(),
            start_date,
            end_date,
            days_requested,
            days_processed: 0,
            days_succeeded: 0,
            days_skipped: 0,
            days_failed: 0,
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: DateOutcome) {
        match outcome.status {
            OutcomeStatus::Success => self.days_succeeded += 1,
            OutcomeStatus::Skipped => self.days_skipped += 1,
            OutcomeStatus::Failed => self.days_failed += 1,
        }
        self.days_processed = self.days_succeeded + self.days_skipped;
        self.outcomes.push(outcome);
    }
}

pub struct BackfillService {
    gazetteer: Arc<dyn Gazetteer>,
    history: HistoricalStore,
    provider: Arc<dyn WeatherProvider>,
    clock: Arc<dyn Clock>,
    max_days_back: u32,
}

impl BackfillService {
    /// Share the tiers of an existing service
    pub fn new(service: &WeatherService, max_days_back: u32) -> Self {
        Self {
            gazetteer: Arc::clone(service.gazetteer()),
            history: service.history().clone(),
            provider: Arc::clone(service.provider()),
            clock: Arc::clone(service.clock()),
            max_days_back,
        }
    }

    /// Populate `[today - days_back, today]` for a tracked city.
    ///
    /// Unknown and untracked cities and an out-of-range `days_back` are
    /// rejected before any date is touched.
    #[instrument(skip(self))]
    pub async fn backfill(
        &self,
        city: &str,
        days_back: u32,
        delay: Duration,
    ) -> Result<BackfillManifest> {
        let city = self
            .gazetteer
            .lookup(city)
            .ok_or_else(|| WeatherError::city_not_found(city))?;
        if !self.history.is_tracked(&city.key) {
            return Err(WeatherError::untracked_city(&city.key));
        }
        if days_back == 0 || days_back > self.max_days_back {
            return Err(WeatherError::validation_with_code(
                "INVALID_DAYS_BACK",
                format!("days_back must be between 1 and {}", self.max_days_back),
            ));
        }

        let end = self.clock.today();
        let start = end - DateDuration::days(i64::from(days_back));
        let mut manifest = BackfillManifest::new(&city, start, end, days_back);
        info!(city = %city.key, at = %city.coordinates, %start, %end, "Starting historical backfill");

        for date in start.iter_days().take_while(|d| *d <= end) {
            let outcome = match self.backfill_date(&city, date).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(%date, error = %e, "Backfill failed for date");
                    DateOutcome::failed(date, &e)
                }
            };
            let fetched = outcome.status == OutcomeStatus::Success;
            manifest.record(outcome);

            if fetched && date < end && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        info!(
            city = %city.key,
            succeeded = manifest.days_succeeded,
            skipped = manifest.days_skipped,
            failed = manifest.days_failed,
            "Backfill finished"
        );
        Ok(manifest)
    }

    async fn backfill_date(&self, city: &City, date: NaiveDate) -> Result<DateOutcome> {
        if self.history.contains(&city.key, date).await? {
            return Ok(DateOutcome::skipped(date));
        }
        let reading = self
            .provider
            .get_historical(city.coordinates, date, Units::CANONICAL)
            .await?;
        self.history.store(&city.key, &reading).await?;
        Ok(DateOutcome::success(date))
    }
}
