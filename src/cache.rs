//! Cache tier: TTL-bound entries on a fjall keyspace.
//!
//! Payloads are stored as canonical-unit JSON inside a postcard envelope that
//! carries the expiry time. Conversion to the caller's units happens only in
//! [`CacheStore::get`] and [`CacheStore::set`].

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::task;

use crate::clock::Clock;
use crate::models::{DataKind, Tier, WeatherMeta, WeatherPayload};
use crate::units::Units;

const KEYSPACE: &str = "weather_cache";
const KEY_PREFIX: &str = "weather";

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    payload: String,
    expires_at: u64, // Unix timestamp (seconds)
}

impl StoredEntry {
    fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Time-to-live per data kind
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    pub current: Duration,
    /// Forecasts up to `forecast_near_days` ahead
    pub forecast_near: Duration,
    pub forecast_far: Duration,
    pub forecast_near_days: i64,
    pub historical: Duration,
    pub stats: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            current: Duration::from_secs(30 * 60),
            forecast_near: Duration::from_secs(3 * 60 * 60),
            forecast_far: Duration::from_secs(12 * 60 * 60),
            forecast_near_days: 5,
            historical: Duration::from_secs(7 * 24 * 60 * 60),
            stats: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl TtlPolicy {
    /// TTL for an entry of `kind` about `date`, relative to `today`
    #[must_use]
    pub fn ttl_for(&self, kind: DataKind, date: Option<NaiveDate>, today: NaiveDate) -> Duration {
        match kind {
            DataKind::Current => self.current,
            DataKind::Forecast => match date {
                Some(date) if (date - today).num_days() > self.forecast_near_days => {
                    self.forecast_far
                }
                _ => self.forecast_near,
            },
            DataKind::Historical => self.historical,
            DataKind::Stats => self.stats,
        }
    }
}

/// Identity of a cache entry: (city, date key, data kind)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub city: String,
    /// `YYYY-MM-DD`, or `start_end` for stats ranges
    pub date_key: String,
    pub kind: DataKind,
}

impl CacheKey {
    pub fn new(city: impl Into<String>, date_key: impl Into<String>, kind: DataKind) -> Self {
        Self {
            city: city.into(),
            date_key: date_key.into(),
            kind,
        }
    }

    pub fn for_date(city: impl Into<String>, date: NaiveDate, kind: DataKind) -> Self {
        Self::new(city, date.format("%Y-%m-%d").to_string(), kind)
    }

    pub fn for_range(city: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(
            city,
            format!("{}_{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
            DataKind::Stats,
        )
    }

    fn storage_key(&self) -> String {
        format!(
            "{KEY_PREFIX}:{}:{}:{}",
            self.city, self.date_key, self.kind
        )
    }

    fn city_prefix(city: &str) -> String {
        format!("{KEY_PREFIX}:{city}:")
    }

    /// First date mentioned by the date key
    fn reference_date(&self) -> Option<NaiveDate> {
        self.date_key
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

/// Data kind encoded in the last segment of a storage key
fn kind_of_storage_key(key: &[u8]) -> Option<DataKind> {
    let key = std::str::from_utf8(key).ok()?;
    DataKind::parse(key.rsplit(':').next()?)
}

/// Result of a city purge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeResult {
    pub keys_removed: usize,
    pub bytes_freed: u64,
}

/// Aggregate view of the cache tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub status: String,
    pub total_keys: usize,
    pub approximate_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that hit
    pub hit_rate: f64,
    pub miss_rate: f64,
    /// Entries dropped because they failed to decode
    pub evicted_keys: u64,
    /// Entries dropped after their TTL elapsed
    pub expired_keys: u64,
    pub uptime_seconds: u64,
    pub cache_type_distribution: BTreeMap<DataKind, usize>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
    expired: AtomicU64,
}

enum Lookup {
    Fresh(WeatherPayload),
    Missing,
    Expired,
    Corrupt(String),
}

/// Cache tier over a fjall keyspace. Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct CacheStore {
    store: Keyspace,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
    provider: String,
    counters: Arc<Counters>,
    started: Instant,
}

fn now_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

/// Visit entries in key order without copying them out of the keyspace
fn for_each_entry(
    store: &Keyspace,
    prefix: Option<&[u8]>,
    mut visit: impl FnMut(&[u8], &[u8]),
) -> Result<()> {
    match prefix {
        Some(prefix) => {
            for guard in store.prefix(prefix) {
                let (k, v) = guard.into_inner()?;
                visit(&k[..], &v[..]);
            }
        }
        None => {
            for guard in store.iter() {
                let (k, v) = guard.into_inner()?;
                visit(&k[..], &v[..]);
            }
        }
    }
    Ok(())
}

impl CacheStore {
    /// Open the cache keyspace inside `db`.
    pub fn open(
        db: &Database,
        policy: TtlPolicy,
        clock: Arc<dyn Clock>,
        provider: impl Into<String>,
    ) -> Result<Self> {
        let store = db.keyspace(KEYSPACE, KeyspaceCreateOptions::default)?;
        Ok(CacheStore {
            store,
            policy,
            clock,
            provider: provider.into(),
            counters: Arc::new(Counters::default()),
            started: Instant::now(),
        })
    }

    /// Look up an entry and hand it back in `units`, stamped as cached.
    ///
    /// Expired and undecodable entries are deleted and reported as absent.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self, key), fields(key = %key.storage_key()))]
    pub async fn get(&self, key: &CacheKey, units: Units) -> Result<Option<WeatherPayload>> {
        let storage_key = key.storage_key();
        let store = self.store.clone();
        let key_bytes = storage_key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        let lookup = match maybe_bytes {
            Some(bytes) => Self::decode(key.kind, &bytes, now_secs()?),
            None => Lookup::Missing,
        };

        match lookup {
            Lookup::Fresh(payload) => {
                tracing::debug!("Key found and still fresh");
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                let meta = WeatherMeta::new(Tier::Cache, &self.provider, key.kind);
                Ok(Some(payload.to_units(units).with_meta(meta)))
            }
            Lookup::Missing => {
                tracing::debug!("Key not found");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Lookup::Expired => {
                tracing::debug!("Key found but expired");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                self.remove(&storage_key).await?;
                Ok(None)
            }
            Lookup::Corrupt(reason) => {
                tracing::warn!(reason = %reason, "Dropping undecodable cache entry");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.evicted.fetch_add(1, Ordering::Relaxed);
                self.remove(&storage_key).await?;
                Ok(None)
            }
        }
    }

    fn decode(kind: DataKind, bytes: &[u8], now: u64) -> Lookup {
        let entry: StoredEntry = match postcard::from_bytes(bytes) {
            Ok(entry) => entry,
            Err(e) => return Lookup::Corrupt(format!("envelope: {e}")),
        };
        if entry.is_expired(now) {
            return Lookup::Expired;
        }
        match WeatherPayload::from_json(kind, &entry.payload) {
            Ok(payload) if payload.units().is_canonical() => Lookup::Fresh(payload),
            Ok(payload) => Lookup::Corrupt(format!("stored in {} units", payload.units())),
            Err(e) => Lookup::Corrupt(format!("payload: {e}")),
        }
    }

    /// Store a value in canonical units with the TTL of its data kind.
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, key, value), fields(key = %key.storage_key()))]
    pub async fn set(&self, key: &CacheKey, value: &WeatherPayload) -> Result<()> {
        if !value.matches_kind(key.kind) {
            bail!("payload does not match data kind '{}'", key.kind);
        }
        let canonical = value.clone().without_meta().to_units(Units::CANONICAL);
        let ttl = self
            .policy
            .ttl_for(key.kind, key.reference_date(), self.clock.today());

        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or_else(|| anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let entry = StoredEntry {
            payload: canonical.to_json()?,
            expires_at,
        };
        let bytes = postcard::to_stdvec(&entry)?;

        let store = self.store.clone();
        let key_bytes = key.storage_key().into_bytes();
        task::spawn_blocking(move || store.insert(key_bytes, bytes)).await??;
        Ok(())
    }

    async fn remove(&self, storage_key: &str) -> Result<()> {
        let key = storage_key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }

    /// Delete every entry of `city`. Purging a city with no entries succeeds
    /// with zero counts.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn clear_city(&self, city: &str) -> Result<PurgeResult> {
        let store = self.store.clone();
        let prefix = CacheKey::city_prefix(city).into_bytes();

        let result = task::spawn_blocking(move || -> Result<PurgeResult> {
            let mut result = PurgeResult::default();
            let mut doomed = Vec::new();
            for_each_entry(&store, Some(&prefix), |key, value| {
                result.bytes_freed += (key.len() + value.len()) as u64;
                doomed.push(key.to_vec());
            })?;
            for key in doomed {
                store.remove(key)?;
                result.keys_removed += 1;
            }
            Ok(result)
        })
        .await??;

        if result.keys_removed == 0 {
            tracing::info!("No cache entries found for city");
        } else {
            tracing::info!(
                keys_removed = result.keys_removed,
                bytes_freed = result.bytes_freed,
                "Cache cleared for city"
            );
        }
        Ok(result)
    }

    /// Remove entries whose TTL has elapsed, plus any that no longer decode.
    pub async fn purge_expired(&self) -> Result<usize> {
        let store = self.store.clone();
        let now = now_secs()?;

        let (expired, evicted) = task::spawn_blocking(move || -> Result<(u64, u64)> {
            let (mut expired, mut evicted) = (0, 0);
            let mut doomed = Vec::new();
            for_each_entry(&store, None, |key, value| {
                match postcard::from_bytes::<StoredEntry>(value) {
                    Ok(entry) if !entry.is_expired(now) => return,
                    Ok(_) => expired += 1,
                    Err(_) => evicted += 1,
                }
                doomed.push(key.to_vec());
            })?;
            for key in doomed {
                store.remove(key)?;
            }
            Ok((expired, evicted))
        })
        .await??;

        self.counters.expired.fetch_add(expired, Ordering::Relaxed);
        self.counters.evicted.fetch_add(evicted, Ordering::Relaxed);
        if expired + evicted > 0 {
            tracing::debug!(expired, evicted, "Swept cache");
        }
        Ok((expired + evicted) as usize)
    }

    /// Aggregate counters and a per-kind census of live entries.
    pub async fn stats(&self) -> Result<CacheStats> {
        let store = self.store.clone();
        let now = now_secs()?;

        let (distribution, bytes) =
            task::spawn_blocking(move || -> Result<(BTreeMap<DataKind, usize>, u64)> {
                let mut distribution: BTreeMap<DataKind, usize> =
                    DataKind::ALL.into_iter().map(|kind| (kind, 0)).collect();
                let mut bytes = 0u64;
                for_each_entry(&store, None, |key, value| {
                    let live = postcard::from_bytes::<StoredEntry>(value)
                        .map(|entry| !entry.is_expired(now))
                        .unwrap_or(false);
                    if !live {
                        return;
                    }
                    if let Some(kind) = kind_of_storage_key(key) {
                        *distribution.entry(kind).or_default() += 1;
                    }
                    bytes += (key.len() + value.len()) as u64;
                })?;
                Ok((distribution, bytes))
            })
            .await??;

        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let (hit_rate, miss_rate) = if lookups == 0 {
            (0.0, 0.0)
        } else {
            let hit_rate = hits as f64 / lookups as f64 * 100.0;
            (hit_rate, 100.0 - hit_rate)
        };

        Ok(CacheStats {
            status: "operational".to_string(),
            total_keys: distribution.values().sum(),
            approximate_bytes: bytes,
            hits,
            misses,
            hit_rate,
            miss_rate,
            evicted_keys: self.counters.evicted.load(Ordering::Relaxed),
            expired_keys: self.counters.expired.load(Ordering::Relaxed),
            uptime_seconds: self.started.elapsed().as_secs(),
            cache_type_distribution: distribution,
        })
    }

    #[cfg(test)]
    async fn put_raw(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<()> {
        let store = self.store.clone();
        let key_bytes = key.storage_key().into_bytes();
        task::spawn_blocking(move || store.insert(key_bytes, bytes)).await??;
        Ok(())
    }

    #[cfg(test)]
    async fn contains(&self, key: &CacheKey) -> Result<bool> {
        let store = self.store.clone();
        let key_bytes = key.storage_key().into_bytes();
        Ok(task::spawn_blocking(move || get_from_store(store, key_bytes))
            .await??
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::weather::fixtures::{reading, stats};
    use rstest::rstest;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn open_cache(dir: &TempDir, policy: TtlPolicy) -> CacheStore {
        let db = Database::builder(dir.path()).open().unwrap();
        CacheStore::open(&db, policy, Arc::new(FixedClock(today())), "OpenMeteo").unwrap()
    }

    #[rstest]
    #[case(DataKind::Current, None, 30 * 60)]
    #[case(DataKind::Forecast, Some(1), 3 * 3600)]
    #[case(DataKind::Forecast, Some(5), 3 * 3600)]
    #[case(DataKind::Forecast, Some(6), 12 * 3600)]
    #[case(DataKind::Forecast, None, 3 * 3600)]
    #[case(DataKind::Historical, Some(-3), 7 * 24 * 3600)]
    #[case(DataKind::Stats, None, 24 * 3600)]
    fn test_ttl_policy(
        #[case] kind: DataKind,
        #[case] days_ahead: Option<i64>,
        #[case] expected_secs: u64,
    ) {
        let date = days_ahead.map(|d| today() + chrono::Duration::days(d));
        let ttl = TtlPolicy::default().ttl_for(kind, date, today());
        assert_eq!(ttl, Duration::from_secs(expected_secs));
    }

    #[test]
    fn test_storage_key_layout() {
        let key = CacheKey::for_date("london,gb", today(), DataKind::Historical);
        assert_eq!(key.storage_key(), "weather:london,gb:2024-06-15:historical");

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let range = CacheKey::for_range("paris,fr", start, end);
        assert_eq!(
            range.storage_key(),
            "weather:paris,fr:2024-01-01_2024-01-31:stats"
        );
        assert_eq!(range.reference_date(), Some(start));
        assert_eq!(
            kind_of_storage_key(range.storage_key().as_bytes()),
            Some(DataKind::Stats)
        );
    }

    #[tokio::test]
    async fn test_cross_unit_hit() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, TtlPolicy::default());
        let key = CacheKey::for_date("london,gb", today(), DataKind::Current);

        // written in metric, read back in imperial
        let metric = WeatherPayload::from(reading(today())).to_units(Units::Metric);
        cache.set(&key, &metric).await.unwrap();

        let hit = cache.get(&key, Units::Imperial).await.unwrap().unwrap();
        let hit_reading = hit.as_reading().unwrap();
        assert_eq!(hit_reading.units, Units::Imperial);
        assert!((hit_reading.temperature.max - 64.4).abs() < 0.011);
        let meta = hit.meta().unwrap();
        assert!(meta.cached);
        assert_eq!(meta.tier, Tier::Cache);
    }

    #[tokio::test]
    async fn test_entries_are_canonical_and_meta_free() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, TtlPolicy::default());
        let key = CacheKey::for_date("london,gb", today(), DataKind::Historical);

        let value = WeatherPayload::from(reading(today()))
            .to_units(Units::Imperial)
            .with_meta(WeatherMeta::new(Tier::Upstream, "OpenMeteo", DataKind::Historical));
        cache.set(&key, &value).await.unwrap();

        let raw = get_from_store(cache.store.clone(), key.storage_key().into_bytes())
            .unwrap()
            .unwrap();
        let entry: StoredEntry = postcard::from_bytes(&raw).unwrap();
        assert!(!entry.payload.contains("\"meta\""));
        let decoded = WeatherPayload::from_json(DataKind::Historical, &entry.payload).unwrap();
        assert_eq!(decoded.units(), Units::Standard);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_deleted_and_reported_absent() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, TtlPolicy::default());
        let key = CacheKey::for_date("paris,fr", today(), DataKind::Current);

        cache.put_raw(&key, b"not an envelope".to_vec()).await.unwrap();
        assert!(cache.get(&key, Units::Metric).await.unwrap().is_none());
        assert!(!cache.contains(&key).await.unwrap());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.evicted_keys, 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_deleted() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, TtlPolicy::default());
        let key = CacheKey::for_date("paris,fr", today(), DataKind::Forecast);

        let entry = StoredEntry {
            payload: "{\"lat\": 1.0}".to_string(),
            expires_at: u64::MAX,
        };
        cache
            .put_raw(&key, postcard::to_stdvec(&entry).unwrap())
            .await
            .unwrap();

        assert!(cache.get(&key, Units::Metric).await.unwrap().is_none());
        assert!(!cache.contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let policy = TtlPolicy {
            current: Duration::ZERO,
            ..TtlPolicy::default()
        };
        let cache = open_cache(&dir, policy);
        let key = CacheKey::for_date("london,gb", today(), DataKind::Current);

        cache
            .set(&key, &WeatherPayload::from(reading(today())))
            .await
            .unwrap();
        assert!(cache.get(&key, Units::Standard).await.unwrap().is_none());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.expired_keys, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_keys, 0);
    }

    #[tokio::test]
    async fn test_purge_expired_sweeps_stale_entries() {
        let dir = TempDir::new().unwrap();
        let policy = TtlPolicy {
            current: Duration::ZERO,
            ..TtlPolicy::default()
        };
        let cache = open_cache(&dir, policy);
        let stale = CacheKey::for_date("london,gb", today(), DataKind::Current);
        let fresh = CacheKey::for_date("london,gb", today(), DataKind::Historical);

        let value = WeatherPayload::from(reading(today()));
        cache.set(&stale, &value).await.unwrap();
        cache.set(&fresh, &value).await.unwrap();

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert!(!cache.contains(&stale).await.unwrap());
        assert!(cache.contains(&fresh).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_and_census_skip_dead_entries() {
        let dir = TempDir::new().unwrap();
        let policy = TtlPolicy {
            current: Duration::ZERO,
            ..TtlPolicy::default()
        };
        let cache = open_cache(&dir, policy);
        let value = WeatherPayload::from(reading(today()));

        for city in ["london,gb", "paris,fr", "lublin,pl"] {
            let stale = CacheKey::for_date(city, today(), DataKind::Current);
            let fresh = CacheKey::for_date(city, today(), DataKind::Historical);
            cache.set(&stale, &value).await.unwrap();
            cache.set(&fresh, &value).await.unwrap();
        }
        let garbage = CacheKey::for_date("paris,fr", today(), DataKind::Forecast);
        cache.put_raw(&garbage, b"junk".to_vec()).await.unwrap();

        let census = cache.stats().await.unwrap();
        assert_eq!(census.total_keys, 3);
        assert_eq!(census.cache_type_distribution[&DataKind::Historical], 3);
        assert_eq!(census.cache_type_distribution[&DataKind::Current], 0);

        assert_eq!(cache.purge_expired().await.unwrap(), 4);
        let after = cache.stats().await.unwrap();
        assert_eq!(after.total_keys, 3);
        assert_eq!(after.expired_keys, 3);
        assert_eq!(after.evicted_keys, 1);
        assert!(!cache.contains(&garbage).await.unwrap());
        assert_eq!(cache.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_payload_of_wrong_kind() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, TtlPolicy::default());
        let key = CacheKey::for_date("london,gb", today(), DataKind::Stats);
        let result = cache.set(&key, &WeatherPayload::from(reading(today()))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_city_is_idempotent_and_scoped() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, TtlPolicy::default());
        let value = WeatherPayload::from(reading(today()));

        for kind in [DataKind::Current, DataKind::Historical, DataKind::Forecast] {
            cache
                .set(&CacheKey::for_date("london,gb", today(), kind), &value)
                .await
                .unwrap();
        }
        let other = CacheKey::for_date("london,ca", today(), DataKind::Current);
        cache.set(&other, &value).await.unwrap();

        let first = cache.clear_city("london,gb").await.unwrap();
        assert_eq!(first.keys_removed, 3);
        assert!(first.bytes_freed > 0);

        let second = cache.clear_city("london,gb").await.unwrap();
        assert_eq!(second, PurgeResult::default());

        assert!(cache.contains(&other).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_distribution_and_rates() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir, TtlPolicy::default());
        let start = today() - chrono::Duration::days(10);

        let current = CacheKey::for_date("london,gb", today(), DataKind::Current);
        cache
            .set(&current, &WeatherPayload::from(reading(today())))
            .await
            .unwrap();
        let range = CacheKey::for_range("london,gb", start, today());
        cache
            .set(&range, &WeatherPayload::from(stats(start, today())))
            .await
            .unwrap();

        assert!(cache.get(&current, Units::Metric).await.unwrap().is_some());
        let missing = CacheKey::for_date("paris,fr", today(), DataKind::Current);
        assert!(cache.get(&missing, Units::Metric).await.unwrap().is_none());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_keys, 2);
        assert_eq!(stats.cache_type_distribution[&DataKind::Current], 1);
        assert_eq!(stats.cache_type_distribution[&DataKind::Stats], 1);
        assert_eq!(stats.cache_type_distribution[&DataKind::Forecast], 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 50.0).abs() < 1e-9);
    }
}
