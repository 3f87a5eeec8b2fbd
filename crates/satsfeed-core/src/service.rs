//! Cache-first snapshot and history service.
//!
//! Reads are served from the TTL cache when fresh; otherwise the resolver is
//! awaited. Concurrent refreshes of one key share a single in-flight future,
//! and a failed refresh leaves the last good entry in place, flagged stale.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, TtlCache};
use crate::clock::{EpochMillis, MILLIS_PER_DAY};
use crate::inflight::{InFlight, SharedResult};
use crate::providers::SourceCatalog;
use crate::resolver::{Resolved, Resolver};
use crate::{
    merge_live_sample, PricePoint, PriceSeries, PriceSnapshot, ProviderId, RangeKey, ResolveError,
    ServiceError, SourceFailure,
};

pub const SNAPSHOT_CACHE_KEY: &str = "btc:snapshot";

/// Freshness hierarchy shown next to a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Fetched during this call.
    Live,
    /// Fresh cache entry.
    Cached,
    /// Last good value, known or suspected out of date.
    Delayed,
    /// Nothing usable; built-in fallback data is on display.
    Unavailable,
}

impl FeedStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Delayed => "delayed",
            Self::Unavailable => "unavailable",
        }
    }

    /// Badge text, e.g. "Live via Binance".
    pub fn label(self, source: Option<ProviderId>) -> String {
        match (self, source) {
            (Self::Live, Some(source)) => format!("Live via {}", source.label()),
            (Self::Live, None) => String::from("Live"),
            (Self::Cached, _) => String::from("Cached"),
            (Self::Delayed, _) => String::from("Delayed"),
            (Self::Unavailable, _) => String::from("Unavailable"),
        }
    }
}

impl Display for FeedStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value plus where it came from and how fresh it is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Served<T> {
    pub value: T,
    pub status: FeedStatus,
    pub source: Option<ProviderId>,
    pub updated_at: EpochMillis,
    pub stale: bool,
    /// Set when a numeric range was cut from another range's series.
    pub derived_from: Option<RangeKey>,
    #[serde(skip)]
    pub failures: Vec<SourceFailure>,
}

impl<T> Served<T> {
    pub fn status_label(&self) -> String {
        self.status.label(self.source)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served {
            value: f(self.value),
            status: self.status,
            source: self.source,
            updated_at: self.updated_at,
            stale: self.stale,
            derived_from: self.derived_from,
            failures: self.failures,
        }
    }
}

/// Cached value tagged with its provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sourced<T> {
    data: T,
    source: ProviderId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub snapshot_ttl: Duration,
    pub history_ttl: Duration,
    /// Snapshot age after which it is reported `Delayed` even before expiry.
    pub stale_window: Duration,
    /// Cut numeric ranges from a fresh `max` series before fetching them.
    pub derive_from_full_history: bool,
    /// Refresh in the background when a fresh cache entry is served.
    pub background_refresh: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(60),
            history_ttl: Duration::from_secs(30 * 60),
            stale_window: Duration::from_secs(10 * 60),
            derive_from_full_history: true,
            background_refresh: true,
        }
    }
}

type SnapshotOutcome = Result<Resolved<PriceSnapshot>, ResolveError>;
type HistoryOutcome = Result<Resolved<PriceSeries>, ResolveError>;

#[derive(Debug)]
struct ServiceInner {
    resolver: Resolver,
    catalog: SourceCatalog,
    cache: TtlCache,
    config: ServiceConfig,
    snapshot_flight: InFlight<(), SnapshotOutcome>,
    history_flight: InFlight<RangeKey, HistoryOutcome>,
    failed_refresh: Mutex<HashSet<String>>,
}

/// Cheap to clone; clones share cache, in-flight table and breakers.
#[derive(Debug, Clone)]
pub struct PriceService {
    inner: Arc<ServiceInner>,
}

impl PriceService {
    pub fn new(resolver: Resolver, catalog: SourceCatalog, cache: TtlCache, config: ServiceConfig) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                resolver,
                catalog,
                cache,
                config,
                snapshot_flight: InFlight::new(),
                history_flight: InFlight::new(),
                failed_refresh: Mutex::default(),
            }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &TtlCache {
        &self.inner.cache
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn now_ms(&self) -> EpochMillis {
        self.inner.cache.clock().now_ms()
    }

    /// Latest price summary, cache first.
    pub async fn get_snapshot(&self) -> Result<Served<PriceSnapshot>, ServiceError> {
        let cached = self
            .inner
            .cache
            .get::<Sourced<PriceSnapshot>>(SNAPSHOT_CACHE_KEY);

        if let Some(entry) = &cached {
            if !entry.is_expired() {
                if self.inner.config.background_refresh {
                    self.spawn_refresh(self.snapshot_refresh());
                }
                return Ok(self.serve_cached(
                    SNAPSHOT_CACHE_KEY,
                    entry.clone(),
                    Some(self.inner.config.stale_window),
                    Vec::new(),
                ));
            }
        }

        match self.snapshot_refresh().await {
            Ok(resolved) => {
                let updated_at = resolved.value.updated_at;
                Ok(self.serve_live(resolved, updated_at))
            }
            Err(error) => match cached {
                Some(entry) => {
                    warn!(key = SNAPSHOT_CACHE_KEY, "refresh failed; serving expired snapshot");
                    Ok(self.serve_cached(SNAPSHOT_CACHE_KEY, entry, None, error.failures().to_vec()))
                }
                None => Err(ServiceError::unavailable(SNAPSHOT_CACHE_KEY, error)),
            },
        }
    }

    /// Forces a snapshot resolution, joining one already in flight.
    pub async fn refresh_snapshot(&self) -> Result<Resolved<PriceSnapshot>, ResolveError> {
        self.snapshot_refresh().await
    }

    /// History for `range`, cache first, deriving numeric ranges from `max`
    /// when the range itself has never been cached.
    pub async fn get_history(&self, range: RangeKey) -> Result<Served<PriceSeries>, ServiceError> {
        let key = range.cache_key();
        let cached = self.inner.cache.get::<Sourced<PriceSeries>>(&key);

        if let Some(entry) = &cached {
            if !entry.is_expired() {
                if self.inner.config.background_refresh {
                    self.spawn_refresh(self.history_refresh(range));
                }
                return Ok(self.serve_cached(&key, entry.clone(), None, Vec::new()));
            }
        }

        if cached.is_none() && self.inner.config.derive_from_full_history {
            if let Some(served) = self.derive_from_full_history(range).await {
                return Ok(served);
            }
        }

        match self.history_refresh(range).await {
            Ok(resolved) => Ok(self.serve_live(resolved, self.now_ms())),
            Err(error) => {
                if let Some(entry) = cached {
                    warn!(key, "refresh failed; serving expired history");
                    return Ok(self.serve_cached(&key, entry, None, error.failures().to_vec()));
                }
                if let Some(served) = self.derive_from_expired_full_history(range, &error) {
                    return Ok(served);
                }
                Err(ServiceError::unavailable(key, error))
            }
        }
    }

    /// Forces a history resolution for `range`, joining one already in flight.
    pub async fn refresh_history(&self, range: RangeKey) -> Result<Resolved<PriceSeries>, ResolveError> {
        self.history_refresh(range).await
    }

    /// See [`merge_live_sample`].
    pub fn merge_live_sample(series: &PriceSeries, sample: PricePoint) -> PriceSeries {
        PriceSeries::from_points(merge_live_sample(series.points(), sample))
    }

    fn snapshot_refresh(&self) -> SharedResult<SnapshotOutcome> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .snapshot_flight
            .join_or_start((), move || async move { inner.fetch_snapshot().await })
    }

    fn history_refresh(&self, range: RangeKey) -> SharedResult<HistoryOutcome> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .history_flight
            .join_or_start(range, move || async move { inner.fetch_history(range).await })
    }

    fn spawn_refresh<T>(&self, refresh: SharedResult<Result<T, ResolveError>>)
    where
        T: Clone + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            if let Err(error) = refresh.await {
                debug!("background refresh failed: {error}");
            }
        });
    }

    async fn derive_from_full_history(&self, range: RangeKey) -> Option<Served<PriceSeries>> {
        let days = range.days()?;
        let full_key = RangeKey::Max.cache_key();

        let (full, source, status, updated_at) =
            match self.inner.cache.get::<Sourced<PriceSeries>>(&full_key) {
                Some(entry) if !entry.is_expired() => {
                    (entry.value.data, entry.value.source, FeedStatus::Cached, entry.updated_at)
                }
                _ => match self.history_refresh(RangeKey::Max).await {
                    Ok(resolved) => (resolved.value, resolved.source, FeedStatus::Live, self.now_ms()),
                    Err(error) => {
                        debug!(%range, "full history unavailable for derivation: {error}");
                        return None;
                    }
                },
            };

        let cutoff = self.now_ms() - i64::from(days) * MILLIS_PER_DAY;
        let derived = full.since(cutoff);
        if derived.len() < 2 {
            debug!(%range, points = derived.len(), "derived range too sparse; fetching directly");
            return None;
        }

        debug!(%range, points = derived.len(), "derived range from full history");
        self.inner.cache.set(
            &range.cache_key(),
            &Sourced {
                data: derived.clone(),
                source,
            },
            Some(self.inner.config.history_ttl),
        );
        self.inner.clear_failed(&range.cache_key());

        Some(Served {
            value: derived,
            status,
            source: Some(source),
            updated_at,
            stale: false,
            derived_from: Some(RangeKey::Max),
            failures: Vec::new(),
        })
    }

    /// Last resort when a range was never cached and cannot be fetched.
    fn derive_from_expired_full_history(
        &self,
        range: RangeKey,
        error: &ResolveError,
    ) -> Option<Served<PriceSeries>> {
        let days = range.days()?;
        let entry = self
            .inner
            .cache
            .get::<Sourced<PriceSeries>>(&RangeKey::Max.cache_key())?;
        let cutoff = self.now_ms() - i64::from(days) * MILLIS_PER_DAY;
        let derived = entry.value.data.since(cutoff);
        if derived.len() < 2 {
            return None;
        }

        warn!(%range, "serving range cut from stale full history");
        Some(Served {
            value: derived,
            status: FeedStatus::Delayed,
            source: Some(entry.value.source),
            updated_at: entry.updated_at,
            stale: true,
            derived_from: Some(RangeKey::Max),
            failures: error.failures().to_vec(),
        })
    }

    fn serve_cached<T>(
        &self,
        key: &str,
        entry: CacheEntry<Sourced<T>>,
        stale_window: Option<Duration>,
        failures: Vec<SourceFailure>,
    ) -> Served<T> {
        let now = self.now_ms();
        let outdated = stale_window.is_some_and(|window| entry.is_older_than(window, now));
        let stale = entry.is_expired() || outdated || self.inner.refresh_failed(key);

        Served {
            value: entry.value.data,
            status: if stale {
                FeedStatus::Delayed
            } else {
                FeedStatus::Cached
            },
            source: Some(entry.value.source),
            updated_at: entry.updated_at,
            stale,
            derived_from: None,
            failures,
        }
    }

    fn serve_live<T>(&self, resolved: Resolved<T>, updated_at: EpochMillis) -> Served<T> {
        Served {
            value: resolved.value,
            status: FeedStatus::Live,
            source: Some(resolved.source),
            updated_at,
            stale: false,
            derived_from: None,
            failures: resolved.failures,
        }
    }
}

impl ServiceInner {
    async fn fetch_snapshot(&self) -> SnapshotOutcome {
        let sources = self.catalog.snapshot_sources();
        match self.resolver.resolve(&sources).await {
            Ok(resolved) => {
                let now = self.cache.clock().now_ms();
                let resolved = resolved.map(|quote| PriceSnapshot::from_quote(quote, now));
                self.cache.set(
                    SNAPSHOT_CACHE_KEY,
                    &Sourced {
                        data: resolved.value.clone(),
                        source: resolved.source,
                    },
                    Some(self.config.snapshot_ttl),
                );
                self.clear_failed(SNAPSHOT_CACHE_KEY);
                info!(provider = %resolved.source, price = resolved.value.price, "snapshot refreshed");
                Ok(resolved)
            }
            Err(error) => {
                self.mark_failed(SNAPSHOT_CACHE_KEY);
                warn!(key = SNAPSHOT_CACHE_KEY, "snapshot refresh failed: {error}");
                Err(error)
            }
        }
    }

    async fn fetch_history(&self, range: RangeKey) -> HistoryOutcome {
        let key = range.cache_key();
        let sources = self.catalog.history_sources(range);
        match self.resolver.resolve(&sources).await {
            Ok(resolved) => {
                self.cache.set(
                    &key,
                    &Sourced {
                        data: resolved.value.clone(),
                        source: resolved.source,
                    },
                    Some(self.config.history_ttl),
                );
                self.clear_failed(&key);
                info!(%range, provider = %resolved.source, points = resolved.value.len(), "history refreshed");
                Ok(resolved)
            }
            Err(error) => {
                self.mark_failed(&key);
                warn!(key, "history refresh failed: {error}");
                Err(error)
            }
        }
    }

    fn mark_failed(&self, key: &str) {
        self.failed_refresh
            .lock()
            .expect("failed-refresh lock is not poisoned")
            .insert(key.to_owned());
    }

    fn clear_failed(&self, key: &str) {
        self.failed_refresh
            .lock()
            .expect("failed-refresh lock is not poisoned")
            .remove(key);
    }

    fn refresh_failed(&self, key: &str) -> bool {
        self.failed_refresh
            .lock()
            .expect("failed-refresh lock is not poisoned")
            .contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_name_the_live_source() {
        assert_eq!(FeedStatus::Live.label(Some(ProviderId::Binance)), "Live via Binance");
        assert_eq!(FeedStatus::Delayed.label(Some(ProviderId::Binance)), "Delayed");
        assert_eq!(FeedStatus::Unavailable.to_string(), "unavailable");
    }

    #[test]
    fn merge_live_sample_keeps_series_sorted() {
        let series = PriceSeries::from_points([
            PricePoint { time: 0, price: 100.0 },
            PricePoint { time: 60_000, price: 101.0 },
        ]);

        let merged = PriceService::merge_live_sample(&series, PricePoint { time: 60_500, price: 102.0 });

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.last().map(|point| point.price), Some(102.0));
    }
}
