//! TTL cache over durable key-value storage.
//!
//! Entries are persisted as `{"value":…,"updatedAt":…,"expiresAt":…}` and
//! are never deleted; staleness is computed on read from the injected clock.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{duration_ms, Clock, EpochMillis};
use crate::storage::KeyValueStore;

/// A cached value plus its write time and optional expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    pub updated_at: EpochMillis,
    pub expires_at: Option<EpochMillis>,
    /// Computed at read time; not persisted.
    #[serde(skip)]
    pub expired: bool,
}

impl<T> CacheEntry<T> {
    pub const fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn age_ms(&self, now: EpochMillis) -> EpochMillis {
        (now - self.updated_at).max(0)
    }

    /// Consumer-side stale window, independent of the TTL.
    pub fn is_older_than(&self, window: Duration, now: EpochMillis) -> bool {
        self.age_ms(now) > duration_ms(window)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry<'a, T> {
    value: &'a T,
    updated_at: EpochMillis,
    expires_at: Option<EpochMillis>,
}

#[derive(Debug, Clone)]
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Reads an entry. Missing, unreadable and corrupt entries are all `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(error) => {
                warn!(key, "cache read failed: {error}");
                return None;
            }
        };

        let mut entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(key, "ignoring corrupt cache entry: {error}");
                return None;
            }
        };

        let now = self.clock.now_ms();
        entry.expired = entry.expires_at.is_some_and(|expires_at| now > expires_at);
        debug!(key, expired = entry.expired, age_ms = entry.age_ms(now), "cache hit");
        Some(entry)
    }

    /// Writes an entry stamped with the current time. `None` TTL never expires.
    ///
    /// Storage and serialization failures are logged and swallowed; the next
    /// read simply behaves as if the write never happened.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let now = self.clock.now_ms();
        let entry = StoredEntry {
            value,
            updated_at: now,
            expires_at: ttl.map(|ttl| now.saturating_add(duration_ms(ttl))),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(key, "failed to serialize cache entry: {error}");
                return;
            }
        };

        match self.store.set(key, raw) {
            Ok(()) => debug!(key, "cached"),
            Err(error) => warn!(key, "cache write dropped: {error}"),
        }
    }
}
