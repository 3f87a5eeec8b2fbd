//! Millisecond wall clock, injectable so cache expiry and stale windows are testable.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

pub const MILLIS_PER_DAY: EpochMillis = 86_400_000;

pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> EpochMillis;
}

/// Real UTC clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMillis {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        nanos.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as EpochMillis
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: EpochMillis) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: EpochMillis) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_ms(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

pub fn duration_ms(duration: Duration) -> EpochMillis {
    duration.as_millis().min(i64::MAX as u128) as EpochMillis
}

/// `2024-03-14T07:10:36.635Z` to epoch milliseconds; `None` if unparseable.
pub fn parse_rfc3339_ms(text: &str) -> Option<EpochMillis> {
    let parsed = OffsetDateTime::parse(text.trim(), &Rfc3339).ok()?;
    EpochMillis::try_from(parsed.unix_timestamp_nanos() / 1_000_000).ok()
}
