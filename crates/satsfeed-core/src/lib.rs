//! # Satsfeed Core
//!
//! Resilient BTC/USD price feed: fetch with deadlines and retry, fall back
//! across equivalent providers, cache with TTLs, degrade to stale data and
//! render line or candlestick charts.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache over a key/value store |
//! | [`chart`] | Chart renderer, scales and drawing surfaces |
//! | [`circuit_breaker`] | Per-provider circuit breaker |
//! | [`clock`] | Injectable wall clock |
//! | [`config`] | Feed configuration and environment overrides |
//! | [`dca`] | Dollar-cost-averaging projection |
//! | [`domain`] | Price points, series, snapshots, ranges, candles |
//! | [`error`] | Core error types |
//! | [`exchanges`] | Exchange price comparison and spread |
//! | [`fallback`] | Built-in last-resort price data |
//! | [`fetch`] | JSON GET with timeout and retry |
//! | [`format`] | Price, change and date formatting |
//! | [`http_client`] | HTTP client abstraction |
//! | [`inflight`] | In-flight request de-duplication |
//! | [`providers`] | Provider endpoints and response parsers |
//! | [`resolver`] | Ordered multi-source fallback |
//! | [`retry`] | Retry policy and backoff |
//! | [`service`] | Cache-first snapshot and history service |
//! | [`source`] | Provider identifiers and source descriptors |
//! | [`storage`] | Key/value stores (memory, files) |
//! | [`widget`] | Refresh loop feeding price views |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use satsfeed_core::{FeedConfig, MemoryStore, RangeKey, ReqwestHttpClient, SystemClock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = FeedConfig::from_env()?.build_service(
//!         Arc::new(ReqwestHttpClient::new()),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(SystemClock),
//!     );
//!
//!     let snapshot = service.get_snapshot().await?;
//!     println!("{} ({})", snapshot.value.price, snapshot.status_label());
//!
//!     let week = service.get_history(RangeKey::Week).await?;
//!     println!("{} points", week.value.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Widget / CLI   │────▶│ Chart Renderer   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Price Service  │────▶│ TTL Cache        │
//! │  (in-flight)    │     │ (memory / files) │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Resolver       │────▶│ Circuit Breaker  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  fetch_json     │────▶│ HTTP Client      │
//! │  (retry)        │     │ (reqwest/script) │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Transport failures are classified as [`FetchError`]; a source whose
//! payload fails validation yields [`InvalidData`]. The resolver collects
//! both per source and fails with [`ResolveError`] only when every source
//! failed. The service fails with [`ServiceError`] only when, in addition,
//! nothing usable is cached.

pub mod cache;
pub mod chart;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod dca;
pub mod domain;
pub mod error;
pub mod exchanges;
pub mod fallback;
pub mod fetch;
pub mod format;
pub mod http_client;
pub mod inflight;
pub mod providers;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod source;
pub mod storage;
pub mod widget;

// Caching
pub use cache::{CacheEntry, TtlCache};

// Charts
pub use chart::{
    ChartError, ChartHandle, ChartOptions, ChartRenderer, ChartStyle, Readout, RecordingSurface,
    Surface, SvgSurface, Viewport,
};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakers, CircuitState};

// Clock
pub use clock::{Clock, EpochMillis, ManualClock, SystemClock};

// Configuration
pub use config::{ConfigError, FeedConfig};

// DCA
pub use dca::{DcaParams, DcaProjection, Frequency, Outlook};

// Domain models
pub use domain::{
    merge_live_sample, synthesize_candles, Candle, Granularity, PricePoint, PriceSeries,
    PriceSnapshot, Quote, RangeKey, SeriesStats, LIVE_SAMPLE_WINDOW_MS,
};

// Error types
pub use error::{
    FailureReason, FetchError, InvalidData, ResolveError, ServiceError, SourceFailure,
    ValidationError,
};

// Exchange comparison
pub use exchanges::{CompareError, ExchangeComparison, ExchangePrice, Spread};

// Fetching
pub use fetch::{fetch_json, FetchOptions};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient, ScriptedReply,
};

// In-flight de-duplication
pub use inflight::InFlight;

// Providers
pub use providers::SourceCatalog;

// Resolution
pub use resolver::{Resolved, Resolver};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Service
pub use service::{FeedStatus, PriceService, Served, ServiceConfig, SNAPSHOT_CACHE_KEY};

// Source identifiers
pub use source::{ProviderId, Source};

// Storage
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

// Widget
pub use widget::{create_price_widget, PriceWidget, WidgetConfig, WidgetFrame, WidgetView};
