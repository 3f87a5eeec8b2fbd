//! Runtime configuration: every timeout, retry budget, TTL and refresh
//! interval in one place, with environment overrides.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::TtlCache;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::clock::Clock;
use crate::fetch::FetchOptions;
use crate::http_client::HttpClient;
use crate::providers::SourceCatalog;
use crate::resolver::Resolver;
use crate::retry::RetryConfig;
use crate::service::{PriceService, ServiceConfig};
use crate::storage::KeyValueStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name}='{value}' is not a valid {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Feed settings. Durations are plain milliseconds so the struct maps
/// one-to-one onto JSON/TOML and environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
    pub snapshot_ttl_ms: u64,
    pub history_ttl_ms: u64,
    pub stale_window_ms: u64,
    pub ticker_refresh_ms: u64,
    pub chart_refresh_ms: u64,
    pub circuit_breaker: bool,
    pub circuit_failure_threshold: u32,
    pub circuit_open_ms: u64,
    pub backend_url: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            retries: 1,
            backoff_ms: 500,
            snapshot_ttl_ms: 60_000,
            history_ttl_ms: 30 * 60_000,
            stale_window_ms: 10 * 60_000,
            ticker_refresh_ms: 60_000,
            chart_refresh_ms: 45_000,
            circuit_breaker: true,
            circuit_failure_threshold: 3,
            circuit_open_ms: 30_000,
            backend_url: None,
            cache_dir: None,
        }
    }
}

impl FeedConfig {
    /// Defaults overridden by `SATSFEED_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = env_number("SATSFEED_TIMEOUT_MS")? {
            self.timeout_ms = value;
        }
        if let Some(value) = env_number("SATSFEED_RETRIES")? {
            self.retries = value;
        }
        if let Some(value) = env_number("SATSFEED_BACKOFF_MS")? {
            self.backoff_ms = value;
        }
        if let Some(value) = env_number("SATSFEED_SNAPSHOT_TTL_MS")? {
            self.snapshot_ttl_ms = value;
        }
        if let Some(value) = env_number("SATSFEED_HISTORY_TTL_MS")? {
            self.history_ttl_ms = value;
        }
        if let Some(value) = env_number("SATSFEED_STALE_WINDOW_MS")? {
            self.stale_window_ms = value;
        }
        if let Some(value) = env_text("SATSFEED_BACKEND_URL") {
            self.backend_url = Some(value);
        }
        if let Some(value) = env_text("SATSFEED_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_retry(RetryConfig::exponential(
                self.retries,
                Duration::from_millis(self.backoff_ms),
            ))
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            snapshot_ttl: Duration::from_millis(self.snapshot_ttl_ms),
            history_ttl: Duration::from_millis(self.history_ttl_ms),
            stale_window: Duration::from_millis(self.stale_window_ms),
            ..ServiceConfig::default()
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_failure_threshold.max(1),
            open_timeout: Duration::from_millis(self.circuit_open_ms),
        }
    }

    pub fn ticker_refresh(&self) -> Duration {
        Duration::from_millis(self.ticker_refresh_ms)
    }

    pub fn chart_refresh(&self) -> Duration {
        Duration::from_millis(self.chart_refresh_ms)
    }

    /// Configured cache directory, else `$SATSFEED_HOME/cache`, else `~/.satsfeed/cache`.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        if let Some(home) = env::var_os("SATSFEED_HOME").filter(|home| !home.is_empty()) {
            return PathBuf::from(home).join("cache");
        }
        if let Some(home) = env::var_os("HOME") {
            return PathBuf::from(home).join(".satsfeed").join("cache");
        }
        PathBuf::from(".satsfeed").join("cache")
    }

    pub fn resolver(&self, client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Resolver {
        let resolver = Resolver::new(client, self.fetch_options());
        if self.circuit_breaker {
            resolver.with_circuit_breakers(self.circuit_breaker_config(), clock)
        } else {
            resolver
        }
    }

    /// Wires resolver, catalog and cache into a [`PriceService`].
    pub fn build_service(
        &self,
        client: Arc<dyn HttpClient>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> PriceService {
        PriceService::new(
            self.resolver(client, Arc::clone(&clock)),
            SourceCatalog::new(self.backend_url.clone()),
            TtlCache::new(store, clock),
            self.service_config(),
        )
    }
}

fn env_text(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn env_number<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = env_text(name) else {
        return Ok(None);
    };
    raw.parse().map(Some).map_err(|_| ConfigError::InvalidEnv {
        name,
        value: raw,
        expected: "non-negative integer",
    })
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const OVERRIDES: [(&str, &str); 8] = [
        ("SATSFEED_TIMEOUT_MS", "2500"),
        ("SATSFEED_RETRIES", "3"),
        ("SATSFEED_BACKOFF_MS", "250"),
        ("SATSFEED_SNAPSHOT_TTL_MS", "15000"),
        ("SATSFEED_HISTORY_TTL_MS", "120000"),
        ("SATSFEED_STALE_WINDOW_MS", "300000"),
        ("SATSFEED_BACKEND_URL", " https://backend.test "),
        ("SATSFEED_CACHE_DIR", "/var/cache/satsfeed"),
    ];

    fn clear_env() {
        for (name, _) in OVERRIDES {
            env::remove_var(name);
        }
    }

    #[test]
    fn defaults_match_feed_constants() {
        let config = FeedConfig::default();

        assert_eq!(config.fetch_options().timeout, Duration::from_secs(8));
        assert_eq!(config.fetch_options().retry.max_retries, 1);
        assert_eq!(config.service_config(), ServiceConfig::default());
        assert_eq!(config.ticker_refresh(), Duration::from_secs(60));
        assert_eq!(config.chart_refresh(), Duration::from_secs(45));
    }

    #[test]
    fn deserializes_partial_documents_over_defaults() {
        let config: FeedConfig =
            serde_json::from_str(r#"{"timeout_ms": 2500, "backend_url": "https://example.test"}"#)
                .expect("config");

        assert_eq!(config.timeout_ms, 2_500);
        assert_eq!(config.retries, 1);
        assert_eq!(config.backend_url.as_deref(), Some("https://example.test"));
    }

    #[test]
    fn explicit_cache_dir_wins() {
        let config = FeedConfig::default().with_cache_dir("/tmp/satsfeed-test");

        assert_eq!(config.resolve_cache_dir(), PathBuf::from("/tmp/satsfeed-test"));
    }

    #[test]
    #[serial]
    fn environment_overrides_every_setting() {
        clear_env();
        for (name, value) in OVERRIDES {
            env::set_var(name, value);
        }

        let config = FeedConfig::from_env();
        clear_env();
        let config = config.expect("valid overrides");

        let fetch = config.fetch_options();
        assert_eq!(fetch.timeout, Duration::from_millis(2_500));
        assert_eq!(fetch.retry.max_retries, 3);
        assert_eq!(config.backoff_ms, 250);
        assert_eq!(
            config.service_config(),
            ServiceConfig {
                snapshot_ttl: Duration::from_secs(15),
                history_ttl: Duration::from_secs(120),
                stale_window: Duration::from_secs(300),
                ..ServiceConfig::default()
            }
        );
        assert_eq!(config.backend_url.as_deref(), Some("https://backend.test"));
        assert_eq!(config.resolve_cache_dir(), PathBuf::from("/var/cache/satsfeed"));
    }

    #[test]
    #[serial]
    fn unset_or_blank_variables_keep_defaults() {
        clear_env();
        env::set_var("SATSFEED_RETRIES", "   ");

        let config = FeedConfig::from_env();
        clear_env();

        assert_eq!(config, Ok(FeedConfig::default()));
    }

    #[test]
    #[serial]
    fn malformed_number_is_reported_with_its_variable() {
        clear_env();
        env::set_var("SATSFEED_RETRIES", "abc");

        let result = FeedConfig::from_env();
        clear_env();

        assert_eq!(
            result,
            Err(ConfigError::InvalidEnv {
                name: "SATSFEED_RETRIES",
                value: String::from("abc"),
                expected: "non-negative integer",
            })
        );
    }

    #[test]
    #[serial]
    fn negative_timeout_is_rejected() {
        clear_env();
        env::set_var("SATSFEED_TIMEOUT_MS", "-5");

        let result = FeedConfig::default().with_env();
        clear_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv {
                name: "SATSFEED_TIMEOUT_MS",
                ..
            })
        ));
    }
}
