use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakers};
use crate::clock::Clock;
use crate::fetch::{fetch_json, FetchOptions};
use crate::http_client::HttpClient;
use crate::{FailureReason, ProviderId, ResolveError, Source, SourceFailure};

/// First successful source of a chain, plus what was skipped to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ProviderId,
    pub source_chain: Vec<ProviderId>,
    pub failures: Vec<SourceFailure>,
    pub latency_ms: u64,
}

impl<T> Resolved<T> {
    pub fn used_fallback(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            source: self.source,
            source_chain: self.source_chain,
            failures: self.failures,
            latency_ms: self.latency_ms,
        }
    }
}

/// Tries an ordered list of equivalent sources, one at a time.
#[derive(Clone)]
pub struct Resolver {
    client: Arc<dyn HttpClient>,
    options: FetchOptions,
    breakers: Option<Arc<CircuitBreakers>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("options", &self.options)
            .field("breakers", &self.breakers)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(client: Arc<dyn HttpClient>, options: FetchOptions) -> Self {
        Self {
            client,
            options,
            breakers: None,
        }
    }

    /// Enables a per-provider circuit breaker shared by every clone of this resolver.
    pub fn with_circuit_breakers(mut self, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        self.breakers = Some(Arc::new(CircuitBreakers::new(config, clock)));
        self
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    pub fn breakers(&self) -> Option<&CircuitBreakers> {
        self.breakers.as_deref()
    }

    /// Returns the first source whose fetch and parse both succeed.
    ///
    /// Sources after the winner are never contacted. Fetch errors, invalid
    /// payloads and open circuits are recorded per source; only when every
    /// source fails does this return [`ResolveError::AllSourcesFailed`].
    pub async fn resolve<T>(&self, sources: &[Source<T>]) -> Result<Resolved<T>, ResolveError> {
        let started = Instant::now();
        let mut source_chain = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();

        for source in sources {
            source_chain.push(source.provider);
            match self.try_source(source).await {
                Ok(value) => {
                    if failures.is_empty() {
                        debug!(provider = %source.provider, "resolved from primary source");
                    } else {
                        info!(
                            provider = %source.provider,
                            skipped = failures.len(),
                            "resolved from fallback source"
                        );
                    }
                    return Ok(Resolved {
                        value,
                        source: source.provider,
                        source_chain,
                        failures,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(reason) => {
                    warn!(provider = %source.provider, url = %source.url, "source failed: {reason}");
                    failures.push(SourceFailure::new(source.provider, reason));
                }
            }
        }

        Err(ResolveError::AllSourcesFailed { failures })
    }

    async fn try_source<T>(&self, source: &Source<T>) -> Result<T, FailureReason> {
        if let Some(breakers) = &self.breakers {
            if !breakers.for_provider(source.provider).allow_request() {
                return Err(FailureReason::CircuitOpen);
            }
        }

        let outcome = match fetch_json(self.client.as_ref(), &source.url, &self.options).await {
            Ok(payload) => source.parse(&payload).map_err(FailureReason::from),
            Err(error) => Err(FailureReason::from(error)),
        };

        if let Some(breakers) = &self.breakers {
            breakers.record(source.provider, outcome.is_ok());
        }
        outcome
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    let elapsed = started.elapsed().as_millis();
    if elapsed > u128::from(u64::MAX) {
        u64::MAX
    } else {
        elapsed as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http_client::{ScriptedHttpClient, ScriptedReply};
    use crate::retry::RetryConfig;
    use crate::{InvalidData, Quote};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn price_at(payload: &Value) -> Result<Quote, InvalidData> {
        let price = payload
            .get("price")
            .and_then(Value::as_f64)
            .ok_or_else(|| InvalidData::new("missing price"))?;
        Ok(Quote::new(price)?)
    }

    fn resolver(client: &ScriptedHttpClient) -> Resolver {
        Resolver::new(
            Arc::new(client.clone()),
            FetchOptions::default()
                .with_timeout(Duration::from_millis(200))
                .with_retry(RetryConfig::no_retry()),
        )
    }

    #[tokio::test]
    async fn invalid_payload_falls_through_to_next_source() {
        let client = ScriptedHttpClient::new();
        client.respond("https://a.test", ScriptedReply::Json(json!({"price": -5.0})));
        client.respond("https://b.test", ScriptedReply::Json(json!({"price": 10.0})));
        let sources = [
            Source::new(ProviderId::CoinGecko, "https://a.test", price_at),
            Source::new(ProviderId::CoinCap, "https://b.test", price_at),
        ];

        let resolved = resolver(&client).resolve(&sources).await.expect("b wins");

        assert_eq!(resolved.source, ProviderId::CoinCap);
        assert_eq!(resolved.value.price, 10.0);
        assert!(matches!(
            resolved.failures[0].reason,
            FailureReason::InvalidData(_)
        ));
        assert_eq!(resolved.source_chain, vec![ProviderId::CoinGecko, ProviderId::CoinCap]);
    }

    #[tokio::test]
    async fn empty_chain_fails_with_no_failures() {
        let client = ScriptedHttpClient::new();
        let sources: [Source<Quote>; 0] = [];

        let error = resolver(&client).resolve(&sources).await.expect_err("nothing to try");

        assert!(error.failures().is_empty());
    }

    #[tokio::test]
    async fn open_circuit_skips_the_network() {
        let client = ScriptedHttpClient::new();
        client.respond("https://a.test", ScriptedReply::Status(500));
        client.respond("https://b.test", ScriptedReply::Json(json!({"price": 1.0})));
        let clock = Arc::new(ManualClock::new(0));
        let resolver = resolver(&client).with_circuit_breakers(
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_secs(30),
            },
            clock.clone(),
        );
        let sources = [
            Source::new(ProviderId::Binance, "https://a.test", price_at),
            Source::new(ProviderId::Kraken, "https://b.test", price_at),
        ];

        resolver.resolve(&sources).await.expect("first pass");
        let second = resolver.resolve(&sources).await.expect("second pass");

        assert_eq!(client.calls("https://a.test"), 1);
        assert_eq!(second.failures[0].reason, FailureReason::CircuitOpen);

        clock.advance(Duration::from_secs(30));
        resolver.resolve(&sources).await.expect("half-open pass");
        assert_eq!(client.calls("https://a.test"), 2);
    }
}
