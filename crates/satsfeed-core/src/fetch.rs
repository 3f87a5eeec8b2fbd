//! Single JSON GET with a per-attempt deadline and bounded retry.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest};
use crate::retry::RetryConfig;
use crate::FetchError;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(8_000),
            retry: RetryConfig::default(),
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Fetches `url` and parses the body as JSON.
///
/// Every attempt is raced against `options.timeout`; a pending request is
/// dropped when the deadline fires. Retryable failures are attempted again
/// up to `options.retry.max_retries` times, sleeping `delay_for_attempt(n)`
/// before retry `n`. The last classified error is returned once the budget
/// is spent.
pub async fn fetch_json(
    client: &dyn HttpClient,
    url: &str,
    options: &FetchOptions,
) -> Result<Value, FetchError> {
    let mut attempt: u32 = 0;
    loop {
        match fetch_once(client, url, options.timeout).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(url, attempt, "fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if attempt >= options.retry.max_retries || !options.retry.should_retry(&error) {
                    debug!(url, attempt, code = error.code(), "fetch failed: {error}");
                    return Err(error);
                }

                let delay = options.retry.delay_for_attempt(attempt);
                warn!(
                    url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after {error}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

async fn fetch_once(client: &dyn HttpClient, url: &str, timeout: Duration) -> Result<Value, FetchError> {
    let timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
    let request = HttpRequest::get(url).with_timeout_ms(timeout_ms);

    let response = match tokio::time::timeout(timeout, client.execute(request)).await {
        Ok(result) => result.map_err(|error| classify_transport(error, timeout_ms))?,
        Err(_) => return Err(FetchError::Timeout { timeout_ms }),
    };

    if !response.is_success() {
        return Err(FetchError::Http {
            status: response.status,
        });
    }

    serde_json::from_str(&response.body).map_err(|e| FetchError::Decode {
        message: e.to_string(),
    })
}

fn classify_transport(error: HttpError, timeout_ms: u64) -> FetchError {
    match error.kind() {
        HttpErrorKind::Timeout => FetchError::Timeout { timeout_ms },
        HttpErrorKind::Connect | HttpErrorKind::Other => FetchError::Network {
            message: error.message().to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{ScriptedHttpClient, ScriptedReply};
    use serde_json::json;

    const URL: &str = "https://example.test/price";

    fn quick(max_retries: u32) -> FetchOptions {
        FetchOptions::default()
            .with_timeout(Duration::from_millis(200))
            .with_retry(RetryConfig::fixed(Duration::from_millis(1), max_retries))
    }

    #[tokio::test]
    async fn non_retryable_status_fails_without_retry() {
        let client = ScriptedHttpClient::new();
        client.respond(URL, ScriptedReply::Status(404));

        let error = fetch_json(&client, URL, &quick(3)).await.expect_err("404");

        assert_eq!(error, FetchError::Http { status: 404 });
        assert_eq!(client.calls(URL), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let client = ScriptedHttpClient::new();
        client.respond(URL, ScriptedReply::Body(String::from("<html>")));

        let error = fetch_json(&client, URL, &quick(2)).await.expect_err("html");

        assert!(matches!(error, FetchError::Decode { .. }));
        assert_eq!(client.calls(URL), 1);
    }

    #[tokio::test]
    async fn network_error_is_retried() {
        let client = ScriptedHttpClient::new();
        client.script(
            URL,
            [ScriptedReply::NetworkError, ScriptedReply::Json(json!({"usd": 1}))],
        );

        let value = fetch_json(&client, URL, &quick(1)).await.expect("second attempt");

        assert_eq!(value, json!({"usd": 1}));
        assert_eq!(client.calls(URL), 2);
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let client = ScriptedHttpClient::new();
        client.respond(
            URL,
            ScriptedReply::delayed(Duration::from_secs(5), ScriptedReply::Json(json!({}))),
        );
        let options = FetchOptions::default()
            .with_timeout(Duration::from_millis(20))
            .with_retry(RetryConfig::no_retry());

        let error = fetch_json(&client, URL, &options).await.expect_err("deadline");

        assert_eq!(error, FetchError::Timeout { timeout_ms: 20 });
    }
}
