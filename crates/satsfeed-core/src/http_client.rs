use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

/// GET request envelope used by the fetch wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::from([(String::from("accept"), String::from("application/json"))]),
            timeout_ms: 8_000,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport failure category; statuses are not errors at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Timeout,
    Connect,
    Other,
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Connect,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Async transport contract; implementations must be shareable across tasks.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production HTTP client using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("satsfeed/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            // The fetch wrapper enforces its own deadline; this one only bounds stuck sockets.
            builder = builder.timeout(Duration::from_millis(request.timeout_ms.saturating_add(1_000)));

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::connect(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// One canned reply for [`ScriptedHttpClient`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Status(u16),
    Json(Value),
    /// Raw 200 body, useful for malformed-JSON cases.
    Body(String),
    NetworkError,
    Delayed(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    pub fn delayed(delay: Duration, reply: ScriptedReply) -> Self {
        Self::Delayed(delay, Box::new(reply))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: HashMap<String, VecDeque<ScriptedReply>>,
    calls: HashMap<String, usize>,
}

/// Deterministic offline transport: per-URL reply queues with call counting.
///
/// Replies are consumed in order and the last one repeats. Unknown URLs fail
/// with a connect error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHttpClient {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: impl Into<String>, replies: impl IntoIterator<Item = ScriptedReply>) -> &Self {
        let mut state = self.state.lock().expect("script lock is not poisoned");
        state
            .replies
            .entry(url.into())
            .or_default()
            .extend(replies);
        self
    }

    pub fn respond(&self, url: impl Into<String>, reply: ScriptedReply) -> &Self {
        self.script(url, [reply])
    }

    pub fn calls(&self, url: &str) -> usize {
        let state = self.state.lock().expect("script lock is not poisoned");
        state.calls.get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().expect("script lock is not poisoned");
        state.calls.values().sum()
    }

    fn next_reply(&self, url: &str) -> Option<ScriptedReply> {
        let mut state = self.state.lock().expect("script lock is not poisoned");
        *state.calls.entry(url.to_owned()).or_default() += 1;
        let queue = state.replies.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let reply = self.next_reply(&request.url);
        Box::pin(async move {
            let mut reply = match reply {
                Some(reply) => reply,
                None => {
                    return Err(HttpError::connect(format!(
                        "no scripted reply for {}",
                        request.url
                    )))
                }
            };
            loop {
                match reply {
                    ScriptedReply::Delayed(delay, inner) => {
                        tokio::time::sleep(delay).await;
                        reply = *inner;
                    }
                    ScriptedReply::Status(status) => {
                        return Ok(HttpResponse {
                            status,
                            body: String::from("{}"),
                        })
                    }
                    ScriptedReply::Json(value) => return Ok(HttpResponse::ok_json(value.to_string())),
                    ScriptedReply::Body(body) => return Ok(HttpResponse::ok_json(body)),
                    ScriptedReply::NetworkError => {
                        return Err(HttpError::connect("scripted network failure"))
                    }
                }
            }
        })
    }
}
