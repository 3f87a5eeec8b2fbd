use std::fmt::{Display, Formatter};

use satsfeed_core::{FeedStatus, ProviderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request identifier (UUID v4) for end-to-end request tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Envelope metadata. Field order is fixed so output diffs stay readable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub request_id: RequestId,
    pub schema_version: &'static str,
    /// Providers contacted, in order.
    pub source_chain: Vec<ProviderId>,
    pub source: Option<ProviderId>,
    pub status: Option<FeedStatus>,
    pub stale: bool,
    #[serde(serialize_with = "serialize_u64_decimal")]
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metadata {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            request_id: RequestId::new_v4(),
            schema_version: "v1",
            source_chain: Vec::new(),
            source: None,
            status: None,
            stale: false,
            latency_ms,
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// `{ "meta": ..., "data": ..., "errors": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub meta: Metadata,
    pub data: T,
    pub errors: Vec<String>,
}

fn serialize_u64_decimal<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(*value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_uuid_v4() {
        let request_id = RequestId::new_v4();
        assert_eq!(request_id.0.get_version_num(), 4);
    }

    #[test]
    fn envelope_serializes_meta_first_and_skips_empty_warnings() {
        let mut meta = Metadata::new(4_200);
        meta.status = Some(FeedStatus::Delayed);
        meta.source_chain = vec![ProviderId::CoinGecko, ProviderId::Binance];
        let envelope = Envelope {
            meta,
            data: serde_json::json!({"price": 61_000.0}),
            errors: Vec::new(),
        };

        let rendered = serde_json::to_string(&envelope).expect("serializes");

        assert!(rendered.starts_with("{\"meta\":{\"request_id\":"));
        assert!(rendered.contains("\"latency_ms\":4200"));
        assert!(rendered.contains("\"status\":\"delayed\""));
        assert!(rendered.contains("\"source_chain\":[\"coingecko\",\"binance\"]"));
        assert!(!rendered.contains("warnings"));
    }
}
