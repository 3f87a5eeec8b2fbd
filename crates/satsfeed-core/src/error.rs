use thiserror::Error;

use crate::ProviderId;

/// Validation errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' must be at most {max}")]
    AboveMaximum { field: &'static str, max: u32 },

    #[error("invalid range '{value}', expected one of 1, 7, 30, 180, 365, max")]
    InvalidRange { value: String },
    #[error("invalid provider '{value}', expected one of backend, coingecko, coincap, coinbase, binance, kraken")]
    InvalidProvider { value: String },
    #[error("invalid {field} '{value}'")]
    InvalidChoice { field: &'static str, value: String },
}

/// Classified failure of a single fetch (after the retry budget is spent).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("response body is not valid JSON: {message}")]
    Decode { message: String },
}

impl FetchError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "fetch.timeout",
            Self::Http { .. } => "fetch.http",
            Self::Network { .. } => "fetch.network",
            Self::Decode { .. } => "fetch.decode",
        }
    }
}

/// A source answered at the transport level but the payload failed domain validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidData(pub String);

impl InvalidData {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ValidationError> for InvalidData {
    fn from(error: ValidationError) -> Self {
        Self(error.to_string())
    }
}

/// Why one source in a resolution chain was passed over.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid data: {0}")]
    InvalidData(#[from] InvalidData),
    #[error("circuit breaker is open; upstream call skipped")]
    CircuitOpen,
}

/// One failed source, recorded by the resolver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{provider}: {reason}")]
pub struct SourceFailure {
    pub provider: ProviderId,
    pub reason: FailureReason,
}

impl SourceFailure {
    pub fn new(provider: ProviderId, reason: impl Into<FailureReason>) -> Self {
        Self {
            provider,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("all {} source(s) failed", .failures.len())]
    AllSourcesFailed { failures: Vec<SourceFailure> },
}

impl ResolveError {
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            Self::AllSourcesFailed { failures } => failures,
        }
    }
}

/// Hard failure surfaced by the price service: nothing cached, nothing fetchable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("'{key}' is unavailable: nothing cached and every source failed")]
    Unavailable {
        key: String,
        failures: Vec<SourceFailure>,
    },
}

impl ServiceError {
    pub(crate) fn unavailable(key: impl Into<String>, error: ResolveError) -> Self {
        let ResolveError::AllSourcesFailed { failures } = error;
        Self::Unavailable {
            key: key.into(),
            failures,
        }
    }

    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            Self::Unavailable { failures, .. } => failures,
        }
    }
}
