//! Side-by-side spot prices from the exchanges, with the spread between them.

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::fetch::{fetch_json, FetchOptions};
use crate::http_client::HttpClient;
use crate::providers::exchange_sources;
use crate::{ProviderId, Quote, Source, SourceFailure};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangePrice {
    pub exchange: ProviderId,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    pub low: f64,
    pub high: f64,
    /// `(high - low) / mid * 10_000`, rounded to 2 decimals.
    pub basis_points: f64,
    /// `(high - low) / low * 100`, rounded to 4 decimals.
    pub percent: f64,
}

impl Spread {
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        let low = prices.iter().copied().reduce(f64::min)?;
        let high = prices.iter().copied().reduce(f64::max)?;
        let mid = (low + high) / 2.0;
        let basis_points = if mid > 0.0 {
            (high - low) / mid * 10_000.0
        } else {
            0.0
        };
        let percent = if low > 0.0 {
            (high - low) / low * 100.0
        } else {
            0.0
        };
        Some(Self {
            low,
            high,
            basis_points: round_to(basis_points, 2),
            percent: round_to(percent, 4),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeComparison {
    pub exchanges: Vec<ExchangePrice>,
    #[serde(skip)]
    pub failures: Vec<SourceFailure>,
    pub errors: Vec<String>,
    pub spread: Spread,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompareError {
    #[error("no exchange prices available")]
    NoPrices { failures: Vec<SourceFailure> },
}

impl CompareError {
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            Self::NoPrices { failures } => failures,
        }
    }
}

/// Queries every exchange concurrently. Individual failures are reported
/// alongside the prices; the call fails only when none answered.
pub async fn compare(
    client: &dyn HttpClient,
    options: &FetchOptions,
) -> Result<ExchangeComparison, CompareError> {
    compare_sources(client, options, &exchange_sources()).await
}

pub async fn compare_sources(
    client: &dyn HttpClient,
    options: &FetchOptions,
    sources: &[Source<Quote>],
) -> Result<ExchangeComparison, CompareError> {
    let results = join_all(sources.iter().map(|source| query(client, options, source))).await;

    let mut exchanges = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(price) => exchanges.push(price),
            Err(failure) => {
                warn!(provider = %failure.provider, "exchange price unavailable: {}", failure.reason);
                failures.push(failure);
            }
        }
    }

    let prices: Vec<f64> = exchanges.iter().map(|entry| entry.price).collect();
    let Some(spread) = Spread::from_prices(&prices) else {
        return Err(CompareError::NoPrices { failures });
    };
    debug!(answered = exchanges.len(), bps = spread.basis_points, "exchange comparison ready");

    Ok(ExchangeComparison {
        errors: failures.iter().map(ToString::to_string).collect(),
        exchanges,
        failures,
        spread,
    })
}

async fn query(
    client: &dyn HttpClient,
    options: &FetchOptions,
    source: &Source<Quote>,
) -> Result<ExchangePrice, SourceFailure> {
    let payload = fetch_json(client, &source.url, options)
        .await
        .map_err(|error| SourceFailure::new(source.provider, error))?;
    let quote = source
        .parse(&payload)
        .map_err(|error| SourceFailure::new(source.provider, error))?;
    Ok(ExchangePrice {
        exchange: source.provider,
        price: quote.price,
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
