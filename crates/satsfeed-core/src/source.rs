use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{InvalidData, ValidationError};

/// Canonical provider identifiers used in resolution results and status labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// The site's own JSON proxy (`/api/btc/...`).
    Backend,
    CoinGecko,
    CoinCap,
    Coinbase,
    Binance,
    Kraken,
}

impl ProviderId {
    pub const ALL: [Self; 6] = [
        Self::Backend,
        Self::CoinGecko,
        Self::CoinCap,
        Self::Coinbase,
        Self::Binance,
        Self::Kraken,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::CoinGecko => "coingecko",
            Self::CoinCap => "coincap",
            Self::Coinbase => "coinbase",
            Self::Binance => "binance",
            Self::Kraken => "kraken",
        }
    }

    /// Human-facing name, as in "Live via Binance".
    pub const fn label(self) -> &'static str {
        match self {
            Self::Backend => "Backend",
            Self::CoinGecko => "CoinGecko",
            Self::CoinCap => "CoinCap",
            Self::Coinbase => "Coinbase",
            Self::Binance => "Binance",
            Self::Kraken => "Kraken",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "coingecko" => Ok(Self::CoinGecko),
            "coincap" => Ok(Self::CoinCap),
            "coinbase" => Ok(Self::Coinbase),
            "binance" => Ok(Self::Binance),
            "kraken" => Ok(Self::Kraken),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Payload-to-domain mapping for one provider response shape.
pub type ParseFn<T> = Arc<dyn Fn(&Value) -> Result<T, InvalidData> + Send + Sync>;

/// One entry in an ordered resolution chain.
pub struct Source<T> {
    pub provider: ProviderId,
    pub url: String,
    parse: ParseFn<T>,
}

impl<T> Source<T> {
    pub fn new<F>(provider: ProviderId, url: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&Value) -> Result<T, InvalidData> + Send + Sync + 'static,
    {
        Self {
            provider,
            url: url.into(),
            parse: Arc::new(parse),
        }
    }

    pub fn parse(&self, payload: &Value) -> Result<T, InvalidData> {
        (self.parse)(payload)
    }
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider,
            url: self.url.clone(),
            parse: Arc::clone(&self.parse),
        }
    }
}

impl<T> Debug for Source<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_ids_case_insensitively() {
        assert_eq!("Binance".parse::<ProviderId>(), Ok(ProviderId::Binance));
        assert_eq!(" coingecko ".parse::<ProviderId>(), Ok(ProviderId::CoinGecko));
        assert!(matches!(
            "bitstamp".parse::<ProviderId>(),
            Err(ValidationError::InvalidProvider { .. })
        ));
    }

    #[test]
    fn labels_are_display_names() {
        assert_eq!(ProviderId::Coinbase.label(), "Coinbase");
        assert_eq!(ProviderId::Coinbase.to_string(), "coinbase");
    }
}
