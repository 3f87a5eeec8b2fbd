use serde::{Deserialize, Serialize};

use crate::clock::{parse_rfc3339_ms, EpochMillis};
use crate::ValidationError;

/// One price sample in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: EpochMillis,
    pub price: f64,
}

impl PricePoint {
    pub fn new(time: EpochMillis, price: f64) -> Result<Self, ValidationError> {
        validate_price("price", price)?;
        Ok(Self { time, price })
    }
}

/// Price reading as a provider reports it, before it is stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub change_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub ath_price: Option<f64>,
    pub ath_date: Option<EpochMillis>,
}

impl Quote {
    pub fn new(price: f64) -> Result<Self, ValidationError> {
        validate_price("price", price)?;
        Ok(Self {
            price,
            change_24h: None,
            high_24h: None,
            ath_price: None,
            ath_date: None,
        })
    }

    /// Non-finite changes are dropped rather than rejected; the price is what matters.
    pub fn with_change_24h(mut self, change: Option<f64>) -> Self {
        self.change_24h = change.filter(|change| change.is_finite());
        self
    }

    pub fn with_high_24h(mut self, high: Option<f64>) -> Self {
        self.high_24h = high.filter(|high| high.is_finite() && *high > 0.0);
        self
    }

    /// `date` is RFC 3339; an unparseable date is dropped.
    pub fn with_ath(mut self, price: Option<f64>, date: Option<&str>) -> Self {
        self.ath_price = price.filter(|price| price.is_finite() && *price > 0.0);
        self.ath_date = date.and_then(parse_rfc3339_ms);
        self
    }
}

/// Point-in-time market summary. Replaced whole, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub price: f64,
    pub change_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub ath_price: Option<f64>,
    pub ath_date: Option<EpochMillis>,
    pub updated_at: EpochMillis,
}

impl PriceSnapshot {
    pub fn from_quote(quote: Quote, updated_at: EpochMillis) -> Self {
        Self {
            price: quote.price,
            change_24h: quote.change_24h,
            high_24h: quote.high_24h,
            ath_price: quote.ath_price,
            ath_date: quote.ath_date,
            updated_at,
        }
    }

    pub fn as_point(&self) -> PricePoint {
        PricePoint {
            time: self.updated_at,
            price: self.price,
        }
    }
}

fn validate_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_and_non_positive_prices() {
        assert!(matches!(
            PricePoint::new(0, f64::NAN),
            Err(ValidationError::NonFiniteValue { field: "price" })
        ));
        assert!(matches!(
            PricePoint::new(0, f64::INFINITY),
            Err(ValidationError::NonFiniteValue { .. })
        ));
        assert!(matches!(
            Quote::new(0.0),
            Err(ValidationError::NonPositiveValue { .. })
        ));
        assert!(PricePoint::new(0, 0.01).is_ok());
    }

    #[test]
    fn quote_drops_unusable_optional_fields() {
        let quote = Quote::new(61_000.0)
            .expect("valid")
            .with_change_24h(Some(f64::NAN))
            .with_high_24h(Some(-1.0))
            .with_ath(Some(73_750.0), Some("  "));

        assert_eq!(quote.change_24h, None);
        assert_eq!(quote.high_24h, None);
        assert_eq!(quote.ath_price, Some(73_750.0));
        assert_eq!(quote.ath_date, None);
    }

    #[test]
    fn ath_date_is_parsed_to_epoch_millis() {
        let quote = Quote::new(61_000.0)
            .expect("valid")
            .with_ath(Some(73_750.07), Some("2024-03-14T07:10:36.635Z"));
        let unparseable = Quote::new(61_000.0)
            .expect("valid")
            .with_ath(None, Some("14 March 2024"));

        assert_eq!(quote.ath_date, Some(1_710_400_236_635));
        assert_eq!(unparseable.ath_date, None);
    }
}
