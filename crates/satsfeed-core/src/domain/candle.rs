use serde::{Deserialize, Serialize};

use crate::clock::EpochMillis;
use crate::PricePoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: EpochMillis,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// Builds degenerate OHLC bars from close-only data: `open` is the previous
/// close (the first bar opens at its own close), `high`/`low` bound the body.
pub fn synthesize_candles(points: &[PricePoint]) -> Vec<Candle> {
    let mut previous_close: Option<f64> = None;
    points
        .iter()
        .map(|point| {
            let open = previous_close.unwrap_or(point.price);
            let close = point.price;
            previous_close = Some(close);
            Candle {
                time: point.time,
                open,
                high: open.max(close),
                low: open.min(close),
                close,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_at_previous_close() {
        let points = [
            PricePoint { time: 0, price: 100.0 },
            PricePoint { time: 1, price: 90.0 },
            PricePoint { time: 2, price: 95.0 },
        ];

        let candles = synthesize_candles(&points);

        assert_eq!(
            candles[0],
            Candle { time: 0, open: 100.0, high: 100.0, low: 100.0, close: 100.0 }
        );
        assert_eq!(
            candles[1],
            Candle { time: 1, open: 100.0, high: 100.0, low: 90.0, close: 90.0 }
        );
        assert!(!candles[1].is_up());
        assert!(candles[2].is_up());
        assert_eq!(candles[2].low, 90.0);
    }
}
