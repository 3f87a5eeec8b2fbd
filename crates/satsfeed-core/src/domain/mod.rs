//! # Domain Models
//!
//! Canonical price types for the BTC feed. Constructors validate their
//! invariants so a bad provider payload surfaces as a [`ValidationError`]
//! instead of a NaN on a chart.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PricePoint`] | One `(time, price)` sample |
//! | [`PriceSeries`] | Sorted, de-duplicated samples |
//! | [`Quote`] | Provider-level price reading |
//! | [`PriceSnapshot`] | Quote stamped with its fetch time |
//! | [`RangeKey`] | History range (`1`, `7`, `30`, `180`, `365`, `max`) |
//! | [`Candle`] | Degenerate OHLC bar synthesized from closes |
//!
//! [`ValidationError`]: crate::ValidationError

mod candle;
mod price;
mod range;
mod series;

pub use candle::{synthesize_candles, Candle};
pub use price::{PricePoint, PriceSnapshot, Quote};
pub use range::{Granularity, RangeKey};
pub use series::{merge_live_sample, PriceSeries, SeriesStats, LIVE_SAMPLE_WINDOW_MS};
