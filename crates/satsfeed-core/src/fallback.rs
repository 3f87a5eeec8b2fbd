//! Built-in last-resort data shown when nothing is cached or fetchable.

use crate::clock::EpochMillis;
use crate::{PricePoint, PriceSeries, RangeKey};

pub const FALLBACK_PRICE_USD: f64 = 69_000.0;

/// 2009-01-03, the genesis block.
pub const GENESIS_MS: EpochMillis = 1_230_940_800_000;

const GENESIS_MIN_PRICE: f64 = 0.05;
const GENESIS_PRICE_RATIO: f64 = 0.0015;

const SIX_MONTHS: [(EpochMillis, f64); 12] = [
    (1_702_598_400_000, 42_400.0), // 2023-12-15
    (1_705_276_800_000, 42_850.0),
    (1_706_745_600_000, 43_650.0),
    (1_707_955_200_000, 51_800.0),
    (1_709_251_200_000, 61_200.0),
    (1_710_460_800_000, 70_050.0),
    (1_711_929_600_000, 65_900.0),
    (1_713_139_200_000, 64_020.0),
    (1_714_521_600_000, 57_480.0),
    (1_715_731_200_000, 64_040.0),
    (1_717_200_000_000, 67_810.0),
    (1_718_409_600_000, 71_100.0), // 2024-06-15
];

const FULL: [(EpochMillis, f64); 12] = [
    (GENESIS_MS, 0.05),
    (1_279_324_800_000, 0.09), // 2010-07-17
    (1_306_886_400_000, 9.5),
    (1_354_320_000_000, 13.5),
    (1_385_769_600_000, 1_163.0),
    (1_421_193_600_000, 177.0),
    (1_513_468_800_000, 19_497.0), // 2017-12-17
    (1_544_832_000_000, 3_220.0),
    (1_609_372_800_000, 28_940.0),
    (1_636_502_400_000, 68_789.0), // 2021-11-10
    (1_668_988_800_000, 15_760.0),
    (1_718_409_600_000, 71_100.0),
];

fn series(points: &[(EpochMillis, f64)]) -> PriceSeries {
    PriceSeries::from_points(points.iter().map(|&(time, price)| PricePoint { time, price }))
}

pub fn six_month_history() -> PriceSeries {
    series(&SIX_MONTHS)
}

pub fn full_history() -> PriceSeries {
    series(&FULL)
}

/// Fallback series for a range: the full dataset for `max`, the six-month one otherwise.
pub fn history_for(range: RangeKey) -> PriceSeries {
    match range {
        RangeKey::Max => full_history(),
        _ => six_month_history(),
    }
}

/// Prepends a genesis anchor at `max(0.05, first * 0.0015)` when the series
/// starts after 2009-01-03.
pub fn extend_to_genesis(series: &PriceSeries) -> PriceSeries {
    match series.first() {
        Some(first) if first.time > GENESIS_MS => {
            let anchor = PricePoint {
                time: GENESIS_MS,
                price: GENESIS_MIN_PRICE.max(first.price * GENESIS_PRICE_RATIO),
            };
            PriceSeries::from_points(std::iter::once(anchor).chain(series.points().iter().copied()))
        }
        _ => series.clone(),
    }
}
