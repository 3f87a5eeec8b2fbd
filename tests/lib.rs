// Shared fixtures for the behavior suites
pub use satsfeed_core::{PricePoint, PriceSeries, ScriptedReply};
pub use serde_json::{json, Value};

pub const DAY_MS: i64 = 86_400_000;

/// CoinGecko `/coins/bitcoin` payload with a +1.25% day.
pub fn coin_detail(price: f64) -> ScriptedReply {
    ScriptedReply::Json(json!({
        "market_data": {
            "current_price": {"usd": price},
            "price_change_percentage_24h": 1.25,
            "high_24h": {"usd": price + 500.0},
            "ath": {"usd": 73_750.07},
            "ath_date": {"usd": "2024-03-14T07:10:36.635Z"}
        }
    }))
}

pub fn coinbase_spot(amount: &str) -> ScriptedReply {
    ScriptedReply::Json(json!({"data": {"amount": amount, "currency": "USD"}}))
}

/// `{"prices": [[ms, price], ...]}`
pub fn market_chart(points: &[(i64, f64)]) -> ScriptedReply {
    let prices: Vec<Value> = points.iter().map(|&(time, price)| json!([time, price])).collect();
    ScriptedReply::Json(json!({ "prices": prices }))
}

/// Daily series starting at t=0.
pub fn daily_series(prices: &[f64]) -> PriceSeries {
    PriceSeries::from_points(
        prices
            .iter()
            .enumerate()
            .map(|(index, &price)| PricePoint {
                time: index as i64 * DAY_MS,
                price,
            }),
    )
}
