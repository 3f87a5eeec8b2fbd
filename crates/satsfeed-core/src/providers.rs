//! Provider endpoints and their response parsers.
//!
//! Each parser maps one provider's JSON shape into a domain value and rejects
//! payloads that fail domain validation with [`InvalidData`].

use serde::Deserialize;
use serde_json::Value;

use crate::{InvalidData, PricePoint, PriceSeries, ProviderId, Quote, RangeKey, Source};

pub const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";
pub const COINGECKO_SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd&include_24hr_change=true";
pub const COINGECKO_COIN_URL: &str = "https://api.coingecko.com/api/v3/coins/bitcoin?localization=false&tickers=false&community_data=false&developer_data=false&sparkline=false";
pub const COINCAP_ASSET_URL: &str = "https://api.coincap.io/v2/assets/bitcoin";
pub const COINBASE_SPOT_URL: &str = "https://api.coinbase.com/v2/prices/BTC-USD/spot";
pub const BINANCE_TICKER_URL: &str = "https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT";
pub const KRAKEN_TICKER_URL: &str = "https://api.kraken.com/0/public/Ticker?pair=XBTUSD";

pub fn coingecko_market_chart_url(range: RangeKey) -> String {
    format!(
        "{COINGECKO_API}/coins/bitcoin/market_chart?vs_currency=usd&days={}",
        urlencoding::encode(range.as_str())
    )
}

pub fn backend_snapshot_url(base: &str) -> String {
    format!("{}/api/btc/snapshot", base.trim_end_matches('/'))
}

pub fn backend_history_url(base: &str, range: RangeKey) -> String {
    format!(
        "{}/api/btc/history?days={}",
        base.trim_end_matches('/'),
        urlencoding::encode(range.as_str())
    )
}

/// Builds the ordered source chains used by the price service.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    backend_url: Option<String>,
}

impl SourceCatalog {
    pub fn new(backend_url: Option<String>) -> Self {
        Self {
            backend_url: backend_url.filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn backend_url(&self) -> Option<&str> {
        self.backend_url.as_deref()
    }

    /// Backend, CoinGecko detail, CoinGecko simple, CoinCap, Coinbase, Binance, Kraken.
    pub fn snapshot_sources(&self) -> Vec<Source<Quote>> {
        let mut sources = Vec::with_capacity(7);
        if let Some(base) = &self.backend_url {
            sources.push(Source::new(
                ProviderId::Backend,
                backend_snapshot_url(base),
                parse_coingecko_coin,
            ));
        }
        sources.push(Source::new(
            ProviderId::CoinGecko,
            COINGECKO_COIN_URL,
            parse_coingecko_coin,
        ));
        sources.push(Source::new(
            ProviderId::CoinGecko,
            COINGECKO_SIMPLE_PRICE_URL,
            parse_coingecko_simple,
        ));
        sources.push(Source::new(
            ProviderId::CoinCap,
            COINCAP_ASSET_URL,
            parse_coincap_asset,
        ));
        sources.extend(exchange_sources());
        sources
    }

    /// Backend history first (when configured), then the CoinGecko market chart.
    pub fn history_sources(&self, range: RangeKey) -> Vec<Source<PriceSeries>> {
        let mut sources = Vec::with_capacity(2);
        if let Some(base) = &self.backend_url {
            sources.push(Source::new(
                ProviderId::Backend,
                backend_history_url(base, range),
                parse_market_chart,
            ));
        }
        sources.push(Source::new(
            ProviderId::CoinGecko,
            coingecko_market_chart_url(range),
            parse_market_chart,
        ));
        sources
    }
}

/// Spot tickers from the three exchanges, in fallback order.
pub fn exchange_sources() -> Vec<Source<Quote>> {
    vec![
        Source::new(ProviderId::Coinbase, COINBASE_SPOT_URL, parse_coinbase_spot),
        Source::new(ProviderId::Binance, BINANCE_TICKER_URL, parse_binance_ticker),
        Source::new(ProviderId::Kraken, KRAKEN_TICKER_URL, parse_kraken_ticker),
    ]
}

#[derive(Debug, Deserialize)]
struct UsdField<T> {
    usd: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoCoin {
    market_data: CoinGeckoMarketData,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoMarketData {
    current_price: UsdField<f64>,
    price_change_percentage_24h: Option<f64>,
    high_24h: Option<UsdField<f64>>,
    ath: Option<UsdField<f64>>,
    ath_date: Option<UsdField<String>>,
}

pub fn parse_coingecko_coin(payload: &Value) -> Result<Quote, InvalidData> {
    let coin: CoinGeckoCoin = decode(payload, "coingecko coin")?;
    let market = coin.market_data;
    let price = market
        .current_price
        .usd
        .ok_or_else(|| InvalidData::new("coingecko coin: missing market_data.current_price.usd"))?;

    let ath_date = market.ath_date.and_then(|date| date.usd);

    Ok(Quote::new(price)?
        .with_change_24h(market.price_change_percentage_24h)
        .with_high_24h(market.high_24h.and_then(|high| high.usd))
        .with_ath(market.ath.and_then(|ath| ath.usd), ath_date.as_deref()))
}

#[derive(Debug, Deserialize)]
struct CoinGeckoSimple {
    bitcoin: CoinGeckoSimpleEntry,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoSimpleEntry {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
}

pub fn parse_coingecko_simple(payload: &Value) -> Result<Quote, InvalidData> {
    let simple: CoinGeckoSimple = decode(payload, "coingecko simple price")?;
    let price = simple
        .bitcoin
        .usd
        .ok_or_else(|| InvalidData::new("coingecko simple price: missing bitcoin.usd"))?;
    Ok(Quote::new(price)?.with_change_24h(simple.bitcoin.usd_24h_change))
}

#[derive(Debug, Deserialize)]
struct CoinCapAsset {
    data: CoinCapAssetData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinCapAssetData {
    price_usd: Option<String>,
    change_percent24_hr: Option<String>,
}

pub fn parse_coincap_asset(payload: &Value) -> Result<Quote, InvalidData> {
    let asset: CoinCapAsset = decode(payload, "coincap asset")?;
    let price = asset
        .data
        .price_usd
        .as_deref()
        .ok_or_else(|| InvalidData::new("coincap asset: missing data.priceUsd"))
        .and_then(|raw| parse_decimal(raw, "coincap priceUsd"))?;
    let change = asset
        .data
        .change_percent24_hr
        .as_deref()
        .and_then(|raw| raw.trim().parse::<f64>().ok());
    Ok(Quote::new(price)?.with_change_24h(change))
}

#[derive(Debug, Deserialize)]
struct CoinbaseSpot {
    data: CoinbaseSpotData,
}

#[derive(Debug, Deserialize)]
struct CoinbaseSpotData {
    amount: String,
}

pub fn parse_coinbase_spot(payload: &Value) -> Result<Quote, InvalidData> {
    let spot: CoinbaseSpot = decode(payload, "coinbase spot")?;
    let price = parse_decimal(&spot.data.amount, "coinbase amount")?;
    Ok(Quote::new(price)?)
}

#[derive(Debug, Deserialize)]
struct BinanceTicker {
    price: String,
}

pub fn parse_binance_ticker(payload: &Value) -> Result<Quote, InvalidData> {
    let ticker: BinanceTicker = decode(payload, "binance ticker")?;
    let price = parse_decimal(&ticker.price, "binance price")?;
    Ok(Quote::new(price)?)
}

#[derive(Debug, Deserialize)]
struct KrakenTicker {
    #[serde(default)]
    error: Vec<String>,
    result: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct KrakenPair {
    /// Last trade closed: `[price, lot volume]`.
    c: Vec<String>,
}

pub fn parse_kraken_ticker(payload: &Value) -> Result<Quote, InvalidData> {
    let ticker: KrakenTicker = decode(payload, "kraken ticker")?;
    if !ticker.error.is_empty() {
        return Err(InvalidData::new(format!(
            "kraken ticker: {}",
            ticker.error.join("; ")
        )));
    }
    let pair_value = ticker
        .result
        .and_then(|result| result.into_iter().next().map(|(_, pair)| pair))
        .ok_or_else(|| InvalidData::new("kraken ticker: empty result"))?;
    let pair: KrakenPair = decode(&pair_value, "kraken pair")?;
    let last = pair
        .c
        .first()
        .ok_or_else(|| InvalidData::new("kraken ticker: missing last trade"))?;
    let price = parse_decimal(last, "kraken last trade")?;
    Ok(Quote::new(price)?)
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

/// Parses `{"prices": [[ms, price], ...]}`. Unusable points are skipped; a
/// chart with no usable point is invalid.
pub fn parse_market_chart(payload: &Value) -> Result<PriceSeries, InvalidData> {
    let chart: MarketChart = decode(payload, "market chart")?;
    let points = chart
        .prices
        .into_iter()
        .filter(|(time, _)| time.is_finite())
        .filter_map(|(time, price)| PricePoint::new(time as i64, price).ok());
    let series = PriceSeries::from_points(points);
    if series.is_empty() {
        return Err(InvalidData::new("market chart: no usable price points"));
    }
    Ok(series)
}

fn decode<T: serde::de::DeserializeOwned>(payload: &Value, what: &str) -> Result<T, InvalidData> {
    T::deserialize(payload).map_err(|e| InvalidData::new(format!("failed to parse {what}: {e}")))
}

fn parse_decimal(raw: &str, what: &str) -> Result<f64, InvalidData> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| InvalidData::new(format!("{what} '{raw}' is not a number: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_coingecko_coin_detail() {
        let payload = json!({
            "market_data": {
                "current_price": {"usd": 61_234.5},
                "price_change_percentage_24h": -1.25,
                "high_24h": {"usd": 62_000.0},
                "ath": {"usd": 73_750.07},
                "ath_date": {"usd": "2024-03-14T07:10:36.635Z"}
            }
        });

        let quote = parse_coingecko_coin(&payload).expect("valid");

        assert_eq!(quote.price, 61_234.5);
        assert_eq!(quote.change_24h, Some(-1.25));
        assert_eq!(quote.high_24h, Some(62_000.0));
        assert_eq!(quote.ath_date, Some(1_710_400_236_635));
    }

    #[test]
    fn parses_string_amounts_from_exchanges() {
        let coinbase = parse_coinbase_spot(&json!({"data": {"amount": "61234.50", "currency": "USD"}}))
            .expect("coinbase");
        let binance = parse_binance_ticker(&json!({"symbol": "BTCUSDT", "price": "61200.01000000"}))
            .expect("binance");
        let kraken = parse_kraken_ticker(&json!({
            "error": [],
            "result": {"XXBTZUSD": {"c": ["61190.10000", "0.001"]}}
        }))
        .expect("kraken");

        assert_eq!(coinbase.price, 61_234.50);
        assert_eq!(binance.price, 61_200.01);
        assert_eq!(kraken.price, 61_190.1);
    }

    #[test]
    fn parses_coincap_and_simple_price() {
        let coincap = parse_coincap_asset(&json!({
            "data": {"priceUsd": "61000.123", "changePercent24Hr": "2.5"}
        }))
        .expect("coincap");
        let simple = parse_coingecko_simple(&json!({
            "bitcoin": {"usd": 61_001.0, "usd_24h_change": 0.4}
        }))
        .expect("simple");

        assert_eq!(coincap.change_24h, Some(2.5));
        assert_eq!(simple.price, 61_001.0);
    }

    #[test]
    fn rejects_invalid_prices() {
        assert!(parse_binance_ticker(&json!({"price": "NaN"})).is_err());
        assert!(parse_binance_ticker(&json!({"price": "0"})).is_err());
        assert!(parse_coinbase_spot(&json!({"data": {}})).is_err());
        assert!(parse_kraken_ticker(&json!({"error": ["EQuery:Unknown asset pair"]})).is_err());
        assert!(parse_coingecko_simple(&json!({"bitcoin": {}})).is_err());
    }

    #[test]
    fn market_chart_skips_bad_points_and_sorts() {
        let series = parse_market_chart(&json!({
            "prices": [[2000.0, 11.0], [1000.0, 10.0], [1500.0, -1.0]]
        }))
        .expect("chart");

        assert_eq!(
            series.points(),
            &[
                PricePoint { time: 1000, price: 10.0 },
                PricePoint { time: 2000, price: 11.0 }
            ]
        );
        assert!(parse_market_chart(&json!({"prices": []})).is_err());
        assert!(parse_market_chart(&json!({"total_volumes": []})).is_err());
    }

    #[test]
    fn catalog_puts_backend_first_when_configured() {
        let catalog = SourceCatalog::new(Some(String::from("https://satsfeed.test/")));

        let snapshot = catalog.snapshot_sources();
        let history = catalog.history_sources(RangeKey::Month);

        assert_eq!(snapshot[0].provider, ProviderId::Backend);
        assert_eq!(snapshot[0].url, "https://satsfeed.test/api/btc/snapshot");
        assert_eq!(history[0].url, "https://satsfeed.test/api/btc/history?days=30");
        assert_eq!(
            history[1].url,
            "https://api.coingecko.com/api/v3/coins/bitcoin/market_chart?vs_currency=usd&days=30"
        );
        assert_eq!(SourceCatalog::default().snapshot_sources().len(), 6);
    }
}
