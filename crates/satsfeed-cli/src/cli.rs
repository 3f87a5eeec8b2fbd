//! CLI argument definitions for satsfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `price` | Current BTC/USD snapshot with freshness status |
//! | `history` | Price series for a range, with stats |
//! | `chart` | Render a range as an SVG line or candlestick chart |
//! | `watch` | Run the refresh loop and print one status line per tick |
//! | `exchanges` | Compare exchange spot prices and their spread |
//! | `dca` | Project a dollar-cost-averaging plan |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--timeout-ms` | `8000` | Per-attempt request timeout |
//! | `--retries` | `1` | Retries per source after the first attempt |
//! | `--cache-dir` | `~/.satsfeed/cache` | Directory for the persistent cache |
//! | `--no-cache` | `false` | Keep the cache in memory for this run only |
//! | `--backend-url` | none | Same-origin backend tried before public APIs |
//!
//! Options override the `SATSFEED_*` environment variables, and a
//! `.env` file in the working directory is loaded first.
//!
//! # Examples
//!
//! ```bash
//! satsfeed price --pretty
//! satsfeed history --range 30
//! satsfeed chart --range max --style candles --out btc.svg
//! satsfeed watch --interval-secs 30 --ticks 5
//! satsfeed dca --usd 100 --frequency weekly --outlook bullish --years 4
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use satsfeed_core::dca::{Frequency, Outlook};
use satsfeed_core::RangeKey;

/// Resilient BTC/USD price feed.
///
/// Fetches from an ordered list of providers, caches with TTLs and falls
/// back to the last good value when every provider is down.
#[derive(Debug, Parser)]
#[command(
    name = "satsfeed",
    author,
    version,
    about = "Resilient BTC/USD price feed",
    long_about = "satsfeed fetches the BTC/USD price and history from an ordered list of \
providers with per-attempt timeouts and retry, caches results with TTLs, and degrades to \
stale or built-in data instead of failing.\n\
\n\
Use 'satsfeed <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Per-attempt request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Retries per source after the first attempt.
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Directory for the persistent cache.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Keep the cache in memory for this run only.
    #[arg(long, global = true, default_value_t = false)]
    pub no_cache: bool,

    /// Backend base URL tried before the public APIs.
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Chart drawing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StyleArg {
    /// Line with filled area.
    Line,
    /// Candlesticks synthesized from closes.
    Candles,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the current BTC/USD snapshot.
    ///
    /// Reports the price, 24h change and high, all-time high, and whether
    /// the value is live, cached or delayed.
    ///
    /// # Examples
    ///
    ///   satsfeed price
    ///   satsfeed price --backend-url https://example.com
    Price,

    /// Fetch the price series for a range.
    ///
    /// # Examples
    ///
    ///   satsfeed history --range 7
    ///   satsfeed history --range max --pretty
    History(HistoryArgs),

    /// Render a range to an SVG chart.
    ///
    /// # Examples
    ///
    ///   satsfeed chart --range 30 --out btc.svg
    ///   satsfeed chart --range 365 --style candles --dpr 2 --out btc.svg
    Chart(ChartArgs),

    /// Run the price widget refresh loop.
    ///
    /// # Examples
    ///
    ///   satsfeed watch
    ///   satsfeed watch --range 1 --interval-secs 15 --ticks 4
    Watch(WatchArgs),

    /// Compare spot prices across Coinbase, Binance and Kraken.
    Exchanges,

    /// Project a dollar-cost-averaging plan.
    ///
    /// # Examples
    ///
    ///   satsfeed dca --usd 50 --frequency weekly
    ///   satsfeed dca --usd 500 --frequency monthly --outlook bearish --goal-btc 0.25
    Dca(DcaArgs),
}

/// Arguments for the `history` command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Range key: 1, 7, 30, 180, 365 or max.
    #[arg(long, default_value = "7")]
    pub range: RangeKey,
}

/// Arguments for the `chart` command.
#[derive(Debug, Args)]
pub struct ChartArgs {
    /// Range key: 1, 7, 30, 180, 365 or max.
    #[arg(long, default_value = "30")]
    pub range: RangeKey,

    #[arg(long, value_enum, default_value_t = StyleArg::Line)]
    pub style: StyleArg,

    /// Width in CSS pixels.
    #[arg(long, default_value_t = 640.0)]
    pub width: f64,

    /// Height in CSS pixels.
    #[arg(long, default_value_t = 240.0)]
    pub height: f64,

    /// Device pixel ratio.
    #[arg(long, default_value_t = 1.0)]
    pub dpr: f64,

    /// Output SVG file.
    #[arg(long, default_value = "btc-chart.svg")]
    pub out: PathBuf,
}

/// Arguments for the `watch` command.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// History range shown alongside the price; omit for a ticker only.
    #[arg(long)]
    pub range: Option<RangeKey>,

    /// Seconds between refreshes.
    #[arg(long, default_value_t = 60)]
    pub interval_secs: u64,

    /// Stop after this many refreshes; runs until interrupted otherwise.
    #[arg(long)]
    pub ticks: Option<u32>,
}

/// Arguments for the `dca` command.
#[derive(Debug, Args)]
pub struct DcaArgs {
    /// USD invested each period.
    #[arg(long)]
    pub usd: f64,

    /// daily, weekly, biweekly or monthly.
    #[arg(long, default_value = "weekly")]
    pub frequency: Frequency,

    /// bearish (10%), moderate (30%) or bullish (45%) annual growth.
    #[arg(long, default_value = "moderate")]
    pub outlook: Outlook,

    /// Projection horizon in years.
    #[arg(long, default_value_t = 5.0)]
    pub years: f64,

    /// Target BTC balance.
    #[arg(long, default_value_t = 0.0)]
    pub goal_btc: f64,

    /// Start price; defaults to the current snapshot.
    #[arg(long)]
    pub start_price: Option<f64>,
}
