//! Dollar-cost-averaging projection under a fixed annual growth assumption.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Annual growth assumption applied to the start price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outlook {
    Bearish,
    #[default]
    Moderate,
    Bullish,
}

impl Outlook {
    pub const ALL: [Self; 3] = [Self::Bearish, Self::Moderate, Self::Bullish];

    /// Compound annual growth rate.
    pub const fn rate(self) -> f64 {
        match self {
            Self::Bearish => 0.10,
            Self::Moderate => 0.30,
            Self::Bullish => 0.45,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bearish => "bearish",
            Self::Moderate => "moderate",
            Self::Bullish => "bullish",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Bearish => "Bearish",
            Self::Moderate => "Moderate",
            Self::Bullish => "Bullish",
        }
    }
}

impl Display for Outlook {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outlook {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|outlook| outlook.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ValidationError::InvalidChoice {
                field: "outlook",
                value: value.to_owned(),
            })
    }
}

/// How often the fixed USD amount is invested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    pub const ALL: [Self; 4] = [Self::Daily, Self::Weekly, Self::Biweekly, Self::Monthly];

    pub const fn periods_per_year(self) -> u32 {
        match self {
            Self::Daily => 365,
            Self::Weekly => 52,
            Self::Biweekly => 26,
            Self::Monthly => 12,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|frequency| frequency.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ValidationError::InvalidChoice {
                field: "frequency",
                value: value.to_owned(),
            })
    }
}

/// Longest projection horizon accepted by [`DcaParams::new`].
pub const MAX_YEARS: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct DcaParams {
    pub usd_per_period: f64,
    pub frequency: Frequency,
    pub years: f64,
    pub start_price: f64,
    /// Target balance in BTC; `0` disables goal tracking.
    pub goal_btc: f64,
}

impl DcaParams {
    pub fn new(
        usd_per_period: f64,
        frequency: Frequency,
        years: f64,
        start_price: f64,
    ) -> Result<Self, ValidationError> {
        positive("usd_per_period", usd_per_period)?;
        positive("years", years)?;
        if years > f64::from(MAX_YEARS) {
            return Err(ValidationError::AboveMaximum {
                field: "years",
                max: MAX_YEARS,
            });
        }
        positive("start_price", start_price)?;
        Ok(Self {
            usd_per_period,
            frequency,
            years,
            start_price,
            goal_btc: 0.0,
        })
    }

    pub fn with_goal_btc(mut self, goal_btc: f64) -> Self {
        self.goal_btc = if goal_btc.is_finite() { goal_btc.max(0.0) } else { 0.0 };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcaProjection {
    pub outlook: Outlook,
    pub periods: u32,
    /// Cumulative BTC after each period.
    pub balances: Vec<f64>,
    pub prices: Vec<f64>,
    /// Elapsed years per period, two decimals.
    pub labels: Vec<String>,
    pub final_btc: f64,
    /// First elapsed time at which the goal balance is reached.
    pub goal_years: Option<f64>,
    pub total_invested: f64,
    pub avg_cost: f64,
}

/// Buys `usd_per_period` worth of BTC every period at
/// `start * (1 + rate)^(period / periods_per_year)`.
pub fn project(params: &DcaParams, outlook: Outlook) -> DcaProjection {
    let per_year = f64::from(params.frequency.periods_per_year());
    let horizon = params.years.min(f64::from(MAX_YEARS));
    let periods = (horizon * per_year).round().max(1.0) as u32;
    let rate = outlook.rate();

    let mut balances = Vec::with_capacity(periods as usize);
    let mut prices = Vec::with_capacity(periods as usize);
    let mut labels = Vec::with_capacity(periods as usize);
    let mut btc = 0.0;
    let mut goal_years = None;

    for period in 1..=periods {
        let elapsed = f64::from(period) / per_year;
        let price = params.start_price * (1.0 + rate).powf(elapsed);
        btc += params.usd_per_period / price;

        if goal_years.is_none() && params.goal_btc > 0.0 && btc >= params.goal_btc {
            goal_years = Some(elapsed);
        }
        balances.push(btc);
        prices.push(price);
        labels.push(format!("{elapsed:.2}"));
    }

    let total_invested = params.usd_per_period * f64::from(periods);
    DcaProjection {
        outlook,
        periods,
        balances,
        prices,
        labels,
        final_btc: btc,
        goal_years,
        total_invested,
        avg_cost: if btc > 0.0 { total_invested / btc } else { 0.0 },
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
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
    fn monthly_projection_compounds_price_per_period() {
        let params = DcaParams::new(100.0, Frequency::Monthly, 1.0, 50_000.0).expect("params");

        let projection = project(&params, Outlook::Moderate);

        assert_eq!(projection.periods, 12);
        assert_eq!(projection.labels.first().map(String::as_str), Some("0.08"));
        assert_eq!(projection.labels.last().map(String::as_str), Some("1.00"));
        assert!((projection.prices[11] - 65_000.0).abs() < 1e-6);
        assert!((projection.balances[0] - 100.0 / projection.prices[0]).abs() < 1e-12);
        assert_eq!(projection.total_invested, 1_200.0);
        assert!(projection.avg_cost > 50_000.0 && projection.avg_cost < 65_000.0);
    }

    #[test]
    fn goal_is_reported_at_first_period_reaching_it() {
        let params = DcaParams::new(1_000.0, Frequency::Monthly, 2.0, 10_000.0)
            .expect("params")
            .with_goal_btc(0.5);

        let projection = project(&params, Outlook::Bearish);

        let index = projection
            .balances
            .iter()
            .position(|balance| *balance >= 0.5)
            .expect("goal reached");
        assert_eq!(projection.goal_years, Some((index + 1) as f64 / 12.0));
    }

    #[test]
    fn short_horizon_still_runs_one_period() {
        let params = DcaParams::new(10.0, Frequency::Monthly, 0.01, 60_000.0).expect("params");

        assert_eq!(project(&params, Outlook::Bullish).periods, 1);
    }

    #[test]
    fn rejects_horizons_beyond_a_century() {
        assert_eq!(
            DcaParams::new(10.0, Frequency::Weekly, 1.0e9, 60_000.0),
            Err(ValidationError::AboveMaximum {
                field: "years",
                max: MAX_YEARS
            })
        );
        assert!(DcaParams::new(10.0, Frequency::Daily, 100.0, 60_000.0).is_ok());
    }

    #[test]
    fn hand_built_params_are_capped_at_the_maximum_horizon() {
        let params = DcaParams {
            years: 1.0e9,
            ..DcaParams::new(10.0, Frequency::Weekly, 1.0, 60_000.0).expect("params")
        };

        let projection = project(&params, Outlook::Moderate);

        assert_eq!(projection.periods, MAX_YEARS * 52);
        assert_eq!(projection.balances.len(), 5_200);
    }

    #[test]
    fn rejects_non_positive_inputs_and_unknown_choices() {
        assert_eq!(
            DcaParams::new(0.0, Frequency::Weekly, 5.0, 60_000.0),
            Err(ValidationError::NonPositiveValue {
                field: "usd_per_period"
            })
        );
        assert!("sideways".parse::<Outlook>().is_err());
        assert_eq!("Biweekly".parse::<Frequency>(), Ok(Frequency::Biweekly));
    }
}
