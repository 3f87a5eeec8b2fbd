use satsfeed_core::dca::{project, DcaParams};
use satsfeed_core::fallback::FALLBACK_PRICE_USD;
use satsfeed_core::format::{format_btc, format_price_cents};
use satsfeed_core::{DcaProjection, FeedStatus};
use serde::Serialize;
use tracing::warn;

use crate::cli::DcaArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct DcaResponseData {
    start_price: f64,
    btc_held: String,
    total_invested: String,
    avg_cost: String,
    goal: String,
    scenario: String,
    projection: DcaProjection,
}

pub async fn run(args: &DcaArgs, context: &Context) -> Result<CommandResult, CliError> {
    let mut result = CommandResult::ok(serde_json::Value::Null);
    let start_price = match args.start_price {
        Some(price) => price,
        None => match context.service.get_snapshot().await {
            Ok(served) => {
                result = result.with_served(&served);
                served.value.price
            }
            Err(error) => {
                warn!("no live price, projecting from fallback: {error}");
                result = result
                    .with_status(FeedStatus::Unavailable)
                    .with_warning("every source failed; projecting from the built-in price");
                FALLBACK_PRICE_USD
            }
        },
    };

    let params = DcaParams::new(args.usd, args.frequency, args.years, start_price)?
        .with_goal_btc(args.goal_btc);
    let projection = project(&params, args.outlook);

    let goal = match projection.goal_years {
        Some(years) => format!("Goal hit in ~{years:.1} years"),
        None => String::from("Goal not reached"),
    };
    let scenario = format!(
        "{} outlook · {:.0}% CAGR assumption over {} years.",
        args.outlook.label(),
        args.outlook.rate() * 100.0,
        args.years
    );

    result.data = serde_json::to_value(DcaResponseData {
        start_price,
        btc_held: format_btc(projection.final_btc),
        total_invested: format_price_cents(projection.total_invested),
        avg_cost: format_price_cents(projection.avg_cost),
        goal,
        scenario,
        projection,
    })?;
    Ok(result)
}
