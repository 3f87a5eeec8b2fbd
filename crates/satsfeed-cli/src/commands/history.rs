use satsfeed_core::{PricePoint, RangeKey, SeriesStats};
use serde::Serialize;

use crate::cli::HistoryArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct HistoryResponseData {
    range: RangeKey,
    derived_from: Option<RangeKey>,
    count: usize,
    stats: Option<SeriesStats>,
    points: Vec<PricePoint>,
}

pub async fn run(args: &HistoryArgs, context: &Context) -> Result<CommandResult, CliError> {
    let served = context.service.get_history(args.range).await?;

    let data = HistoryResponseData {
        range: args.range,
        derived_from: served.derived_from,
        count: served.value.len(),
        stats: served.value.stats(),
        points: served.value.points().to_vec(),
    };
    Ok(CommandResult::ok(serde_json::to_value(data)?).with_served(&served))
}
