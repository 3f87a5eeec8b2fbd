use satsfeed_core::format::{format_change, format_price_cents, format_timestamp};
use satsfeed_core::PriceSnapshot;
use serde::Serialize;

use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct PriceResponseData {
    snapshot: PriceSnapshot,
    price_label: String,
    change_label: Option<String>,
    status_label: String,
    updated_at: String,
}

pub async fn run(context: &Context) -> Result<CommandResult, CliError> {
    let served = context.service.get_snapshot().await?;

    let data = PriceResponseData {
        price_label: format_price_cents(served.value.price),
        change_label: served.value.change_24h.map(format_change),
        status_label: served.status_label(),
        updated_at: format_timestamp(served.updated_at),
        snapshot: served.value.clone(),
    };
    Ok(CommandResult::ok(serde_json::to_value(data)?).with_served(&served))
}
