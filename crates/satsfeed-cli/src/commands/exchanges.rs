use satsfeed_core::exchanges::compare;

use crate::error::CliError;

use super::{CommandResult, Context};

pub async fn run(context: &Context) -> Result<CommandResult, CliError> {
    let comparison = compare(context.client.as_ref(), &context.config.fetch_options()).await?;

    let source_chain = comparison
        .exchanges
        .iter()
        .map(|entry| entry.exchange)
        .chain(comparison.failures.iter().map(|failure| failure.provider))
        .collect();
    let errors = comparison.errors.clone();
    Ok(CommandResult::ok(serde_json::to_value(&comparison)?)
        .with_source_chain(source_chain)
        .with_errors(errors))
}
