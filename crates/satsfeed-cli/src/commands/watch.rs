use std::time::Duration;

use satsfeed_core::format::format_timestamp;
use satsfeed_core::{create_price_widget, WidgetConfig, WidgetFrame, WidgetView};
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::WatchArgs;
use crate::error::CliError;
use crate::output;

use super::Context;

pub async fn run(args: &WatchArgs, context: &Context) -> Result<(), CliError> {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<WidgetFrame>();
    let forward = move |frame: &WidgetFrame| {
        let _ = frames_tx.send(frame.clone());
    };
    let views: Vec<Box<dyn WidgetView>> = vec![Box::new(forward)];

    let config = WidgetConfig {
        range: args.range,
        refresh_interval: Duration::from_secs(args.interval_secs.max(1)),
        ..WidgetConfig::default()
    };
    let mut widget = create_price_widget(context.service.clone(), config, views);
    widget.start();
    info!(interval_secs = args.interval_secs.max(1), "watching BTC price");

    let mut seen: u32 = 0;
    loop {
        tokio::select! {
            frame = frames_rx.recv() => {
                let Some(frame) = frame else { break };
                output::render_line(&status_line(&frame))?;
                seen += 1;
                if args.ticks.is_some_and(|ticks| seen >= ticks) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    widget.stop();
    Ok(())
}

fn status_line(frame: &WidgetFrame) -> String {
    let mut line = format!(
        "{}  {}  [{}]",
        format_timestamp(frame.updated_at),
        frame.price_label,
        frame.status_label
    );
    if let Some(change) = &frame.change_label {
        line.push_str("  ");
        line.push_str(change);
    }
    if let (Some(range), Some(series)) = (frame.range, &frame.series) {
        line.push_str(&format!("  {range}: {} pts", series.len()));
    }
    line
}

#[cfg(test)]
mod tests {
    use satsfeed_core::{FeedStatus, ProviderId};

    use super::*;

    #[test]
    fn status_line_shows_price_badge_and_change() {
        let frame = WidgetFrame {
            price: 61_234.0,
            price_label: String::from("$61,234"),
            change_label: Some(String::from("+1.25% 24h")),
            status: FeedStatus::Live,
            status_label: String::from("Live via Binance"),
            source: Some(ProviderId::Binance),
            updated_at: 0,
            range: None,
            series: None,
            history_status: None,
            stats: None,
        };

        let line = status_line(&frame);

        assert!(line.contains("$61,234  [Live via Binance]  +1.25% 24h"));
    }
}
