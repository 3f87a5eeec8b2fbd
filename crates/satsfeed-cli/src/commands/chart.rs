use satsfeed_core::fallback;
use satsfeed_core::{
    ChartOptions, ChartRenderer, ChartStyle, FeedStatus, RangeKey, SvgSurface, Viewport,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{ChartArgs, StyleArg};
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct ChartResponseData {
    range: RangeKey,
    style: &'static str,
    points: usize,
    pixel_size: (u32, u32),
    out: String,
}

pub async fn run(args: &ChartArgs, context: &Context) -> Result<CommandResult, CliError> {
    let viewport = Viewport::new(args.width, args.height, args.dpr)?;

    let (mut series, mut result) = match context.service.get_history(args.range).await {
        Ok(served) => {
            let result = CommandResult::ok(serde_json::Value::Null).with_served(&served);
            (served.value, result)
        }
        Err(error) => {
            warn!(range = %args.range, "drawing built-in history: {error}");
            let result = CommandResult::ok(serde_json::Value::Null)
                .with_status(FeedStatus::Unavailable)
                .with_errors(error.failures().iter().map(ToString::to_string).collect())
                .with_warning("every source failed; chart shows built-in history");
            (fallback::history_for(args.range), result)
        }
    };
    if args.range == RangeKey::Max {
        series = fallback::extend_to_genesis(&series);
    }

    let (style, style_name) = match args.style {
        StyleArg::Line => (ChartStyle::Line, "line"),
        StyleArg::Candles => (ChartStyle::Candlestick, "candles"),
    };
    let options = ChartOptions {
        style,
        granularity: args.range.granularity(),
        ..ChartOptions::default()
    };

    let mut handle = ChartRenderer::render(SvgSurface::new(), &series, options, viewport)?;
    let svg = handle.with_surface(SvgSurface::to_svg)?;
    handle.destroy();
    std::fs::write(&args.out, svg)?;
    info!(out = %args.out.display(), points = series.len(), "chart written");

    result.data = serde_json::to_value(ChartResponseData {
        range: args.range,
        style: style_name,
        points: series.len(),
        pixel_size: viewport.pixel_size(),
        out: args.out.display().to_string(),
    })?;
    Ok(result)
}
