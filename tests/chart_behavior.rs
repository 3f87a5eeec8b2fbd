//! Behavior-driven tests for the chart lifecycle.
//!
//! These tests verify what a viewer of the chart experiences: crisp output at
//! any pixel ratio, hover readouts near points only, stable redraws, and a
//! clean teardown that leaves no background work behind.

use std::time::Duration;

use satsfeed_core::chart::{project, DrawOp, Margins, PlotArea, PriceScale};
use satsfeed_core::{
    ChartError, ChartHandle, ChartOptions, ChartRenderer, ChartStyle, PricePoint, RecordingSurface,
    SvgSurface, Viewport,
};
use satsfeed_tests::{daily_series, DAY_MS};
use tokio::sync::watch;

const PRICES: [f64; 3] = [60_000.0, 58_000.0, 61_000.0];

fn line_chart(viewport: Viewport) -> ChartHandle<RecordingSurface> {
    ChartRenderer::render(
        RecordingSurface::new(),
        &daily_series(&PRICES),
        ChartOptions::default(),
        viewport,
    )
    .expect("render")
}

/// Where the renderer places each point, in CSS pixels.
fn projected(viewport: Viewport) -> Vec<(f64, f64)> {
    let series = daily_series(&PRICES);
    let options = ChartOptions::default();
    let scale = PriceScale::from_points(series.points(), options.padding_fraction).expect("non-empty");
    let area = PlotArea::new(viewport.css_width, viewport.css_height, Margins::default());
    project(series.points(), &scale, &area)
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// =============================================================================
// Sizing
// =============================================================================

#[test]
fn when_rendered_on_high_dpi_display_backing_store_is_scaled() {
    // Given: a 320x200 container on a 2x display
    let viewport = Viewport::new(320.0, 200.0, 2.0).expect("valid viewport");

    // When: the chart is rendered and then resized
    let handle = line_chart(viewport);
    let before = handle
        .with_surface(|surface| (surface.pixel_size(), surface.scale()))
        .expect("alive");
    handle
        .resize(Viewport::new(500.0, 300.0, 1.5).expect("valid viewport"))
        .expect("resize");
    let after = handle
        .with_surface(|surface| (surface.pixel_size(), surface.scale()))
        .expect("alive");

    // Then: device pixels follow css size times pixel ratio
    assert_eq!(before, ((640, 400), 2.0));
    assert_eq!(after, ((750, 450), 1.5));
}

#[test]
fn when_viewport_is_degenerate_resize_is_rejected_and_chart_is_unchanged() {
    // Given: a rendered chart
    let handle = line_chart(Viewport::default());

    // When: a zero-width viewport is applied
    let result = handle.resize(Viewport {
        css_width: 0.0,
        ..Viewport::default()
    });

    // Then: it is refused and the previous size stays
    assert_eq!(result, Err(ChartError::InvalidViewport));
    assert_eq!(handle.with_surface(RecordingSurface::pixel_size), Ok((640, 240)));
}

// =============================================================================
// Hover
// =============================================================================

#[test]
fn when_pointer_is_near_a_point_readout_shows_that_point() {
    // Given: a chart and the on-screen position of its middle point
    let viewport = Viewport::default();
    let handle = line_chart(viewport);
    let (x, y) = projected(viewport)[1];

    // When: the pointer moves within the hover threshold of it
    let readout = handle.hover(x + 6.0, y + 6.0).expect("alive").expect("has data");

    // Then: the readout switches to the hovered sample and a marker is drawn
    assert_eq!(readout.point, PricePoint { time: DAY_MS, price: 58_000.0 });
    assert_eq!(readout.price_label, "$58,000");
    assert!(!readout.is_latest);
    let markers = handle
        .with_surface(|surface| surface.count(|op| matches!(op, DrawOp::FillRect { width, .. } if *width == 6.0)))
        .expect("alive");
    assert_eq!(markers, 1);
}

#[test]
fn when_pointer_is_far_from_points_readout_reverts_to_latest() {
    // Given: a chart hovered on its first point
    let viewport = Viewport::default();
    let handle = line_chart(viewport);
    let (x, y) = projected(viewport)[0];
    handle.hover(x, y).expect("alive");

    // When: the pointer moves 30px away, then leaves the chart
    let far = handle.hover(x, y + 30.0).expect("alive").expect("has data");
    handle.hover(x, y).expect("alive");
    let left = handle.leave().expect("alive").expect("has data");

    // Then: both fall back to the latest sample
    assert!(far.is_latest);
    assert_eq!(far.point.price, 61_000.0);
    assert_eq!(left, far);
}

// =============================================================================
// Updates
// =============================================================================

#[test]
fn when_same_series_is_applied_twice_the_frame_is_identical() {
    // Given: a rendered chart
    let handle = line_chart(Viewport::default());
    let series = daily_series(&[61_000.0, 61_500.0, 60_900.0, 62_100.0]);

    // When: the same data is applied twice
    handle.update(&series).expect("alive");
    let first = handle.with_surface(|surface| surface.ops().to_vec()).expect("alive");
    handle.update(&series).expect("alive");
    let second = handle.with_surface(|surface| surface.ops().to_vec()).expect("alive");

    // Then: the redraw is byte-for-byte the same frame
    assert_eq!(first, second);
    assert_eq!(handle.with_surface(RecordingSurface::frames), Ok(3));
}

#[test]
fn when_style_is_candlestick_the_svg_contains_one_body_per_close() {
    // Given: a candlestick chart drawn to SVG
    let handle = ChartRenderer::render(
        SvgSurface::new(),
        &daily_series(&PRICES),
        ChartOptions {
            style: ChartStyle::Candlestick,
            ..ChartOptions::default()
        },
        Viewport::default(),
    )
    .expect("render");

    // When: the document is produced
    let svg = handle.with_surface(SvgSurface::to_svg).expect("alive");

    // Then: down and up bodies use their colors
    assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="640" height="240""#));
    assert_eq!(svg.matches("<rect").count(), 3);
    assert!(svg.contains(r##"fill="#e5484d""##));
    assert!(svg.contains(r##"fill="#0bbf63""##));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn when_container_resizes_the_watcher_redraws_at_new_size() {
    // Given: a chart observing a viewport channel
    let mut handle = line_chart(Viewport::default());
    let (sender, receiver) = watch::channel(Viewport::default());
    handle.observe_resize(receiver).expect("alive");

    // When: the container grows
    sender
        .send(Viewport::new(800.0, 300.0, 2.0).expect("valid viewport"))
        .expect("watcher is listening");

    // Then: the surface is resized without an explicit call
    let resized = wait_until(|| handle.with_surface(RecordingSurface::pixel_size) == Ok((1_600, 600))).await;
    assert!(resized);
    assert!(handle.is_observing_resize());
}

#[tokio::test]
async fn when_refresh_runs_live_samples_are_folded_into_the_series() {
    // Given: a chart with a refresh task yielding one later sample
    let mut handle = line_chart(Viewport::default());
    let sample = PricePoint {
        time: 10 * DAY_MS,
        price: 62_000.0,
    };
    handle
        .start_refresh(Duration::from_millis(10), move || async move { Some(sample) })
        .expect("alive");

    // When: a few ticks have passed
    let appended = wait_until(|| handle.series().map(|series| series.len()) == Ok(4)).await;
    tokio::time::sleep(Duration::from_millis(40)).await;

    // Then: the sample is appended once and later ticks replace it in place
    assert!(appended);
    let series = handle.series().expect("alive");
    assert_eq!(series.len(), 4);
    assert_eq!(series.last(), Some(&sample));

    // And: restarting keeps a single task
    handle
        .start_refresh(Duration::from_millis(10), move || async move { None })
        .expect("alive");
    assert!(handle.is_refreshing());
    handle.stop_refresh();
    assert!(!handle.is_refreshing());
}

#[tokio::test]
async fn when_destroyed_chart_releases_everything_and_rejects_calls() {
    // Given: a chart with a resize watcher and a refresh task
    let mut handle = line_chart(Viewport::default());
    let (sender, receiver) = watch::channel(Viewport::default());
    handle.observe_resize(receiver).expect("alive");
    handle
        .start_refresh(Duration::from_secs(60), || async { None })
        .expect("alive");

    // When: it is destroyed
    let surface = handle.destroy();

    // Then: the surface is handed back once and every later call fails
    assert!(surface.is_some());
    assert!(handle.destroy().is_none());
    assert!(handle.is_destroyed());
    assert!(!handle.is_observing_resize());
    assert!(!handle.is_refreshing());
    assert_eq!(handle.update(&daily_series(&PRICES)), Err(ChartError::Destroyed));
    assert_eq!(handle.hover(0.0, 0.0), Err(ChartError::Destroyed));
    assert_eq!(handle.resize(Viewport::default()), Err(ChartError::Destroyed));
    assert_eq!(
        handle.start_refresh(Duration::from_secs(1), || async { None }),
        Err(ChartError::Destroyed)
    );

    // And: the watcher is gone, so the channel has no receivers
    let closed = wait_until(|| sender.is_closed()).await;
    assert!(closed);
}
