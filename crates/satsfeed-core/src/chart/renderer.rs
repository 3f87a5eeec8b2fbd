use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::scale::{nearest_within, project, x_for, Margins, PlotArea, PriceScale};
use super::surface::{Surface, TextAlign};
use crate::format::{format_axis_label, format_price, format_short_price, format_timestamp};
use crate::{synthesize_candles, Granularity, PricePoint, PriceSeries};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChartError {
    #[error("chart has been destroyed")]
    Destroyed,
    #[error("viewport must have positive finite dimensions and pixel ratio")]
    InvalidViewport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStyle {
    /// Continuous line with a filled area underneath.
    Line,
    /// Degenerate OHLC bars synthesized from closes.
    Candlestick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub style: ChartStyle,
    /// Fraction of `max(max - min, 1)` added above and below the data.
    pub padding_fraction: f64,
    pub hover_threshold_px: f64,
    pub margins: Margins,
    pub grid_lines: usize,
    pub granularity: Granularity,
    pub line_color: String,
    pub area_color: String,
    pub up_color: String,
    pub down_color: String,
    pub grid_color: String,
    pub text_color: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            style: ChartStyle::Line,
            padding_fraction: 0.08,
            hover_threshold_px: 18.0,
            margins: Margins::default(),
            grid_lines: 4,
            granularity: Granularity::Day,
            line_color: String::from("#0c63ff"),
            area_color: String::from("rgba(12,99,255,0.12)"),
            up_color: String::from("#0bbf63"),
            down_color: String::from("#e5484d"),
            grid_color: String::from("rgba(15,23,42,0.08)"),
            text_color: String::from("#475569"),
        }
    }
}

/// Container size in CSS pixels plus the display's device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub css_width: f64,
    pub css_height: f64,
    pub device_pixel_ratio: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            css_width: 640.0,
            css_height: 240.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(css_width: f64, css_height: f64, device_pixel_ratio: f64) -> Result<Self, ChartError> {
        let viewport = Self {
            css_width,
            css_height,
            device_pixel_ratio,
        };
        viewport.validate()?;
        Ok(viewport)
    }

    /// Backing-store size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.css_width * self.device_pixel_ratio).round() as u32,
            (self.css_height * self.device_pixel_ratio).round() as u32,
        )
    }

    fn validate(&self) -> Result<(), ChartError> {
        let valid = [self.css_width, self.css_height, self.device_pixel_ratio]
            .iter()
            .all(|value| value.is_finite() && *value > 0.0);
        if valid {
            Ok(())
        } else {
            Err(ChartError::InvalidViewport)
        }
    }
}

/// Value shown beside the chart: the hovered point or the latest one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readout {
    pub point: PricePoint,
    pub price_label: String,
    pub time_label: String,
    pub is_latest: bool,
}

impl Readout {
    fn new(point: PricePoint, is_latest: bool) -> Self {
        Self {
            point,
            price_label: format_price(point.price),
            time_label: format_timestamp(point.time),
            is_latest,
        }
    }
}

struct ChartState<S> {
    surface: S,
    series: PriceSeries,
    options: ChartOptions,
    viewport: Viewport,
    projected: Vec<(f64, f64)>,
    hovered: Option<usize>,
}

impl<S: Surface> ChartState<S> {
    fn apply_viewport(&mut self) {
        let (width, height) = self.viewport.pixel_size();
        self.surface.set_pixel_size(width, height);
        self.surface.set_scale(self.viewport.device_pixel_ratio);
    }

    fn readout(&self) -> Option<Readout> {
        let points = self.series.points();
        match self.hovered.and_then(|index| points.get(index)) {
            Some(point) => Some(Readout::new(*point, false)),
            None => points.last().map(|point| Readout::new(*point, true)),
        }
    }

    fn draw(&mut self) {
        let area = PlotArea::new(
            self.viewport.css_width,
            self.viewport.css_height,
            self.options.margins,
        );
        self.surface.clear();

        let Some(scale) = PriceScale::from_points(self.series.points(), self.options.padding_fraction)
        else {
            self.projected.clear();
            self.surface.fill_text(
                "No data",
                area.x + area.width / 2.0,
                area.y + area.height / 2.0,
                &self.options.text_color,
                TextAlign::Middle,
            );
            return;
        };

        self.projected = project(self.series.points(), &scale, &area);
        self.draw_grid(&area, &scale);

        match self.options.style {
            ChartStyle::Line => self.draw_line(&area),
            ChartStyle::Candlestick => self.draw_candles(&area, &scale),
        }
        self.draw_x_labels(&area);

        if let Some(&(x, y)) = self.hovered.and_then(|index| self.projected.get(index)) {
            let color = self.options.line_color.clone();
            self.surface.begin_path();
            self.surface.move_to(x, area.y);
            self.surface.line_to(x, area.bottom());
            self.surface.stroke(&self.options.grid_color, 1.0);
            self.surface.fill_rect(x - 3.0, y - 3.0, 6.0, 6.0, &color);
        }
    }

    fn draw_grid(&mut self, area: &PlotArea, scale: &PriceScale) {
        let lines = self.options.grid_lines.max(1);
        for step in 0..=lines {
            let y = area.y + area.height * step as f64 / lines as f64;
            self.surface.begin_path();
            self.surface.move_to(area.x, y);
            self.surface.line_to(area.right(), y);
            self.surface.stroke(&self.options.grid_color, 1.0);
            self.surface.fill_text(
                &format_short_price(scale.price_at(y, area)),
                area.x - 8.0,
                y + 4.0,
                &self.options.text_color,
                TextAlign::End,
            );
        }
    }

    fn draw_line(&mut self, area: &PlotArea) {
        let Some(&(first_x, first_y)) = self.projected.first() else {
            return;
        };
        let last_x = self.projected.last().map_or(first_x, |point| point.0);

        self.surface.begin_path();
        self.surface.move_to(first_x, area.bottom());
        self.surface.line_to(first_x, first_y);
        for &(x, y) in &self.projected[1..] {
            self.surface.line_to(x, y);
        }
        self.surface.line_to(last_x, area.bottom());
        self.surface.close_path();
        self.surface.fill(&self.options.area_color);

        self.surface.begin_path();
        self.surface.move_to(first_x, first_y);
        for &(x, y) in &self.projected[1..] {
            self.surface.line_to(x, y);
        }
        self.surface.stroke(&self.options.line_color, 2.0);
    }

    fn draw_candles(&mut self, area: &PlotArea, scale: &PriceScale) {
        let candles = synthesize_candles(self.series.points());
        let count = candles.len();
        let body_width = (area.width / count.max(1) as f64 * 0.6).clamp(1.0, 24.0);

        for (index, candle) in candles.iter().enumerate() {
            let x = x_for(index, count, area);
            let color = if candle.is_up() {
                self.options.up_color.clone()
            } else {
                self.options.down_color.clone()
            };
            let high = scale.y_for(candle.high, area);
            let low = scale.y_for(candle.low, area);
            let open = scale.y_for(candle.open, area);
            let close = scale.y_for(candle.close, area);

            self.surface.begin_path();
            self.surface.move_to(x, high);
            self.surface.line_to(x, low);
            self.surface.stroke(&color, 1.0);
            self.surface.fill_rect(
                x - body_width / 2.0,
                open.min(close),
                body_width,
                (open - close).abs().max(1.0),
                &color,
            );
        }
    }

    fn draw_x_labels(&mut self, area: &PlotArea) {
        let points = self.series.points();
        let count = points.len();
        let mut indices = vec![0, count / 2, count - 1];
        indices.dedup();
        for index in indices {
            let label = format_axis_label(points[index].time, self.options.granularity);
            self.surface.fill_text(
                &label,
                x_for(index, count, area),
                area.bottom() + 18.0,
                &self.options.text_color,
                TextAlign::Middle,
            );
        }
    }
}

/// Entry point for mounting a chart on a surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartRenderer;

impl ChartRenderer {
    /// Takes ownership of `surface`, sizes it for `viewport` and draws `series`.
    pub fn render<S>(
        surface: S,
        series: &PriceSeries,
        options: ChartOptions,
        viewport: Viewport,
    ) -> Result<ChartHandle<S>, ChartError>
    where
        S: Surface + 'static,
    {
        viewport.validate()?;
        let mut state = ChartState {
            surface,
            series: series.clone(),
            options,
            viewport,
            projected: Vec::new(),
            hovered: None,
        };
        state.apply_viewport();
        state.draw();

        Ok(ChartHandle {
            state: Arc::new(Mutex::new(Some(state))),
            resize_task: None,
            refresh_task: None,
        })
    }
}

/// Live chart. Owns its surface, at most one resize watcher and at most one
/// refresh task; [`ChartHandle::destroy`] (or drop) releases all three.
pub struct ChartHandle<S> {
    state: Arc<Mutex<Option<ChartState<S>>>>,
    resize_task: Option<JoinHandle<()>>,
    refresh_task: Option<JoinHandle<()>>,
}

impl<S> std::fmt::Debug for ChartHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartHandle")
            .field("observing_resize", &self.resize_task.is_some())
            .field("refreshing", &self.refresh_task.is_some())
            .finish_non_exhaustive()
    }
}

fn lock_state<S>(state: &Mutex<Option<ChartState<S>>>) -> MutexGuard<'_, Option<ChartState<S>>> {
    state.lock().expect("chart state lock is not poisoned")
}

impl<S: Surface + 'static> ChartHandle<S> {
    fn with_state<R>(&self, f: impl FnOnce(&mut ChartState<S>) -> R) -> Result<R, ChartError> {
        let mut guard = lock_state(&self.state);
        guard.as_mut().map(f).ok_or(ChartError::Destroyed)
    }

    /// Replaces the series and redraws. Repeated calls with the same data
    /// produce the same frame.
    pub fn update(&self, series: &PriceSeries) -> Result<(), ChartError> {
        self.with_state(|state| {
            state.series = series.clone();
            state.hovered = None;
            state.draw();
        })
    }

    /// Resizes the backing store to `css * device_pixel_ratio` and redraws.
    pub fn resize(&self, viewport: Viewport) -> Result<(), ChartError> {
        viewport.validate()?;
        self.with_state(|state| {
            state.viewport = viewport;
            state.apply_viewport();
            state.draw();
        })
    }

    /// Highlights the point nearest to `(x, y)` (CSS pixels) if one lies
    /// within the hover threshold; otherwise reverts to the latest point.
    pub fn hover(&self, x: f64, y: f64) -> Result<Option<Readout>, ChartError> {
        self.with_state(|state| {
            let hovered = nearest_within(&state.projected, x, y, state.options.hover_threshold_px);
            if hovered != state.hovered {
                state.hovered = hovered;
                state.draw();
            }
            state.readout()
        })
    }

    pub fn leave(&self) -> Result<Option<Readout>, ChartError> {
        self.with_state(|state| {
            if state.hovered.take().is_some() {
                state.draw();
            }
            state.readout()
        })
    }

    pub fn readout(&self) -> Result<Option<Readout>, ChartError> {
        self.with_state(|state| state.readout())
    }

    pub fn series(&self) -> Result<PriceSeries, ChartError> {
        self.with_state(|state| state.series.clone())
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, ChartError> {
        self.with_state(|state| f(&state.surface))
    }

    pub fn is_destroyed(&self) -> bool {
        lock_state(&self.state).is_none()
    }

    pub fn is_observing_resize(&self) -> bool {
        self.resize_task.is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_task.is_some()
    }

    /// Redraws on every viewport change published to `viewports`. Replaces
    /// any previous watcher.
    pub fn observe_resize(&mut self, mut viewports: watch::Receiver<Viewport>) -> Result<(), ChartError> {
        if self.is_destroyed() {
            return Err(ChartError::Destroyed);
        }
        if let Some(previous) = self.resize_task.take() {
            previous.abort();
        }

        let state = Arc::clone(&self.state);
        self.resize_task = Some(tokio::spawn(async move {
            while viewports.changed().await.is_ok() {
                let viewport = *viewports.borrow_and_update();
                if viewport.validate().is_err() {
                    debug!(?viewport, "ignoring invalid viewport");
                    continue;
                }
                let mut guard = lock_state(&state);
                let Some(chart) = guard.as_mut() else {
                    break;
                };
                chart.viewport = viewport;
                chart.apply_viewport();
                chart.draw();
            }
        }));
        Ok(())
    }

    /// Polls `next_sample` every `every` and folds each sample into the
    /// series as a live update. Replaces any previous refresh task.
    pub fn start_refresh<F, Fut>(&mut self, every: Duration, mut next_sample: F) -> Result<(), ChartError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<PricePoint>> + Send + 'static,
    {
        if self.is_destroyed() {
            return Err(ChartError::Destroyed);
        }
        self.stop_refresh();

        let state = Arc::clone(&self.state);
        self.refresh_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(sample) = next_sample().await else {
                    continue;
                };
                let mut guard = lock_state(&state);
                let Some(chart) = guard.as_mut() else {
                    break;
                };
                chart.series = chart.series.with_live_sample(sample);
                chart.draw();
            }
        }));
        Ok(())
    }

    pub fn stop_refresh(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }

    /// Cancels the refresh task, disconnects the resize watcher and hands the
    /// surface back. Later calls on this handle fail with `Destroyed`.
    pub fn destroy(&mut self) -> Option<S> {
        self.abort_tasks();
        lock_state(&self.state).take().map(|state| state.surface)
    }

    fn abort_tasks(&mut self) {
        if let Some(task) = self.resize_task.take() {
            task.abort();
        }
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

impl<S> Drop for ChartHandle<S> {
    fn drop(&mut self) {
        for task in [self.resize_task.take(), self.refresh_task.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::surface::{DrawOp, RecordingSurface};

    fn series(prices: &[f64]) -> PriceSeries {
        PriceSeries::from_points(
            prices
                .iter()
                .enumerate()
                .map(|(index, &price)| PricePoint { time: index as i64 * 86_400_000, price }),
        )
    }

    #[test]
    fn rejects_degenerate_viewports() {
        assert_eq!(Viewport::new(0.0, 100.0, 1.0), Err(ChartError::InvalidViewport));
        assert_eq!(Viewport::new(100.0, 100.0, f64::NAN), Err(ChartError::InvalidViewport));
        assert_eq!(
            Viewport::new(320.0, 200.0, 2.0).map(|viewport| viewport.pixel_size()),
            Ok((640, 400))
        );
    }

    #[test]
    fn empty_series_renders_placeholder() {
        let handle = ChartRenderer::render(
            RecordingSurface::new(),
            &PriceSeries::default(),
            ChartOptions::default(),
            Viewport::default(),
        )
        .expect("render");

        let texts = handle
            .with_surface(|surface| surface.texts().iter().map(|text| text.to_string()).collect::<Vec<_>>())
            .expect("alive");
        assert_eq!(texts, vec![String::from("No data")]);
        assert_eq!(handle.readout(), Ok(None));
    }

    #[test]
    fn candlestick_style_draws_one_body_per_point() {
        let handle = ChartRenderer::render(
            RecordingSurface::new(),
            &series(&[100.0, 90.0, 95.0]),
            ChartOptions {
                style: ChartStyle::Candlestick,
                ..ChartOptions::default()
            },
            Viewport::default(),
        )
        .expect("render");

        let bodies = handle
            .with_surface(|surface| surface.count(|op| matches!(op, DrawOp::FillRect { .. })))
            .expect("alive");
        assert_eq!(bodies, 3);
    }
}
