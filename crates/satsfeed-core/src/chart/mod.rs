//! Line/area and candlestick rendering onto a canvas-like [`Surface`].

mod renderer;
mod scale;
mod surface;

pub use renderer::{ChartError, ChartHandle, ChartOptions, ChartRenderer, ChartStyle, Readout, Viewport};
pub use scale::{nearest_within, project, Margins, PlotArea, PriceScale};
pub use surface::{DrawOp, RecordingSurface, Surface, SvgSurface, TextAlign};
