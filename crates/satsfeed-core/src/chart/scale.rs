use crate::PricePoint;

/// Plot margins in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 14.0,
            right: 16.0,
            bottom: 28.0,
            left: 56.0,
        }
    }
}

/// Drawable rectangle inside the margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlotArea {
    pub fn new(css_width: f64, css_height: f64, margins: Margins) -> Self {
        Self {
            x: margins.left,
            y: margins.top,
            width: (css_width - margins.left - margins.right).max(1.0),
            height: (css_height - margins.top - margins.bottom).max(1.0),
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Y extent padded by a fraction of `max(max - min, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    pub min: f64,
    pub max: f64,
}

impl PriceScale {
    pub fn from_points(points: &[PricePoint], padding_fraction: f64) -> Option<Self> {
        let (low, high) = points.iter().fold(None, |extent: Option<(f64, f64)>, point| {
            Some(match extent {
                Some((low, high)) => (low.min(point.price), high.max(point.price)),
                None => (point.price, point.price),
            })
        })?;
        let padding = (high - low).max(1.0) * padding_fraction;
        Some(Self {
            min: low - padding,
            max: high + padding,
        })
    }

    pub fn span(&self) -> f64 {
        (self.max - self.min).max(f64::EPSILON)
    }

    pub fn y_for(&self, price: f64, area: &PlotArea) -> f64 {
        area.bottom() - (price - self.min) / self.span() * area.height
    }

    pub fn price_at(&self, y: f64, area: &PlotArea) -> f64 {
        self.min + (area.bottom() - y) / area.height * self.span()
    }
}

/// X position of sample `index` out of `count`; points are spaced by index.
pub fn x_for(index: usize, count: usize, area: &PlotArea) -> f64 {
    if count <= 1 {
        return area.x + area.width / 2.0;
    }
    area.x + index as f64 / (count - 1) as f64 * area.width
}

pub fn project(points: &[PricePoint], scale: &PriceScale, area: &PlotArea) -> Vec<(f64, f64)> {
    points
        .iter()
        .enumerate()
        .map(|(index, point)| (x_for(index, points.len(), area), scale.y_for(point.price, area)))
        .collect()
}

/// Index of the projected point nearest to `(x, y)` within `threshold`.
pub fn nearest_within(projected: &[(f64, f64)], x: f64, y: f64, threshold: f64) -> Option<usize> {
    projected
        .iter()
        .enumerate()
        .map(|(index, &(px, py))| (index, (px - x).hypot(py - y)))
        .filter(|&(_, distance)| distance <= threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}
