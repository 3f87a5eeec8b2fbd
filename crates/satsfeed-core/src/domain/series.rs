use serde::{Deserialize, Serialize};

use crate::clock::EpochMillis;
use crate::PricePoint;

/// Samples closer than this to the last point refine it instead of appending.
pub const LIVE_SAMPLE_WINDOW_MS: EpochMillis = 60_000;

/// Price samples sorted by ascending time with unique timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

/// Summary shown next to a chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub first: PricePoint,
    pub latest: PricePoint,
    pub min: f64,
    pub max: f64,
    /// `(latest - first) / first * 100`.
    pub change_pct: f64,
}

impl PriceSeries {
    /// Sorts by time; for equal timestamps the sample seen last wins.
    pub fn from_points(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut points: Vec<PricePoint> = points.into_iter().collect();
        // Stable sort keeps input order among equal timestamps.
        points.sort_by_key(|point| point.time);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.time == point.time => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Points strictly newer than `cutoff`.
    pub fn since(&self, cutoff: EpochMillis) -> Self {
        let start = self.points.partition_point(|point| point.time <= cutoff);
        Self {
            points: self.points[start..].to_vec(),
        }
    }

    pub fn with_live_sample(&self, sample: PricePoint) -> Self {
        Self {
            points: merge_live_sample(&self.points, sample),
        }
    }

    pub fn stats(&self) -> Option<SeriesStats> {
        let first = *self.points.first()?;
        let latest = *self.points.last()?;
        let (min, max) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), point| {
                (min.min(point.price), max.max(point.price))
            });
        let change_pct = if first.price > 0.0 {
            (latest.price - first.price) / first.price * 100.0
        } else {
            0.0
        };

        Some(SeriesStats {
            first,
            latest,
            min,
            max,
            change_pct,
        })
    }

    pub fn into_points(self) -> Vec<PricePoint> {
        self.points
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::from_points(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points
    }
}

/// Folds a live sample into a sorted series.
///
/// A sample within [`LIVE_SAMPLE_WINDOW_MS`] of the last point (either side)
/// replaces it; a later sample is appended. Samples that would break the
/// ordering (older than the last point by a full window, or landing at or
/// before the second-to-last point) are ignored.
pub fn merge_live_sample(series: &[PricePoint], sample: PricePoint) -> Vec<PricePoint> {
    let mut merged = series.to_vec();
    let Some(last) = merged.last().copied() else {
        merged.push(sample);
        return merged;
    };

    if (sample.time - last.time).abs() < LIVE_SAMPLE_WINDOW_MS {
        let keeps_order = merged
            .len()
            .checked_sub(2)
            .map_or(true, |index| merged[index].time < sample.time);
        if keeps_order {
            if let Some(slot) = merged.last_mut() {
                *slot = sample;
            }
        }
    } else if sample.time > last.time {
        merged.push(sample);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(time: EpochMillis, price: f64) -> PricePoint {
        PricePoint { time, price }
    }

    #[test]
    fn from_points_sorts_and_keeps_last_duplicate() {
        let series = PriceSeries::from_points([point(2, 20.0), point(1, 10.0), point(2, 21.0)]);

        assert_eq!(series.points(), &[point(1, 10.0), point(2, 21.0)]);
    }

    #[test]
    fn sample_inside_window_replaces_last_point() {
        let series = [point(0, 100.0), point(60_000, 101.0)];

        let merged = merge_live_sample(&series, point(60_500, 102.0));

        assert_eq!(merged, vec![point(0, 100.0), point(60_500, 102.0)]);
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let series = [point(0, 100.0)];

        assert_eq!(merge_live_sample(&series, point(59_000, 1.0)).len(), 1);
        assert_eq!(merge_live_sample(&series, point(61_000, 1.0)).len(), 2);
        assert_eq!(merge_live_sample(&series, point(60_000, 1.0)).len(), 2);
    }

    #[test]
    fn empty_series_takes_the_sample() {
        assert_eq!(merge_live_sample(&[], point(5, 1.0)), vec![point(5, 1.0)]);
    }

    #[test]
    fn out_of_order_samples_are_ignored() {
        let series = [point(0, 1.0), point(30_000, 2.0), point(200_000, 3.0)];

        assert_eq!(merge_live_sample(&series, point(100_000, 9.0)), series.to_vec());
        assert_eq!(merge_live_sample(&series[..2], point(-10_000, 9.0)), series[..2].to_vec());
    }

    #[test]
    fn since_keeps_points_strictly_after_cutoff() {
        let series = PriceSeries::from_points([point(1, 1.0), point(2, 2.0), point(3, 3.0)]);

        assert_eq!(series.since(2).points(), &[point(3, 3.0)]);
        assert!(series.since(3).is_empty());
    }

    #[test]
    fn stats_report_range_change() {
        let series = PriceSeries::from_points([point(1, 100.0), point(2, 80.0), point(3, 120.0)]);

        let stats = series.stats().expect("non-empty");

        assert_eq!(stats.min, 80.0);
        assert_eq!(stats.max, 120.0);
        assert!((stats.change_pct - 20.0).abs() < 1e-9);
        assert!(PriceSeries::default().stats().is_none());
    }
}
