//! Polyline construction from scaled bins.
//!
//! Bins are bucketed into at most `pixel_width` columns. When several bins
//! share a column the column keeps the maximum amplitude, so narrow peaks
//! survive decimation instead of being averaged away.

use super::scaler::ScaledSpectrum;

/// A vertex in normalized plot space, both coordinates in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub x: f32,
    pub y: f32,
}

impl PlotPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ordered polyline with strictly increasing `x`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotCurve {
    points: Vec<PlotPoint>,
}

impl PlotCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Curve from points the caller guarantees are sorted by strictly
    /// increasing `x`.
    pub fn from_points(points: Vec<PlotPoint>) -> Self {
        debug_assert!(points.windows(2).all(|p| p[0].x < p[1].x));
        Self { points }
    }

    pub fn points(&self) -> &[PlotPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Highest point; the leftmost wins ties.
    pub fn peak(&self) -> Option<PlotPoint> {
        self.points
            .iter()
            .copied()
            .fold(None, |best: Option<PlotPoint>, p| match best {
                Some(top) if top.y >= p.y => best,
                _ => Some(p),
            })
    }

    /// Replaces the contents with `other`'s, reusing this curve's allocation.
    pub fn copy_from(&mut self, other: &PlotCurve) {
        self.points.clear();
        self.points.extend_from_slice(&other.points);
    }

    fn clear(&mut self) {
        self.points.clear();
    }

    fn push(&mut self, point: PlotPoint) {
        self.points.push(point);
    }
}

/// How bins sharing a column are reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decimation {
    /// Largest value wins
    #[default]
    MaxHold,
    /// Value farthest from the 0.5 centre line wins, for signed traces
    Extreme,
}

impl Decimation {
    fn keep(self, current: f32, candidate: f32) -> f32 {
        match self {
            Decimation::MaxHold => current.max(candidate),
            Decimation::Extreme => {
                if (candidate - 0.5).abs() > (current - 0.5).abs() {
                    candidate
                } else {
                    current
                }
            }
        }
    }
}

/// Builds polylines, reusing its column scratch space between frames.
#[derive(Debug, Clone, Default)]
pub struct PlotGeometryBuilder {
    decimation: Decimation,
    columns: Vec<Option<f32>>,
}

impl PlotGeometryBuilder {
    pub fn new(decimation: Decimation) -> Self {
        Self {
            decimation,
            columns: Vec::new(),
        }
    }

    /// Convenience wrapper around [`Self::build_into`] for scaled spectra.
    pub fn build(&mut self, scaled: &ScaledSpectrum, pixel_width: usize) -> PlotCurve {
        let mut curve = PlotCurve::new();
        self.build_into(scaled.amplitudes(), scaled.positions(), pixel_width, &mut curve);
        curve
    }

    /// Rebuilds `out` from per-bin `values` at horizontal `positions`.
    ///
    /// Uses `min(pixel_width, values.len())` columns. Bin `i` falls into
    /// column `round(positions[i] * (columns - 1))`; empty columns produce no
    /// point. With evenly spaced positions and enough pixels this yields
    /// exactly one point per bin.
    pub fn build_into(
        &mut self,
        values: &[f32],
        positions: &[f32],
        pixel_width: usize,
        out: &mut PlotCurve,
    ) {
        out.clear();

        let bins = values.len().min(positions.len());
        let columns = pixel_width.min(bins);
        if columns == 0 {
            return;
        }

        self.columns.clear();
        self.columns.resize(columns, None);

        let last = (columns - 1) as f32;
        for (&value, &position) in values.iter().zip(positions) {
            let column = ((position.clamp(0.0, 1.0) * last).round() as usize).min(columns - 1);
            let slot = &mut self.columns[column];
            *slot = Some(match *slot {
                Some(current) => self.decimation.keep(current, value),
                None => value,
            });
        }

        for (column, value) in self.columns.iter().enumerate() {
            if let Some(y) = *value {
                let x = if columns == 1 { 0.0 } else { column as f32 / last };
                out.push(PlotPoint::new(x, y));
            }
        }
    }
}
