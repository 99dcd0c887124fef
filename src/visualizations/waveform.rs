//! Time-domain waveform plot.
//!
//! Draws the most recent ring window as a trace centred on y = 0.5. When the
//! window has more samples than the plot has columns, each column keeps the
//! sample farthest from zero so transients stay visible.

use crate::analysis::{Decimation, PlotCurve, PlotGeometryBuilder};
use crate::error::ConfigurationError;
use crate::pipeline::{skip_reason, CurveUpdate, PlotPipeline, SampleReader};

/// Oscilloscope-style trace of the latest samples.
pub struct WaveformPipeline {
    reader: SampleReader,
    window: Vec<f32>,
    values: Vec<f32>,
    positions: Vec<f32>,
    builder: PlotGeometryBuilder,
    curve: PlotCurve,
    peak: Option<f32>,
}

impl WaveformPipeline {
    /// Plots the newest `window_len` samples of the ring.
    ///
    /// # Errors
    /// - If `window_len` is zero or larger than the ring
    pub fn new(reader: SampleReader, window_len: usize) -> Result<Self, ConfigurationError> {
        if window_len == 0 || window_len > reader.capacity() {
            return Err(ConfigurationError::WindowLengthMismatch {
                expected: reader.capacity(),
                actual: window_len,
            });
        }

        let last = window_len.saturating_sub(1).max(1) as f32;
        let positions = (0..window_len).map(|i| i as f32 / last).collect();

        Ok(Self {
            reader,
            window: vec![0.0; window_len],
            values: vec![0.5; window_len],
            positions,
            builder: PlotGeometryBuilder::new(Decimation::Extreme),
            curve: PlotCurve::new(),
            peak: None,
        })
    }
}

impl PlotPipeline for WaveformPipeline {
    fn name(&self) -> &'static str {
        "waveform"
    }

    fn current_curve(&mut self, pixel_width: usize) -> CurveUpdate<'_> {
        let status = self.reader.snapshot_into(&mut self.window);
        if let Some(reason) = skip_reason(status, self.window.len()) {
            return CurveUpdate::Skipped(reason);
        }

        let mut peak = 0.0f32;
        for (value, &sample) in self.values.iter_mut().zip(&self.window) {
            let sample = if sample.is_finite() {
                sample.clamp(-1.0, 1.0)
            } else {
                0.0
            };
            peak = peak.max(sample.abs());
            *value = (sample + 1.0) * 0.5;
        }
        self.peak = Some(peak);

        self.builder
            .build_into(&self.values, &self.positions, pixel_width, &mut self.curve);
        CurveUpdate::Ready(&self.curve)
    }

    fn summary(&self) -> Option<String> {
        self.peak.map(|p| format!("peak {:.0}%", p * 100.0))
    }

    fn dropped_writes(&self) -> u64 {
        self.reader.dropped_writes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sample_ring;

    #[test]
    fn test_trace_maps_samples_around_centre() {
        let (mut writer, reader) = sample_ring(8, 44100).unwrap();
        let mut pipeline = WaveformPipeline::new(reader, 4).unwrap();
        assert!(matches!(pipeline.current_curve(100), CurveUpdate::Skipped(_)));

        writer.write(&[0.9, 0.9, -1.0, 0.0, 1.0, f32::NAN]);
        let CurveUpdate::Ready(curve) = pipeline.current_curve(100) else {
            panic!("waveform should be primed");
        };
        let ys: Vec<f32> = curve.points().iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![0.0, 0.5, 1.0, 0.5]);
        assert_eq!(pipeline.summary().as_deref(), Some("peak 100%"));
    }

    #[test]
    fn test_columns_keep_extremes() {
        let (mut writer, reader) = sample_ring(4, 44100).unwrap();
        let mut pipeline = WaveformPipeline::new(reader, 4).unwrap();
        writer.write(&[0.1, -0.8, 0.2, 0.0]);

        let CurveUpdate::Ready(curve) = pipeline.current_curve(1) else {
            panic!("waveform should be primed");
        };
        assert_eq!(curve.len(), 1);
        assert!((curve.points()[0].y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_window_longer_than_ring_rejected() {
        let (_writer, reader) = sample_ring(4, 44100).unwrap();
        assert!(WaveformPipeline::new(reader, 8).is_err());
    }
}
