//! Frequency spectrum plot.
//!
//! Pulls the latest window from the sample ring and runs it through
//! analysis, scaling, and max-hold decimation. Every buffer is sized at
//! construction, so a tick only allocates when the plot width grows.

use crate::analysis::{
    Decimation, MagnitudeSpectrum, PlotCurve, PlotGeometryBuilder, ScaleConfig, ScaledSpectrum,
    SpectralAnalyzer, SpectrumScaler,
};
use crate::error::ConfigurationError;
use crate::pipeline::{skip_reason, CurveUpdate, PlotPipeline, SampleReader};

/// FFT line plot of the most recent ring window.
pub struct SpectrumPipeline {
    reader: SampleReader,
    window: Vec<f32>,
    analyzer: SpectralAnalyzer,
    scaler: SpectrumScaler,
    scaled: ScaledSpectrum,
    builder: PlotGeometryBuilder,
    curve: PlotCurve,
    analyzed: bool,
}

impl SpectrumPipeline {
    /// Builds a pipeline whose FFT size is the ring's capacity.
    ///
    /// # Errors
    /// - If the ring capacity is not a valid FFT size
    /// - If the scale configuration is invalid
    pub fn new(reader: SampleReader, scale: ScaleConfig) -> Result<Self, ConfigurationError> {
        let fft_size = reader.capacity();
        let sample_rate = reader.sample_rate();
        let analyzer = SpectralAnalyzer::new(fft_size, sample_rate)?;
        let scaler = SpectrumScaler::new(scale, fft_size, sample_rate)?;
        let scaled = scaler.new_output();

        tracing::debug!(
            "Spectrum pipeline: {} point FFT at {}Hz, {} bins, {} axis, {}..{} dB",
            fft_size,
            sample_rate,
            analyzer.bins(),
            scale.axis,
            scale.db_min,
            scale.db_max
        );

        Ok(Self {
            reader,
            window: vec![0.0; fft_size],
            analyzer,
            scaler,
            scaled,
            builder: PlotGeometryBuilder::new(Decimation::MaxHold),
            curve: PlotCurve::new(),
            analyzed: false,
        })
    }

    /// Magnitudes from the latest analysis.
    pub fn spectrum(&self) -> &MagnitudeSpectrum {
        self.analyzer.spectrum()
    }
}

impl PlotPipeline for SpectrumPipeline {
    fn name(&self) -> &'static str {
        "spectrum"
    }

    fn current_curve(&mut self, pixel_width: usize) -> CurveUpdate<'_> {
        let status = self.reader.snapshot_into(&mut self.window);
        if let Some(reason) = skip_reason(status, self.window.len()) {
            return CurveUpdate::Skipped(reason);
        }

        match self.analyzer.analyze(&self.window) {
            Ok(spectrum) => self.scaler.scale_into(spectrum, &mut self.scaled),
            Err(e) => {
                tracing::warn!("Spectrum analysis failed, drawing flat: {}", e);
                self.scaled.silence();
            }
        }
        self.analyzed = true;

        self.builder.build_into(
            self.scaled.amplitudes(),
            self.scaled.positions(),
            pixel_width,
            &mut self.curve,
        );
        CurveUpdate::Ready(&self.curve)
    }

    fn summary(&self) -> Option<String> {
        if !self.analyzed {
            return None;
        }
        let spectrum = self.analyzer.spectrum();
        let peak = spectrum.peak_bin()?;
        if spectrum.magnitudes()[peak] <= self.scaler.config().amplitude_floor {
            return Some("silence".to_string());
        }
        Some(format!("peak {:.0} Hz", spectrum.bin_frequency(peak)))
    }

    fn dropped_writes(&self) -> u64 {
        self.reader.dropped_writes()
    }
}
