//! Magnitude to plot-space scaling.
//!
//! Amplitudes are compressed to decibels and remapped from a configured dB
//! range onto `[0, 1]`. Each bin's horizontal position is fixed when the
//! scaler is built, so the plot never shifts sideways between frames.

use serde::{Deserialize, Serialize};

use super::analyzer::MagnitudeSpectrum;
use crate::error::ConfigurationError;

/// How bins are spread along the horizontal axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyAxis {
    /// Evenly spaced bins, DC at the left edge and Nyquist at the right
    #[default]
    Linear,
    /// Octaves evenly spaced from the minimum frequency up to Nyquist
    Logarithmic,
}

impl std::fmt::Display for FrequencyAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Logarithmic => write!(f, "logarithmic"),
        }
    }
}

/// Scaling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleConfig {
    /// Level drawn at the bottom of the plot
    pub db_min: f32,
    /// Level drawn at the top of the plot
    pub db_max: f32,
    /// Magnitudes below this are raised to it before taking the logarithm
    pub amplitude_floor: f32,
    pub axis: FrequencyAxis,
    /// Left edge of a logarithmic axis; lower bins are pinned there
    pub min_frequency_hz: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            db_min: -60.0,
            db_max: 0.0,
            amplitude_floor: 1e-6,
            axis: FrequencyAxis::Linear,
            min_frequency_hz: 20.0,
        }
    }
}

/// Normalized amplitudes and the fixed horizontal position of each bin.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledSpectrum {
    amplitudes: Vec<f32>,
    positions: Vec<f32>,
}

impl ScaledSpectrum {
    /// Amplitude of each bin in `[0, 1]`.
    pub fn amplitudes(&self) -> &[f32] {
        &self.amplitudes
    }

    /// Horizontal position of each bin in `[0, 1]`, non-decreasing.
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    /// Drops every amplitude to the bottom of the plot.
    pub(crate) fn silence(&mut self) {
        self.amplitudes.fill(0.0);
    }
}

/// Converts magnitude spectra into normalized plot amplitudes.
#[derive(Debug, Clone)]
pub struct SpectrumScaler {
    config: ScaleConfig,
    positions: Vec<f32>,
}

impl SpectrumScaler {
    /// Builds a scaler for spectra produced by an `fft_size`-point analysis
    /// at `sample_rate`.
    ///
    /// # Errors
    /// - If the dB range is not finite or not increasing
    /// - If the amplitude floor is not a positive finite number
    /// - If a logarithmic axis starts outside `(0, nyquist)`
    pub fn new(
        config: ScaleConfig,
        fft_size: usize,
        sample_rate: u32,
    ) -> Result<Self, ConfigurationError> {
        validate_scale(&config, sample_rate)?;

        let bins = fft_size / 2 + 1;
        let positions = match config.axis {
            FrequencyAxis::Linear => linear_positions(bins),
            FrequencyAxis::Logarithmic => {
                log_positions(bins, fft_size, sample_rate, config.min_frequency_hz)
            }
        };

        Ok(Self { config, positions })
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    /// Allocates an output buffer with positions already filled in.
    pub fn new_output(&self) -> ScaledSpectrum {
        ScaledSpectrum {
            amplitudes: vec![0.0; self.positions.len()],
            positions: self.positions.clone(),
        }
    }

    /// Scales `spectrum` into a freshly allocated buffer.
    pub fn scale(&self, spectrum: &MagnitudeSpectrum) -> ScaledSpectrum {
        let mut out = self.new_output();
        self.scale_into(spectrum, &mut out);
        out
    }

    /// Scales `spectrum` into `out`, which must come from [`Self::new_output`].
    ///
    /// Every amplitude lands in `[0, 1]`; non-finite magnitudes become 0.
    pub fn scale_into(&self, spectrum: &MagnitudeSpectrum, out: &mut ScaledSpectrum) {
        let ScaleConfig {
            db_min,
            db_max,
            amplitude_floor,
            ..
        } = self.config;
        let range = db_max - db_min;

        out.amplitudes.fill(0.0);
        for (amplitude, &magnitude) in out.amplitudes.iter_mut().zip(spectrum.magnitudes()) {
            if !magnitude.is_finite() {
                continue;
            }
            let db = 20.0 * magnitude.max(amplitude_floor).log10();
            let normalized = ((db - db_min) / range).clamp(0.0, 1.0);
            if normalized.is_finite() {
                *amplitude = normalized;
            }
        }
    }
}

fn validate_scale(config: &ScaleConfig, sample_rate: u32) -> Result<(), ConfigurationError> {
    if !(config.db_min.is_finite() && config.db_max.is_finite() && config.db_min < config.db_max)
    {
        return Err(ConfigurationError::InvalidDbRange {
            min: config.db_min,
            max: config.db_max,
        });
    }
    if !(config.amplitude_floor.is_finite() && config.amplitude_floor > 0.0) {
        return Err(ConfigurationError::InvalidAmplitudeFloor(
            config.amplitude_floor,
        ));
    }
    if sample_rate == 0 {
        return Err(ConfigurationError::InvalidSampleRate);
    }
    if config.axis == FrequencyAxis::Logarithmic {
        let nyquist_hz = sample_rate as f32 / 2.0;
        let min_hz = config.min_frequency_hz;
        if !(min_hz.is_finite() && min_hz > 0.0 && min_hz < nyquist_hz) {
            return Err(ConfigurationError::InvalidMinFrequency { min_hz, nyquist_hz });
        }
    }
    Ok(())
}

fn linear_positions(bins: usize) -> Vec<f32> {
    if bins <= 1 {
        return vec![0.0; bins];
    }
    let last = (bins - 1) as f32;
    (0..bins).map(|i| i as f32 / last).collect()
}

fn log_positions(bins: usize, fft_size: usize, sample_rate: u32, min_hz: f32) -> Vec<f32> {
    let resolution = sample_rate as f32 / fft_size as f32;
    let log_min = min_hz.ln();
    let log_span = (sample_rate as f32 / 2.0).ln() - log_min;

    (0..bins)
        .map(|i| {
            let frequency = i as f32 * resolution;
            if frequency <= min_hz {
                0.0
            } else {
                ((frequency.ln() - log_min) / log_span).clamp(0.0, 1.0)
            }
        })
        .collect()
}
