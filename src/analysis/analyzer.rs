//! Windowed FFT magnitude analysis.
//!
//! Converts one window of mono samples into a single-sided magnitude
//! spectrum. The transform is planned once per analyzer and every buffer is
//! preallocated, so [`SpectralAnalyzer::analyze`] does no allocation on the
//! render path.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::ConfigurationError;

/// FFT size used when none is configured.
pub const DEFAULT_FFT_SIZE: usize = 1024;

/// Smallest FFT size accepted.
pub const MIN_FFT_SIZE: usize = 16;

/// Checks that `size` is a usable FFT length.
///
/// # Errors
/// - If `size` is not a power of two
/// - If `size` is below [`MIN_FFT_SIZE`]
pub fn validate_fft_size(size: usize) -> Result<(), ConfigurationError> {
    if !size.is_power_of_two() {
        return Err(ConfigurationError::FftSizeNotPowerOfTwo(size));
    }
    if size < MIN_FFT_SIZE {
        return Err(ConfigurationError::FftSizeTooSmall {
            size,
            min: MIN_FFT_SIZE,
        });
    }
    Ok(())
}

/// Single-sided magnitudes for bins `0..=N/2` (DC through Nyquist).
///
/// Bins `1..N/2` are doubled to fold in the negative-frequency half, so a
/// sinusoid of amplitude `A` centred on a bin reads about `A / 2` after the
/// Hann window's coherent gain. DC and Nyquist are not doubled.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeSpectrum {
    magnitudes: Vec<f32>,
    fft_size: usize,
    sample_rate: u32,
}

impl MagnitudeSpectrum {
    fn zeroed(fft_size: usize, sample_rate: u32) -> Self {
        Self {
            magnitudes: vec![0.0; fft_size / 2 + 1],
            fft_size,
            sample_rate,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_magnitudes(magnitudes: Vec<f32>, fft_size: usize, sample_rate: u32) -> Self {
        Self {
            magnitudes,
            fft_size,
            sample_rate,
        }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width of one bin in Hz.
    fn resolution_hz(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Centre frequency of `bin` in Hz.
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.resolution_hz()
    }

    /// Bin whose centre is nearest `frequency_hz`, clamped to the spectrum.
    pub fn bin_for_frequency(&self, frequency_hz: f32) -> usize {
        let bin = (frequency_hz / self.resolution_hz()).round().max(0.0) as usize;
        bin.min(self.len().saturating_sub(1))
    }

    /// Index of the largest magnitude; the lowest bin wins ties.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &m)| match best {
                Some((_, top)) if top >= m => best,
                _ => Some((i, m)),
            })
            .map(|(i, _)| i)
    }
}

/// Stateful analyzer for one fixed FFT size.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    spectrum: MagnitudeSpectrum,
}

impl SpectralAnalyzer {
    /// Plans an FFT of `fft_size` points for audio at `sample_rate`.
    ///
    /// # Errors
    /// - If `fft_size` is not a power of two or is too small
    /// - If `sample_rate` is zero
    pub fn new(fft_size: usize, sample_rate: u32) -> Result<Self, ConfigurationError> {
        validate_fft_size(fft_size)?;
        if sample_rate == 0 {
            return Err(ConfigurationError::InvalidSampleRate);
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft,
            window: hann_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            spectrum: MagnitudeSpectrum::zeroed(fft_size, sample_rate),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.spectrum.sample_rate
    }

    /// Number of magnitude bins each analysis produces.
    pub fn bins(&self) -> usize {
        self.spectrum.len()
    }

    /// Most recent result, all zeros before the first analysis.
    pub fn spectrum(&self) -> &MagnitudeSpectrum {
        &self.spectrum
    }

    /// Windows `samples`, transforms them, and returns the magnitude spectrum.
    ///
    /// Non-finite samples are treated as silence.
    ///
    /// # Errors
    /// - If `samples.len()` differs from the configured FFT size
    pub fn analyze(&mut self, samples: &[f32]) -> Result<&MagnitudeSpectrum, ConfigurationError> {
        let n = self.fft_size();
        if samples.len() != n {
            return Err(ConfigurationError::WindowLengthMismatch {
                expected: n,
                actual: samples.len(),
            });
        }

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(samples).zip(&self.window) {
            let sample = if sample.is_finite() { sample } else { 0.0 };
            *slot = Complex::new(sample * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / n as f32;
        let nyquist = n / 2;
        for (bin, magnitude) in self.spectrum.magnitudes.iter_mut().enumerate() {
            let value = self.buffer[bin].norm_sqr().sqrt() * scale;
            *magnitude = if bin == 0 || bin == nyquist {
                value
            } else {
                value * 2.0
            };
        }

        Ok(&self.spectrum)
    }
}

/// Symmetric Hann window: `0.5 - 0.5 cos(2πi / (N - 1))`.
fn hann_window(size: usize) -> Vec<f32> {
    let denominator = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / denominator;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_output_length_and_values_for_all_sizes() {
        for size in [64, 128, 256, 512, 1024, 2048, 4096] {
            let mut analyzer = SpectralAnalyzer::new(size, 48000).unwrap();
            let input = sine(1000.0, 0.8, 48000, size);
            let spectrum = analyzer.analyze(&input).unwrap();
            assert_eq!(spectrum.len(), size / 2 + 1);
            assert!(spectrum
                .magnitudes()
                .iter()
                .all(|m| m.is_finite() && *m >= 0.0));
        }
    }

    #[test]
    fn test_silence_is_exactly_zero() {
        let mut analyzer = SpectralAnalyzer::new(1024, 44100).unwrap();
        let spectrum = analyzer.analyze(&[0.0; 1024]).unwrap();
        assert!(spectrum.magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_sine_peaks_at_nearest_bin() {
        let sample_rate = 44100;
        for (size, frequency) in [(1024, 440.0), (2048, 3000.0), (256, 5000.0)] {
            let mut analyzer = SpectralAnalyzer::new(size, sample_rate).unwrap();
            let spectrum = analyzer
                .analyze(&sine(frequency, 0.5, sample_rate, size))
                .unwrap();
            let expected = spectrum.bin_for_frequency(frequency);
            let peak = spectrum.peak_bin().unwrap();
            assert!(
                peak.abs_diff(expected) <= 1,
                "{frequency} Hz at N={size}: peak bin {peak}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_bin_centred_sine_amplitude() {
        let size = 1024;
        let sample_rate = 48000;
        let bin = 32;
        let frequency = bin as f32 * sample_rate as f32 / size as f32;
        let mut analyzer = SpectralAnalyzer::new(size, sample_rate).unwrap();
        let spectrum = analyzer
            .analyze(&sine(frequency, 1.0, sample_rate, size))
            .unwrap();
        let magnitude = spectrum.magnitudes()[bin];
        assert!((magnitude - 0.5).abs() < 0.01, "magnitude {magnitude}");
    }

    #[test]
    fn test_non_finite_samples_are_silenced() {
        let mut analyzer = SpectralAnalyzer::new(64, 44100).unwrap();
        let mut input = vec![0.0; 64];
        input[10] = f32::NAN;
        input[20] = f32::INFINITY;
        let spectrum = analyzer.analyze(&input).unwrap();
        assert!(spectrum.magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_configuration_errors() {
        assert!(matches!(
            SpectralAnalyzer::new(1000, 44100),
            Err(ConfigurationError::FftSizeNotPowerOfTwo(1000))
        ));
        assert!(matches!(
            SpectralAnalyzer::new(8, 44100),
            Err(ConfigurationError::FftSizeTooSmall { size: 8, .. })
        ));
        assert!(matches!(
            SpectralAnalyzer::new(1024, 0),
            Err(ConfigurationError::InvalidSampleRate)
        ));

        let mut analyzer = SpectralAnalyzer::new(1024, 44100).unwrap();
        assert_eq!(
            analyzer.analyze(&[0.0; 512]).unwrap_err(),
            ConfigurationError::WindowLengthMismatch {
                expected: 1024,
                actual: 512
            }
        );
    }

    #[test]
    fn test_hann_window_endpoints() {
        let window = hann_window(1024);
        assert!(window[0].abs() < 1e-7);
        assert!(window[1023].abs() < 1e-6);
        assert!(window.iter().all(|w| (0.0..=1.0).contains(w)));
    }

    #[test]
    fn test_bin_frequency_mapping() {
        let analyzer = SpectralAnalyzer::new(1024, 44100).unwrap();
        let spectrum = analyzer.spectrum();
        assert_eq!(spectrum.bin_frequency(0), 0.0);
        assert_eq!(spectrum.bin_for_frequency(440.0), 10);
        assert_eq!(spectrum.bin_for_frequency(1.0e9), 512);
    }
}
