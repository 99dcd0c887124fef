//! Spectrum analysis: windowed FFT, magnitude scaling, and plot geometry.

pub mod analyzer;
pub mod geometry;
pub mod scaler;

pub use analyzer::{validate_fft_size, MagnitudeSpectrum, SpectralAnalyzer, DEFAULT_FFT_SIZE};
pub use geometry::{Decimation, PlotCurve, PlotGeometryBuilder, PlotPoint};
pub use scaler::{FrequencyAxis, ScaleConfig, ScaledSpectrum, SpectrumScaler};
