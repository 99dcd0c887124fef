//! Configuration errors raised while building the analysis pipeline.
//!
//! These only surface at construction or reconfiguration time. Once a
//! pipeline is running, nothing on the audio or render path returns one.

use thiserror::Error;

/// A rejected configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("FFT size {0} is not a power of two")]
    FftSizeNotPowerOfTwo(usize),

    #[error("FFT size {size} is below the minimum of {min}")]
    FftSizeTooSmall { size: usize, min: usize },

    #[error("sample window has {actual} samples but the analyzer expects {expected}")]
    WindowLengthMismatch { expected: usize, actual: usize },

    #[error("invalid dB range [{min}, {max}]: bounds must be finite and min < max")]
    InvalidDbRange { min: f32, max: f32 },

    #[error("amplitude floor {0} must be finite and greater than zero")]
    InvalidAmplitudeFloor(f32),

    #[error("minimum frequency {min_hz} Hz must lie between 0 and the Nyquist frequency {nyquist_hz} Hz")]
    InvalidMinFrequency { min_hz: f32, nyquist_hz: f32 },

    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,

    #[error("channel count must be greater than zero")]
    InvalidChannelCount,

    #[error("malformed audio frame: {0}")]
    MalformedFrame(String),

    #[error("ring buffer capacity must be greater than zero")]
    InvalidCapacity,

    #[error("line width {0} must be finite and greater than zero")]
    InvalidLineWidth(f32),

    #[error("frame rate {0} fps is outside the supported range 1-240")]
    InvalidFrameRate(u32),
}
