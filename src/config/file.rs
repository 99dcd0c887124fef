//! Configuration file management for specline.
//!
//! Settings live in a TOML file in the user's config directory. Every section
//! and field has a default, so a missing file or a partial one is fine.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::{
    validate_fft_size, FrequencyAxis, ScaleConfig, SpectrumScaler, DEFAULT_FFT_SIZE,
};
use crate::error::ConfigurationError;
use crate::render::{AppearanceConfig, Placeholder, Rgb};

/// Plot shown in the live view.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationType {
    /// Time-domain waveform of the latest window
    Waveform,
    /// Frequency spectrum of the latest window
    #[default]
    Spectrum,
}

impl std::fmt::Display for VisualizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waveform => write!(f, "waveform"),
            Self::Spectrum => write!(f, "spectrum"),
        }
    }
}

/// Audio input selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `specline list-devices`
    /// - device name from `specline list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Expected sample rate in Hz; the device's native rate wins if they differ
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
        }
    }
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

/// FFT settings, fixed for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Points per FFT; a power of two of at least 16
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
        }
    }
}

fn default_fft_size() -> usize {
    DEFAULT_FFT_SIZE
}

/// Amplitude and frequency axis mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaleSection {
    /// Level at the bottom of the plot in dB
    #[serde(default = "default_db_min")]
    pub db_min: f32,
    /// Level at the top of the plot in dB
    #[serde(default = "default_db_max")]
    pub db_max: f32,
    /// Magnitudes below this are clamped before the dB conversion
    #[serde(default = "default_amplitude_floor")]
    pub amplitude_floor: f32,
    /// "linear" or "logarithmic"
    #[serde(default)]
    pub frequency_axis: FrequencyAxis,
    /// Left edge of a logarithmic axis in Hz
    #[serde(default = "default_min_frequency_hz")]
    pub min_frequency_hz: f32,
}

impl Default for ScaleSection {
    fn default() -> Self {
        Self {
            db_min: default_db_min(),
            db_max: default_db_max(),
            amplitude_floor: default_amplitude_floor(),
            frequency_axis: FrequencyAxis::default(),
            min_frequency_hz: default_min_frequency_hz(),
        }
    }
}

fn default_db_min() -> f32 {
    ScaleConfig::default().db_min
}

fn default_db_max() -> f32 {
    ScaleConfig::default().db_max
}

fn default_amplitude_floor() -> f32 {
    ScaleConfig::default().amplitude_floor
}

fn default_min_frequency_hz() -> f32 {
    ScaleConfig::default().min_frequency_hz
}

/// Live view settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    /// Redraws per second
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// "spectrum" (frequency-based) or "waveform" (time-based amplitude)
    #[serde(default)]
    pub visualization: VisualizationType,
    /// Plot line colour as [r, g, b]
    #[serde(default = "default_line_color")]
    pub line_color: Rgb,
    /// Plot line width; 1 draws braille dots, up to 2 half blocks, above that full blocks
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    /// Shown until the first window is analyzed: "flat" or "demo"
    #[serde(default)]
    pub placeholder: Placeholder,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            visualization: VisualizationType::default(),
            line_color: default_line_color(),
            line_width: default_line_width(),
            placeholder: Placeholder::default(),
        }
    }
}

fn default_fps() -> u32 {
    30
}

fn default_line_color() -> Rgb {
    AppearanceConfig::default().line_color
}

fn default_line_width() -> f32 {
    AppearanceConfig::default().line_width
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpeclineConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scale: ScaleSection,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl SpeclineConfig {
    /// Loads configuration from the user's config directory, falling back to
    /// defaults when no file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    /// - If the file cannot be read
    /// - If the TOML is malformed
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SpeclineConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved to {}", config_path.display());
        Ok(())
    }

    /// Scaling parameters for the spectrum pipeline.
    pub fn scale_config(&self) -> ScaleConfig {
        ScaleConfig {
            db_min: self.scale.db_min,
            db_max: self.scale.db_max,
            amplitude_floor: self.scale.amplitude_floor,
            axis: self.scale.frequency_axis,
            min_frequency_hz: self.scale.min_frequency_hz,
        }
    }

    /// Line appearance for the render driver.
    ///
    /// # Errors
    /// - If the line width is not a positive finite number
    pub fn appearance(&self) -> Result<AppearanceConfig, ConfigurationError> {
        AppearanceConfig::new(self.display.line_color, self.display.line_width)
    }

    /// Time between redraws.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.display.fps.max(1) as f64)
    }

    /// Checks every value that can be checked before the device is opened.
    ///
    /// The scale is checked against the configured sample rate; it is checked
    /// again against the device rate when the pipeline is built.
    ///
    /// # Errors
    /// - The first invalid setting found
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_fft_size(self.analysis.fft_size)?;
        if !(1..=240).contains(&self.display.fps) {
            return Err(ConfigurationError::InvalidFrameRate(self.display.fps));
        }
        self.appearance()?;
        SpectrumScaler::new(
            self.scale_config(),
            self.analysis.fft_size,
            self.audio.sample_rate,
        )?;
        Ok(())
    }
}

/// Retrieves the path to the config file, creating its directory.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let config_dir = home.join(".config").join("specline");
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    Ok(config_dir.join("specline.toml"))
}
