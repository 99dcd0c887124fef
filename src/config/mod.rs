//! Configuration management for specline.
//!
//! Loads and saves the TOML settings file and turns its sections into the
//! typed settings used by the analysis and render layers.

pub mod file;

pub use file::{
    get_config_path, AnalysisConfig, AudioConfig, DisplayConfig, ScaleSection, SpeclineConfig,
    VisualizationType,
};
