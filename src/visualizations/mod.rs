//! Plot variants for the live view.
//!
//! Each module provides one [`PlotPipeline`]. New plot types can be added by
//! creating a module here and a matching [`VisualizationType`] variant.

pub mod spectrum;
pub mod waveform;

pub use spectrum::SpectrumPipeline;
pub use waveform::WaveformPipeline;

use crate::analysis::ScaleConfig;
use crate::config::VisualizationType;
use crate::error::ConfigurationError;
use crate::pipeline::{PlotPipeline, SampleReader};

/// Builds the pipeline for `kind` on top of `reader`.
///
/// # Errors
/// - If the ring or scale configuration is rejected by the pipeline
pub fn build_pipeline(
    kind: VisualizationType,
    reader: SampleReader,
    scale: ScaleConfig,
) -> Result<Box<dyn PlotPipeline>, ConfigurationError> {
    Ok(match kind {
        VisualizationType::Spectrum => Box::new(SpectrumPipeline::new(reader, scale)?),
        VisualizationType::Waveform => {
            let window = reader.capacity();
            Box::new(WaveformPipeline::new(reader, window)?)
        }
    })
}
