//! Live spectrum view.
//!
//! Wires the input device, the sample ring, the selected plot pipeline and
//! the terminal surface together, then ticks the render driver at the
//! configured frame rate until the user quits or SIGTERM arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::capture::{AudioCapture, InputDevice};
use crate::config::{SpeclineConfig, VisualizationType};
use crate::pipeline::{sample_ring, PlotPipeline};
use crate::render::{Placeholder, RenderDriver, TerminalSurface, TickOutcome, ViewCommand};
use crate::visualizations::build_pipeline;

/// Command-line overrides for the live view.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub device: Option<String>,
    pub fft_size: Option<usize>,
    pub visualization: Option<VisualizationType>,
    /// Run without opening an input device
    pub preview: bool,
}

impl RunOptions {
    fn apply(&self, config: &mut SpeclineConfig) {
        if let Some(device) = &self.device {
            config.audio.device = device.clone();
        }
        if let Some(fft_size) = self.fft_size {
            config.analysis.fft_size = fft_size;
        }
        if let Some(visualization) = self.visualization {
            config.display.visualization = visualization;
        }
    }
}

/// Runs the live view until quit.
///
/// # Errors
/// - If the configuration is invalid
/// - If the input device cannot be opened or streamed
/// - If the terminal cannot be set up or drawn to
pub fn handle_run(options: RunOptions) -> anyhow::Result<()> {
    tracing::info!("=== specline live view started ===");

    let mut config = SpeclineConfig::load()?;
    options.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Configuration: device={}, fft_size={}, visualization={}, axis={}, fps={}",
        config.audio.device,
        config.analysis.fft_size,
        config.display.visualization,
        config.scale.frequency_axis,
        config.display.fps
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
        .context("Failed to register signal handler")?;

    let appearance = config.appearance()?;
    let (pipeline, capture, placeholder) = if options.preview {
        // Nothing writes in preview, so the pipeline never primes.
        let (_writer, reader) = sample_ring(config.analysis.fft_size, config.audio.sample_rate)?;
        let pipeline =
            build_pipeline(config.display.visualization, reader, config.scale_config())?;
        (pipeline, None, Placeholder::Demo)
    } else {
        let input = InputDevice::open(&config.audio.device, config.audio.sample_rate)?;
        let (writer, reader) = sample_ring(config.analysis.fft_size, input.sample_rate())?;
        let pipeline =
            build_pipeline(config.display.visualization, reader, config.scale_config())?;
        let capture = input.start(writer)?;
        (pipeline, Some(capture), config.display.placeholder)
    };

    let source = source_label(capture.as_ref());
    let surface = TerminalSurface::new().context("Failed to initialize terminal")?;
    let mut driver = RenderDriver::new(pipeline, surface, appearance, placeholder);

    let result = run_loop(&mut driver, config.frame_interval(), &shutdown, &source);

    driver.surface_mut().cleanup()?;
    drop(capture);

    let (ticks, skipped) = driver.frame_counts();
    tracing::info!(
        "Live view stopped after {} frames ({} without a new curve)",
        ticks,
        skipped
    );
    result
}

fn run_loop(
    driver: &mut RenderDriver<TerminalSurface>,
    interval: Duration,
    shutdown: &AtomicBool,
    source: &str,
) -> anyhow::Result<()> {
    let mut next_frame = Instant::now();
    let mut frame_count = 0u64;
    let mut drops = DropMonitor::default();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("Received SIGTERM: leaving live view");
            return Ok(());
        }

        let status = status_line(driver.pipeline(), source, driver.is_frozen());
        driver.surface_mut().set_status(status);
        let outcome = driver.tick()?;

        frame_count += 1;
        if frame_count % 60 == 0 {
            tracing::debug!(
                "Frame {}: {:?}, {} dropped writes",
                frame_count,
                outcome,
                driver.pipeline().dropped_writes()
            );
            if let Some(new) = drops.check(driver.pipeline()) {
                tracing::warn!("{} audio writes dropped since the last check", new);
            }
        }
        if let TickOutcome::Placeholder(reason) = outcome {
            if frame_count == 1 {
                tracing::debug!("Waiting for samples: {:?}", reason);
            }
        }

        next_frame += interval;
        let now = Instant::now();
        if next_frame < now {
            next_frame = now;
        }

        // Keys are handled until the next frame is due.
        loop {
            let remaining = next_frame.saturating_duration_since(Instant::now());
            match driver.surface_mut().poll_command(remaining)? {
                ViewCommand::Quit => return Ok(()),
                ViewCommand::ToggleFreeze => {
                    let frozen = !driver.is_frozen();
                    driver.set_frozen(frozen);
                    tracing::debug!("Plot {}", if frozen { "frozen" } else { "resumed" });
                }
                ViewCommand::Continue => {}
            }
            if remaining.is_zero() || Instant::now() >= next_frame {
                break;
            }
        }
    }
}

/// Remembers the dropped-write count already reported.
#[derive(Debug, Default)]
struct DropMonitor {
    reported: u64,
}

impl DropMonitor {
    /// Writes dropped since the previous call, if any.
    fn check(&mut self, pipeline: &dyn PlotPipeline) -> Option<u64> {
        let total = pipeline.dropped_writes();
        let new = total.saturating_sub(self.reported);
        self.reported = total;
        (new > 0).then_some(new)
    }
}

fn source_label(capture: Option<&AudioCapture>) -> String {
    match capture {
        Some(capture) => format!(
            "{} {}Hz {}ch",
            capture.name(),
            capture.sample_rate(),
            capture.channels()
        ),
        None => "preview".to_string(),
    }
}

/// Footer text: plot kind, its live summary, the input, and key hints.
fn status_line(pipeline: &dyn PlotPipeline, source: &str, frozen: bool) -> String {
    let mut parts = vec![pipeline.name().to_string()];
    if let Some(summary) = pipeline.summary() {
        parts.push(summary);
    }
    parts.push(source.to_string());
    if frozen {
        parts.push("[frozen]".to_string());
    }
    parts.push("q quit  space freeze".to_string());
    format!(" {}", parts.join(" │ "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ScaleConfig;
    use crate::pipeline::{AudioFrame, CurveUpdate};
    use crate::visualizations::{SpectrumPipeline, WaveformPipeline};

    struct NamedPipeline(Option<&'static str>);

    impl PlotPipeline for NamedPipeline {
        fn name(&self) -> &'static str {
            "spectrum"
        }

        fn current_curve(&mut self, _pixel_width: usize) -> CurveUpdate<'_> {
            CurveUpdate::Skipped(crate::pipeline::SkipReason::NotPrimed {
                available: 0,
                required: 1024,
            })
        }

        fn summary(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn test_status_line() {
        let line = status_line(&NamedPipeline(Some("peak 440 Hz")), "mic 48000Hz 1ch", false);
        assert_eq!(
            line,
            " spectrum │ peak 440 Hz │ mic 48000Hz 1ch │ q quit  space freeze"
        );

        let line = status_line(&NamedPipeline(None), "preview", true);
        assert_eq!(line, " spectrum │ preview │ [frozen] │ q quit  space freeze");
    }

    #[test]
    fn test_options_override_config() {
        let mut config = SpeclineConfig::default();
        let options = RunOptions {
            device: Some("2".to_string()),
            fft_size: Some(2048),
            visualization: Some(VisualizationType::Waveform),
            preview: false,
        };
        options.apply(&mut config);
        assert_eq!(config.audio.device, "2");
        assert_eq!(config.analysis.fft_size, 2048);
        assert_eq!(config.display.visualization, VisualizationType::Waveform);

        let mut untouched = SpeclineConfig::default();
        RunOptions::default().apply(&mut untouched);
        assert_eq!(untouched, SpeclineConfig::default());
    }

    #[test]
    fn test_mismatched_rate_frames_reach_drop_monitor() {
        let (mut writer, reader) = sample_ring(1024, 44100).unwrap();
        let pipeline = SpectrumPipeline::new(reader, ScaleConfig::default()).unwrap();
        let mut drops = DropMonitor::default();
        assert_eq!(drops.check(&pipeline), None);

        writer.write_frame(&AudioFrame::mono(&[0.25; 64], 48000).unwrap());
        writer.write_frame(&AudioFrame::mono(&[0.25; 64], 48000).unwrap());
        assert_eq!(pipeline.dropped_writes(), 2);
        assert_eq!(drops.check(&pipeline), Some(2));
        assert_eq!(drops.check(&pipeline), None);

        writer.write_frame(&AudioFrame::mono(&[0.25; 64], 44100).unwrap());
        assert_eq!(drops.check(&pipeline), None);
    }

    #[test]
    fn test_waveform_reports_dropped_writes() {
        let (mut writer, reader) = sample_ring(8, 44100).unwrap();
        let pipeline = WaveformPipeline::new(reader, 8).unwrap();
        writer.write_frame(&AudioFrame::mono(&[0.0; 8], 22050).unwrap());
        assert_eq!(DropMonitor::default().check(&pipeline), Some(1));
    }
}
