//! Per-frame orchestration between a plot pipeline and a drawing surface.
//!
//! The driver runs on the display loop only. Each tick asks the pipeline
//! for a fresh curve, falls back to the last drawn curve (or a placeholder
//! before anything has been drawn), strokes it once with the current
//! appearance, and requests a redraw.

use serde::{Deserialize, Serialize};

use crate::analysis::{PlotCurve, PlotPoint};
use crate::error::ConfigurationError;
use crate::pipeline::{CurveUpdate, PlotPipeline, SkipReason};

/// 24-bit line colour, written as `[r, g, b]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// How the plot line is stroked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppearanceConfig {
    pub line_color: Rgb,
    pub line_width: f32,
}

impl AppearanceConfig {
    /// # Errors
    /// - If `line_width` is not a positive finite number
    pub fn new(line_color: Rgb, line_width: f32) -> Result<Self, ConfigurationError> {
        if !(line_width.is_finite() && line_width > 0.0) {
            return Err(ConfigurationError::InvalidLineWidth(line_width));
        }
        Ok(Self {
            line_color,
            line_width,
        })
    }
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            line_color: Rgb(206, 224, 220),
            line_width: 1.0,
        }
    }
}

/// What to draw before the first real curve exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Placeholder {
    /// Baseline along the bottom edge
    #[default]
    Flat,
    /// Fixed synthetic spectrum, useful when previewing without audio
    Demo,
}

/// Most points a demo placeholder will use.
const DEMO_POINTS: usize = 128;

impl Placeholder {
    /// Deterministic curve for a plot `pixel_width` columns wide.
    pub fn curve(self, pixel_width: usize) -> PlotCurve {
        match (self, pixel_width) {
            (_, 0) => PlotCurve::new(),
            (_, 1) => PlotCurve::from_points(vec![PlotPoint::new(0.0, 0.0)]),
            (Placeholder::Flat, _) => PlotCurve::from_points(vec![
                PlotPoint::new(0.0, 0.0),
                PlotPoint::new(1.0, 0.0),
            ]),
            (Placeholder::Demo, width) => {
                let n = width.min(DEMO_POINTS);
                let last = (n - 1) as f32;
                let points = (0..n)
                    .map(|i| {
                        let x = i as f32 / last;
                        PlotPoint::new(x, demo_level(x))
                    })
                    .collect();
                PlotCurve::from_points(points)
            }
        }
    }
}

/// A low fundamental with a weaker harmonic over a falling noise floor.
fn demo_level(x: f32) -> f32 {
    let hump = |centre: f32, spread: f32, height: f32| {
        let d = (x - centre) / spread;
        height * (-d * d).exp()
    };
    let level = hump(0.12, 0.05, 0.7) + hump(0.3, 0.08, 0.35) + 0.15 * (1.0 - x);
    level.clamp(0.0, 1.0)
}

/// Drawing target that accepts one polyline per frame.
pub trait PlotSurface {
    /// Horizontal resolution available to the plot.
    fn pixel_width(&self) -> usize;

    /// Strokes `points` (normalized coordinates) as a single polyline.
    fn stroke_polyline(
        &mut self,
        points: &[PlotPoint],
        color: Rgb,
        width: f32,
    ) -> anyhow::Result<()>;

    /// Presents whatever was stroked since the last redraw.
    fn request_redraw(&mut self) -> anyhow::Result<()>;
}

/// What a tick ended up drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A freshly computed curve
    Drawn,
    /// The previous curve again, because no new one was available
    Held(Option<SkipReason>),
    /// The placeholder, because nothing has been drawn yet
    Placeholder(SkipReason),
}

/// Drives one pipeline onto one surface at the display's cadence.
pub struct RenderDriver<S: PlotSurface> {
    pipeline: Box<dyn PlotPipeline>,
    surface: S,
    appearance: AppearanceConfig,
    placeholder: Placeholder,
    curve: PlotCurve,
    has_drawn: bool,
    frozen: bool,
    ticks: u64,
    skipped: u64,
}

impl<S: PlotSurface> RenderDriver<S> {
    pub fn new(
        pipeline: Box<dyn PlotPipeline>,
        surface: S,
        appearance: AppearanceConfig,
        placeholder: Placeholder,
    ) -> Self {
        Self {
            pipeline,
            surface,
            appearance,
            placeholder,
            curve: PlotCurve::new(),
            has_drawn: false,
            frozen: false,
            ticks: 0,
            skipped: 0,
        }
    }

    /// Runs one frame: pull, analyze, stroke, redraw.
    ///
    /// # Errors
    /// - If the surface fails to stroke or present
    pub fn tick(&mut self) -> anyhow::Result<TickOutcome> {
        self.ticks += 1;
        let width = self.surface.pixel_width();

        let outcome = if self.frozen && self.has_drawn {
            TickOutcome::Held(None)
        } else {
            match self.pipeline.current_curve(width) {
                CurveUpdate::Ready(curve) => {
                    self.curve.copy_from(curve);
                    self.has_drawn = true;
                    TickOutcome::Drawn
                }
                CurveUpdate::Skipped(reason) => {
                    self.skipped += 1;
                    if self.has_drawn {
                        TickOutcome::Held(Some(reason))
                    } else {
                        self.curve = self.placeholder.curve(width);
                        TickOutcome::Placeholder(reason)
                    }
                }
            }
        };

        let AppearanceConfig {
            line_color,
            line_width,
        } = self.appearance;
        self.surface
            .stroke_polyline(self.curve.points(), line_color, line_width)?;
        self.surface.request_redraw()?;

        Ok(outcome)
    }

    pub fn appearance(&self) -> AppearanceConfig {
        self.appearance
    }

    /// Takes effect from the next tick.
    pub fn set_appearance(&mut self, appearance: AppearanceConfig) {
        tracing::debug!("Appearance updated: {:?}", appearance);
        self.appearance = appearance;
    }

    /// While frozen, ticks keep re-stroking the last curve without pulling
    /// new samples.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Curve stroked by the latest tick.
    pub fn curve(&self) -> &PlotCurve {
        &self.curve
    }

    pub fn pipeline(&self) -> &dyn PlotPipeline {
        self.pipeline.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Ticks run and ticks that produced no new curve.
    pub fn frame_counts(&self) -> (u64, u64) {
        (self.ticks, self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ScaleConfig;
    use crate::pipeline::sample_ring;
    use crate::visualizations::SpectrumPipeline;
    use std::collections::VecDeque;

    /// In-memory surface that records every call.
    #[derive(Default)]
    struct RecordingSurface {
        width: usize,
        strokes: Vec<(Vec<PlotPoint>, Rgb, f32)>,
        redraws: usize,
    }

    impl PlotSurface for RecordingSurface {
        fn pixel_width(&self) -> usize {
            self.width
        }

        fn stroke_polyline(
            &mut self,
            points: &[PlotPoint],
            color: Rgb,
            width: f32,
        ) -> anyhow::Result<()> {
            self.strokes.push((points.to_vec(), color, width));
            Ok(())
        }

        fn request_redraw(&mut self) -> anyhow::Result<()> {
            self.redraws += 1;
            Ok(())
        }
    }

    const NOT_PRIMED: SkipReason = SkipReason::NotPrimed {
        available: 0,
        required: 16,
    };

    /// Pipeline that replays a fixed sequence of updates.
    struct ScriptedPipeline {
        script: VecDeque<Option<PlotCurve>>,
        current: PlotCurve,
    }

    impl PlotPipeline for ScriptedPipeline {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn current_curve(&mut self, _pixel_width: usize) -> CurveUpdate<'_> {
            match self.script.pop_front().flatten() {
                Some(curve) => {
                    self.current = curve;
                    CurveUpdate::Ready(&self.current)
                }
                None => CurveUpdate::Skipped(NOT_PRIMED),
            }
        }
    }

    fn scripted(script: Vec<Option<PlotCurve>>) -> Box<dyn PlotPipeline> {
        Box::new(ScriptedPipeline {
            script: script.into(),
            current: PlotCurve::new(),
        })
    }

    fn surface(width: usize) -> RecordingSurface {
        RecordingSurface {
            width,
            ..Default::default()
        }
    }

    #[test]
    fn test_placeholder_then_drawn_then_held() {
        let real = PlotCurve::from_points(vec![PlotPoint::new(0.0, 0.2), PlotPoint::new(1.0, 0.9)]);
        let mut driver = RenderDriver::new(
            scripted(vec![None, Some(real.clone()), None]),
            surface(80),
            AppearanceConfig::default(),
            Placeholder::Flat,
        );

        assert_eq!(
            driver.tick().unwrap(),
            TickOutcome::Placeholder(NOT_PRIMED)
        );
        assert_eq!(driver.tick().unwrap(), TickOutcome::Drawn);
        assert_eq!(
            driver.tick().unwrap(),
            TickOutcome::Held(Some(NOT_PRIMED))
        );

        let surface = driver.surface();
        assert_eq!(surface.strokes.len(), 3);
        assert_eq!(surface.redraws, 3);
        assert_eq!(
            surface.strokes[0].0,
            vec![PlotPoint::new(0.0, 0.0), PlotPoint::new(1.0, 0.0)]
        );
        assert_eq!(surface.strokes[1].0, real.points());
        assert_eq!(surface.strokes[2].0, real.points());
        assert_eq!(driver.frame_counts(), (3, 2));
    }

    #[test]
    fn test_appearance_applies_to_next_stroke() {
        let mut driver = RenderDriver::new(
            scripted(vec![]),
            surface(10),
            AppearanceConfig::default(),
            Placeholder::Flat,
        );
        driver.tick().unwrap();

        let red = AppearanceConfig::new(Rgb(255, 0, 0), 2.5).unwrap();
        driver.set_appearance(red);
        driver.tick().unwrap();

        let strokes = &driver.surface().strokes;
        assert_eq!(strokes[0].1, Rgb(206, 224, 220));
        assert_eq!(strokes[0].2, 1.0);
        assert_eq!(strokes[1].1, Rgb(255, 0, 0));
        assert_eq!(strokes[1].2, 2.5);
        assert_eq!(driver.appearance(), red);
    }

    #[test]
    fn test_frozen_driver_does_not_pull() {
        let first = PlotCurve::from_points(vec![PlotPoint::new(0.0, 0.5)]);
        let second = PlotCurve::from_points(vec![PlotPoint::new(0.0, 0.1)]);
        let mut driver = RenderDriver::new(
            scripted(vec![Some(first.clone()), Some(second.clone())]),
            surface(10),
            AppearanceConfig::default(),
            Placeholder::Flat,
        );
        assert_eq!(driver.tick().unwrap(), TickOutcome::Drawn);

        driver.set_frozen(true);
        assert_eq!(driver.tick().unwrap(), TickOutcome::Held(None));
        assert_eq!(driver.curve(), &first);

        driver.set_frozen(false);
        assert_eq!(driver.tick().unwrap(), TickOutcome::Drawn);
        assert_eq!(driver.curve(), &second);
    }

    #[test]
    fn test_spectrum_pipeline_through_driver() {
        let (mut writer, reader) = sample_ring(256, 44100).unwrap();
        let pipeline = SpectrumPipeline::new(reader, ScaleConfig::default()).unwrap();
        let mut driver = RenderDriver::new(
            Box::new(pipeline),
            surface(40),
            AppearanceConfig::default(),
            Placeholder::Demo,
        );

        assert!(matches!(
            driver.tick().unwrap(),
            TickOutcome::Placeholder(SkipReason::NotPrimed { .. })
        ));
        assert_eq!(driver.curve(), &Placeholder::Demo.curve(40));

        let tone: Vec<f32> = (0..256)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 44100.0).sin())
            .collect();
        writer.write(&tone);
        assert_eq!(driver.tick().unwrap(), TickOutcome::Drawn);
        assert!(driver.curve().len() <= 40);
        assert!(driver.pipeline().summary().is_some());
    }

    #[test]
    fn test_placeholders_are_deterministic_and_bounded() {
        for width in [0, 1, 2, 50, 1000] {
            for placeholder in [Placeholder::Flat, Placeholder::Demo] {
                let curve = placeholder.curve(width);
                assert_eq!(curve, placeholder.curve(width));
                assert!(curve.len() <= width);
                assert!(curve
                    .points()
                    .iter()
                    .all(|p| (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y)));
                assert!(curve.points().windows(2).all(|p| p[0].x < p[1].x));
            }
        }
    }

    #[test]
    fn test_invalid_line_width() {
        assert_eq!(
            AppearanceConfig::new(Rgb(0, 0, 0), 0.0).unwrap_err(),
            ConfigurationError::InvalidLineWidth(0.0)
        );
        assert!(AppearanceConfig::new(Rgb(0, 0, 0), f32::NAN).is_err());
    }
}
