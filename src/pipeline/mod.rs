//! Plumbing between the audio callback and the plot.
//!
//! The render host only sees the [`PlotPipeline`] capability and the capture
//! side only sees [`SampleSink`], so new plot variants slot in without either
//! side changing.

pub mod frame;
pub mod ring_buffer;

pub use frame::AudioFrame;
pub use ring_buffer::{sample_ring, SampleReader, SampleWriter, Snapshot, SnapshotStatus};

use crate::analysis::PlotCurve;

/// Audio-side entry point. Called from the capture callback, so
/// implementations must not block, allocate, or lock.
pub trait SampleSink: Send {
    fn supply(&mut self, frame: &AudioFrame<'_>);
}

/// Why a pipeline produced no new curve this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The ring has not yet received a full window.
    NotPrimed { available: usize, required: usize },
}

/// Result of asking a pipeline for the current curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveUpdate<'a> {
    Ready(&'a PlotCurve),
    Skipped(SkipReason),
}

/// Render-side capability shared by every plot variant.
pub trait PlotPipeline {
    /// Short label for status lines and logs.
    fn name(&self) -> &'static str;

    /// Pulls the latest samples and recomputes the curve for a plot
    /// `pixel_width` columns wide.
    fn current_curve(&mut self, pixel_width: usize) -> CurveUpdate<'_>;

    /// One-line description of the latest analysis, if any.
    fn summary(&self) -> Option<String> {
        None
    }

    /// Input writes dropped since the pipeline was built.
    fn dropped_writes(&self) -> u64 {
        0
    }
}

/// Maps a non-primed snapshot status to the skip reason reported upstream.
pub(crate) fn skip_reason(status: SnapshotStatus, required: usize) -> Option<SkipReason> {
    match status {
        SnapshotStatus::Primed => None,
        SnapshotStatus::NotPrimed { available } => {
            Some(SkipReason::NotPrimed { available, required })
        }
    }
}
