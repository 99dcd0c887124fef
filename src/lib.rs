//! Live audio spectrum line plot.
//!
//! Audio arrives on a real-time thread and is written into a lock-free
//! sample ring ([`pipeline::sample_ring`]). Once per display frame the render
//! thread snapshots the latest window, runs it through the [`analysis`]
//! stages, and strokes the resulting polyline on a [`render::PlotSurface`].

pub mod analysis;
pub mod app;
pub mod capture;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod visualizations;

pub use error::ConfigurationError;
