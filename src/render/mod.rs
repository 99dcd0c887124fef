//! Frame driving and drawing surfaces.

pub mod driver;
pub mod terminal;

pub use driver::{
    AppearanceConfig, Placeholder, PlotSurface, RenderDriver, Rgb, TickOutcome,
};
pub use terminal::{TerminalSurface, ViewCommand};
