//! Terminal drawing surface for the live plot.
//!
//! Strokes the polyline on a ratatui canvas filling the screen above a one
//! line status footer, and turns key presses into view commands.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Paragraph,
    },
};
use std::io::{self, Stdout};
use std::time::Duration;

use super::driver::{PlotSurface, Rgb};
use crate::analysis::PlotPoint;

/// User input during the live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    /// Keep going (no key or an unbound key)
    Continue,
    /// Leave the view (Escape, 'q', Ctrl+C)
    Quit,
    /// Freeze or unfreeze the plot (Space)
    ToggleFreeze,
}

/// Full-screen terminal plot.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    points: Vec<PlotPoint>,
    color: Rgb,
    line_width: f32,
    status: String,
    active: bool,
}

impl TerminalSurface {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled
    /// - If the alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;

        Ok(Self {
            terminal,
            points: Vec::new(),
            color: Rgb(255, 255, 255),
            line_width: 1.0,
            status: String::new(),
            active: true,
        })
    }

    /// Text shown in the footer from the next redraw on.
    pub fn set_status(&mut self, status: String) {
        self.status = status;
    }

    /// Waits up to `timeout` for a key press.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn poll_command(&mut self, timeout: Duration) -> anyhow::Result<ViewCommand> {
        if !event::poll(timeout)? {
            return Ok(ViewCommand::Continue);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(ViewCommand::Continue);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(ViewCommand::Continue);
        }

        Ok(match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                tracing::debug!("Escape or 'q' pressed: leaving live view");
                ViewCommand::Quit
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                tracing::debug!("Ctrl+C pressed: leaving live view");
                ViewCommand::Quit
            }
            KeyCode::Char(' ') => ViewCommand::ToggleFreeze,
            _ => ViewCommand::Continue,
        })
    }

    /// Leaves raw mode and the alternate screen. Safe to call twice.
    ///
    /// # Errors
    /// - If terminal mode cannot be restored
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Canvas marker for a line width, with horizontal dots per cell.
fn marker_for(line_width: f32) -> (Marker, usize) {
    if line_width <= 1.0 {
        (Marker::Braille, 2)
    } else if line_width <= 2.0 {
        (Marker::HalfBlock, 1)
    } else {
        (Marker::Block, 1)
    }
}

impl PlotSurface for TerminalSurface {
    fn pixel_width(&self) -> usize {
        let (_, dots) = marker_for(self.line_width);
        self.terminal
            .size()
            .map(|size| size.width as usize * dots)
            .unwrap_or(0)
    }

    fn stroke_polyline(
        &mut self,
        points: &[PlotPoint],
        color: Rgb,
        width: f32,
    ) -> anyhow::Result<()> {
        self.points.clear();
        self.points.extend_from_slice(points);
        self.color = color;
        self.line_width = width;
        Ok(())
    }

    fn request_redraw(&mut self) -> anyhow::Result<()> {
        let points = &self.points;
        let status = &self.status;
        let Rgb(r, g, b) = self.color;
        let color = Color::Rgb(r, g, b);
        let (marker, _) = marker_for(self.line_width);

        self.terminal.draw(|frame| {
            let area = frame.area();
            let footer_height = 1;

            let plot_area = Rect {
                height: area.height.saturating_sub(footer_height),
                ..area
            };
            let footer_area = Rect {
                y: area.y + plot_area.height,
                height: area.height - plot_area.height,
                ..area
            };

            let canvas = Canvas::default()
                .background_color(Color::Rgb(0, 0, 0))
                .marker(marker)
                .x_bounds([0.0, 1.0])
                .y_bounds([0.0, 1.0])
                .paint(|ctx| {
                    if let [only] = points.as_slice() {
                        ctx.draw(&Points {
                            coords: &[(only.x as f64, only.y as f64)],
                            color,
                        });
                    }
                    for pair in points.windows(2) {
                        ctx.draw(&CanvasLine::new(
                            pair[0].x as f64,
                            pair[0].y as f64,
                            pair[1].x as f64,
                            pair[1].y as f64,
                            color,
                        ));
                    }
                });
            frame.render_widget(canvas, plot_area);

            let footer = Paragraph::new(status.as_str()).style(
                Style::default()
                    .fg(Color::Rgb(185, 207, 212))
                    .bg(Color::Rgb(0, 0, 0)),
            );
            frame.render_widget(footer, footer_area);
        })?;

        Ok(())
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
