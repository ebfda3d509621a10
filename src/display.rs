use crate::render::{DrawOp, Frame, PixelRect, Rgb};
use crate::scroll::FontMetrics;
use anyhow::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use std::io::{Stdout, stdout};

pub trait Display {
    fn present(&mut self, frame: &Frame) -> Result<()>;
}

/// Shows frames in the terminal, one character cell per glyph.
pub struct TerminalDisplay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    font: FontMetrics,
}

impl TerminalDisplay {
    pub fn new(font: FontMetrics) -> Result<Self> {
        enable_raw_mode()?;
        let terminal = undo_on_error(
            || {
                let mut out = stdout();
                execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
                let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
                terminal.clear()?;
                terminal.hide_cursor()?;
                Ok(terminal)
            },
            || {
                let _ = execute!(stdout(), LeaveAlternateScreen, DisableMouseCapture);
                let _ = disable_raw_mode();
            },
        )?;
        Ok(Self { terminal, font })
    }

    fn restore(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Display for TerminalDisplay {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let font = self.font;
        self.terminal.draw(|f| {
            let area = f.area();
            rasterize(frame, font, f.buffer_mut(), area);
        })?;
        Ok(())
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!("failed to restore terminal: {err:#}");
        }
    }
}

/// Runs `setup`, calling `undo` before returning its error.
fn undo_on_error<T>(setup: impl FnOnce() -> Result<T>, undo: impl FnOnce()) -> Result<T> {
    let result = setup();
    if result.is_err() {
        undo();
    }
    result
}

/// Keeps every presented frame.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub frames: Vec<Frame>,
}

impl RecordingDisplay {
    pub fn last(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

impl Display for RecordingDisplay {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

struct CellGrid {
    font: FontMetrics,
    area: Rect,
    columns: i32,
    rows: i32,
}

impl CellGrid {
    fn new(frame: &Frame, font: FontMetrics, area: Rect) -> Self {
        let mut grid = Self {
            font,
            area,
            columns: 0,
            rows: 0,
        };
        grid.columns = grid.col(frame.width).min(i32::from(area.width));
        grid.rows = grid.row(frame.height).min(i32::from(area.height));
        grid
    }

    fn col(&self, x: i32) -> i32 {
        (x + self.font.glyph_width / 2).div_euclid(self.font.glyph_width.max(1))
    }

    fn row(&self, y: i32) -> i32 {
        (y + self.font.line_height / 2).div_euclid(self.font.line_height.max(1))
    }

    fn rows_of(&self, rect: &PixelRect) -> std::ops::Range<i32> {
        let start = self.row(rect.y);
        start..self.row(rect.bottom()).max(start + 1)
    }

    fn cols_of(&self, rect: &PixelRect) -> std::ops::Range<i32> {
        self.col(rect.x)..self.col(rect.right())
    }

    fn cell<'b>(&self, buf: &'b mut Buffer, col: i32, row: i32) -> Option<&'b mut ratatui::buffer::Cell> {
        if !(0..self.columns).contains(&col) || !(0..self.rows).contains(&row) {
            return None;
        }
        let x = self.area.x.checked_add(u16::try_from(col).ok()?)?;
        let y = self.area.y.checked_add(u16::try_from(row).ok()?)?;
        buf.cell_mut((x, y))
    }
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

/// Maps pixel draw operations onto terminal cells inside `area`.
pub fn rasterize(frame: &Frame, font: FontMetrics, buf: &mut Buffer, area: Rect) {
    let grid = CellGrid::new(frame, font, area);

    for op in &frame.ops {
        match op {
            DrawOp::Clear(rgb) => {
                for row in 0..grid.rows {
                    for col in 0..grid.columns {
                        if let Some(cell) = grid.cell(buf, col, row) {
                            cell.set_char(' ').set_bg(color(*rgb));
                        }
                    }
                }
            }
            DrawOp::FillRect { rect, color: rgb } => {
                for row in grid.rows_of(rect) {
                    for col in grid.cols_of(rect) {
                        if let Some(cell) = grid.cell(buf, col, row) {
                            cell.set_char(' ').set_bg(color(*rgb));
                        }
                    }
                }
            }
            DrawOp::Text {
                x,
                y,
                text,
                color: rgb,
                clip,
            } => {
                let row = grid.row(*y);
                if !grid.rows_of(clip).contains(&row) {
                    continue;
                }
                for (index, ch) in text.chars().enumerate() {
                    let px = x + i32::try_from(index).unwrap_or(i32::MAX) * font.glyph_width;
                    if px < clip.x || px + font.glyph_width > clip.right() {
                        continue;
                    }
                    if let Some(cell) = grid.cell(buf, grid.col(px), row) {
                        cell.set_char(ch).set_fg(color(*rgb));
                    }
                }
            }
            DrawOp::ProgressBar {
                rect,
                fraction,
                fill,
                track,
            } => {
                let cols = grid.cols_of(rect);
                let filled = (f64::from(cols.end - cols.start) * fraction.clamp(0.0, 1.0)).round() as i32;
                let row = grid.rows_of(rect).start;
                for col in cols.clone() {
                    let rgb = if col - cols.start < filled { fill } else { track };
                    if let Some(cell) = grid.cell(buf, col, row) {
                        cell.set_char('━').set_fg(color(*rgb));
                    }
                }
            }
        }
    }
}
