//! Pixel-space scroll math for list screens and the play title.
//!
//! Everything here is a pure function of its arguments; the caller keeps the
//! previous offsets and timestamps in its navigation context.

use std::time::Duration;

pub const LIST_TOP_MARGIN: i32 = 5;
pub const LIST_SIDE_MARGIN: i32 = 30;
pub const TITLE_SIDE_MARGIN: i32 = 20;
pub const MARQUEE_STEP: i32 = 2;
pub const MARQUEE_INTERVAL: Duration = Duration::from_millis(100);
/// Blank run after the text before the marquee starts over.
pub const MARQUEE_GAP: i32 = 24;

/// Fixed-pitch font used for every measurement and for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub glyph_width: i32,
    pub line_height: i32,
}

impl FontMetrics {
    pub const SMALL: FontMetrics = FontMetrics {
        glyph_width: 6,
        line_height: 12,
    };

    pub fn text_width(&self, text: &str) -> i32 {
        i32::try_from(text.chars().count())
            .unwrap_or(i32::MAX)
            .saturating_mul(self.glyph_width)
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::SMALL
    }
}

/// Height of the title bar above every list.
pub const HEADER_HEIGHT: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
    pub font: FontMetrics,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: i32::try_from(width).unwrap_or(i32::MAX),
            height: i32::try_from(height).unwrap_or(i32::MAX),
            font: FontMetrics::SMALL,
        }
    }

    pub fn list_height(&self) -> i32 {
        self.height - HEADER_HEIGHT
    }

    pub fn row_height(&self) -> i32 {
        self.font.line_height + 2
    }
}

/// Keeps the selected row inside a viewport of `viewport_height` pixels.
pub fn vertical_offset(
    selected_index: usize,
    line_height: i32,
    viewport_height: i32,
    previous_offset: i32,
) -> i32 {
    let row = i32::try_from(selected_index).unwrap_or(i32::MAX);
    let row_top = LIST_TOP_MARGIN + row.saturating_mul(line_height) - previous_offset;

    if row_top + line_height > viewport_height {
        return (row + 1).saturating_mul(line_height) - viewport_height + LIST_TOP_MARGIN;
    }
    if row_top < LIST_TOP_MARGIN {
        return row.saturating_mul(line_height);
    }
    previous_offset
}

/// Advances a marquee for text wider than `available_width`.
///
/// Returns the new `(offset, last_step)` pair. Text that fits resets to zero.
pub fn horizontal_offset(
    text_width: i32,
    available_width: i32,
    previous_offset: i32,
    last_step: Duration,
    now: Duration,
) -> (i32, Duration) {
    if text_width <= available_width {
        return (0, last_step);
    }
    if now.saturating_sub(last_step) <= MARQUEE_INTERVAL {
        return (previous_offset, last_step);
    }

    let mut offset = previous_offset + MARQUEE_STEP;
    if offset > text_width + MARQUEE_GAP {
        offset = 0;
    }
    (offset, now)
}
