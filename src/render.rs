//! Turns a read-only snapshot of the player into pixel-space draw operations.
//!
//! Nothing here touches a device; [`crate::display`] turns a [`Frame`] into
//! output.

use crate::model::{Screen, Theme, Track};
use crate::navigation::MenuItem;
use crate::scroll::{HEADER_HEIGHT, LIST_SIDE_MARGIN, LIST_TOP_MARGIN, TITLE_SIDE_MARGIN, Viewport};

pub const PLAYING_MARKER: &str = "▶";
pub const PAUSED_MARKER: &str = "‖";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb,
    pub text: Rgb,
    pub muted: Rgb,
    pub accent: Rgb,
    pub highlight: Rgb,
}

pub fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Green => Palette {
            background: Rgb(0, 0, 0),
            text: Rgb(120, 255, 120),
            muted: Rgb(60, 150, 60),
            accent: Rgb(0, 200, 0),
            highlight: Rgb(20, 70, 20),
        },
        Theme::Purple => Palette {
            background: Rgb(14, 6, 24),
            text: Rgb(224, 200, 255),
            muted: Rgb(150, 120, 190),
            accent: Rgb(160, 90, 230),
            highlight: Rgb(60, 30, 95),
        },
        Theme::White => Palette {
            background: Rgb(250, 250, 250),
            text: Rgb(20, 20, 20),
            muted: Rgb(110, 110, 110),
            accent: Rgb(60, 60, 60),
            highlight: Rgb(210, 210, 210),
        },
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear(Rgb),
    FillRect {
        rect: PixelRect,
        color: Rgb,
    },
    /// Text starting at `(x, y)`; glyphs outside `clip` are not drawn.
    Text {
        x: i32,
        y: i32,
        text: String,
        color: Rgb,
        clip: PixelRect,
    },
    ProgressBar {
        rect: PixelRect,
        fraction: f64,
        fill: Rgb,
        track: Rgb,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: i32,
    pub height: i32,
    pub ops: Vec<DrawOp>,
}

impl Frame {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NowPlaying<'a> {
    pub track: &'a Track,
    pub paused: bool,
    pub elapsed_seconds: f64,
    pub length_seconds: f64,
    pub progress: f64,
}

/// Everything one frame needs, borrowed from navigation and playback.
#[derive(Debug, Clone)]
pub struct RenderSnapshot<'a> {
    pub screen: Screen,
    pub title: &'a str,
    pub items: Vec<MenuItem<'a>>,
    pub selected_index: usize,
    pub v_scroll_offset: i32,
    pub h_scroll_offset: i32,
    pub now_playing: Option<NowPlaying<'a>>,
    pub theme: Theme,
    pub volume: f32,
    pub show_volume: bool,
    pub status: Option<&'a str>,
}

pub fn render(snapshot: &RenderSnapshot<'_>, viewport: &Viewport) -> Frame {
    let colors = palette(snapshot.theme);
    let mut ops = vec![DrawOp::Clear(colors.background)];

    draw_header(&mut ops, snapshot.title, viewport, &colors);
    if snapshot.screen == Screen::Play {
        draw_play(&mut ops, snapshot, viewport, &colors);
    } else {
        draw_list(&mut ops, snapshot, viewport, &colors);
    }
    if snapshot.show_volume {
        draw_volume_overlay(&mut ops, snapshot.volume, viewport, &colors);
    }
    if let Some(status) = snapshot.status {
        draw_status(&mut ops, status, viewport, &colors);
    }

    Frame {
        width: viewport.width,
        height: viewport.height,
        ops,
    }
}

fn draw_header(ops: &mut Vec<DrawOp>, title: &str, viewport: &Viewport, colors: &Palette) {
    let rect = PixelRect::new(0, 0, viewport.width, HEADER_HEIGHT);
    ops.push(DrawOp::FillRect {
        rect,
        color: colors.accent,
    });
    ops.push(DrawOp::Text {
        x: 4,
        y: (HEADER_HEIGHT - viewport.font.line_height) / 2,
        text: title.to_string(),
        color: colors.background,
        clip: rect,
    });
}

fn draw_list(
    ops: &mut Vec<DrawOp>,
    snapshot: &RenderSnapshot<'_>,
    viewport: &Viewport,
    colors: &Palette,
) {
    let row_height = viewport.row_height();
    let left = LIST_SIDE_MARGIN / 2;
    let text_width = viewport.width - LIST_SIDE_MARGIN;
    let playing = snapshot.now_playing.as_ref();

    for (index, item) in snapshot.items.iter().enumerate() {
        let row = i32::try_from(index).unwrap_or(i32::MAX);
        let y = HEADER_HEIGHT + LIST_TOP_MARGIN + row.saturating_mul(row_height)
            - snapshot.v_scroll_offset;
        if y + row_height <= HEADER_HEIGHT {
            continue;
        }
        if y >= viewport.height {
            break;
        }

        let selected = index == snapshot.selected_index;
        if selected {
            ops.push(DrawOp::FillRect {
                rect: PixelRect::new(0, y, viewport.width, row_height),
                color: colors.highlight,
            });
        }

        if let MenuItem::TrackRow(track) = item
            && let Some(now) = playing
            && now.track.original_index == track.original_index
        {
            let marker = if now.paused {
                PAUSED_MARKER
            } else {
                PLAYING_MARKER
            };
            ops.push(DrawOp::Text {
                x: 3,
                y: y + 1,
                text: marker.to_string(),
                color: colors.accent,
                clip: PixelRect::new(0, y, left, row_height),
            });
        }

        let offset = if selected { snapshot.h_scroll_offset } else { 0 };
        ops.push(DrawOp::Text {
            x: left - offset,
            y: y + 1,
            text: item.text().to_string(),
            color: colors.text,
            clip: PixelRect::new(left, y.max(HEADER_HEIGHT), text_width, row_height),
        });
    }
}

fn draw_play(
    ops: &mut Vec<DrawOp>,
    snapshot: &RenderSnapshot<'_>,
    viewport: &Viewport,
    colors: &Palette,
) {
    let Some(now) = snapshot.now_playing else {
        ops.push(DrawOp::Text {
            x: TITLE_SIDE_MARGIN / 2,
            y: HEADER_HEIGHT + 12,
            text: String::from("Nothing playing"),
            color: colors.muted,
            clip: PixelRect::new(0, 0, viewport.width, viewport.height),
        });
        return;
    };

    let line = viewport.font.line_height;
    let left = TITLE_SIDE_MARGIN / 2;
    let title_y = HEADER_HEIGHT + 12;
    ops.push(DrawOp::Text {
        x: left - snapshot.h_scroll_offset,
        y: title_y,
        text: now.track.label().to_string(),
        color: colors.text,
        clip: PixelRect::new(left, title_y, viewport.width - TITLE_SIDE_MARGIN, line),
    });

    let details = PixelRect::new(left, 0, viewport.width - TITLE_SIDE_MARGIN, viewport.height);
    for (row, text) in [&now.track.artist, &now.track.album].into_iter().enumerate() {
        ops.push(DrawOp::Text {
            x: left,
            y: title_y + line * (row as i32 + 1) + 4,
            text: text.clone(),
            color: colors.muted,
            clip: details,
        });
    }

    let bar_y = viewport.height - 3 * line;
    ops.push(DrawOp::ProgressBar {
        rect: PixelRect::new(left, bar_y, viewport.width - TITLE_SIDE_MARGIN, 6),
        fraction: now.progress.clamp(0.0, 1.0),
        fill: colors.accent,
        track: colors.highlight,
    });

    let marker = if now.paused {
        PAUSED_MARKER
    } else {
        PLAYING_MARKER
    };
    ops.push(DrawOp::Text {
        x: left,
        y: bar_y + 10,
        text: format!(
            "{marker} {} / {}",
            format_time(now.elapsed_seconds),
            format_time(now.length_seconds)
        ),
        color: colors.text,
        clip: details,
    });
}

fn draw_volume_overlay(ops: &mut Vec<DrawOp>, volume: f32, viewport: &Viewport, colors: &Palette) {
    let width = viewport.width * 2 / 3;
    let height = viewport.font.line_height * 2 + 12;
    let rect = PixelRect::new(
        (viewport.width - width) / 2,
        (viewport.height - height) / 2,
        width,
        height,
    );
    ops.push(DrawOp::FillRect {
        rect,
        color: colors.highlight,
    });
    ops.push(DrawOp::Text {
        x: rect.x + 6,
        y: rect.y + 4,
        text: format!("Volume {}%", crate::volume::volume_to_percent(volume)),
        color: colors.text,
        clip: rect,
    });
    ops.push(DrawOp::ProgressBar {
        rect: PixelRect::new(rect.x + 6, rect.bottom() - 10, width - 12, 5),
        fraction: f64::from(volume.clamp(0.0, 1.0)),
        fill: colors.accent,
        track: colors.background,
    });
}

fn draw_status(ops: &mut Vec<DrawOp>, status: &str, viewport: &Viewport, colors: &Palette) {
    let height = viewport.font.line_height + 2;
    let rect = PixelRect::new(0, viewport.height - height, viewport.width, height);
    ops.push(DrawOp::FillRect {
        rect,
        color: colors.accent,
    });
    ops.push(DrawOp::Text {
        x: 2,
        y: rect.y + 1,
        text: status.to_string(),
        color: colors.background,
        clip: rect,
    });
}

/// `m:ss`, saturating at zero for negative or non-finite input.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
