use serde::{Deserialize, Serialize};
use std::path::Path;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const FALLBACK_DURATION_SECONDS: f64 = 180.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub file_name: String,
    pub artist: String,
    pub album: String,
    pub original_index: usize,
    /// Length from the tags, `None` when the file did not report one.
    pub duration_seconds: Option<f64>,
}

impl Track {
    /// Display label: the file name without its extension.
    pub fn label(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.file_name)
    }
}

/// What the metadata provider reports for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Theme {
    #[default]
    Green,
    Purple,
    White,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Green, Theme::Purple, Theme::White];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Purple => "Purple",
            Self::White => "White",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    MusicMenu,
    SettingsMenu,
    ArtistMenu,
    AlbumMenu,
    AllSongsMenu,
    FilteredSongsMenu,
    Play,
}

impl Screen {
    pub fn is_song_list(self) -> bool {
        matches!(self, Self::AllSongsMenu | Self::FilteredSongsMenu)
    }

    pub fn scrolls(self) -> bool {
        matches!(
            self,
            Self::AllSongsMenu | Self::FilteredSongsMenu | Self::ArtistMenu | Self::AlbumMenu
        )
    }
}
