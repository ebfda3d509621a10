use crate::audio::AudioEngine;
use crate::library::LibraryIndex;
use crate::model::{Screen, Theme, Track};
use crate::playback::PlaybackSession;
use crate::scroll::{self, LIST_SIDE_MARGIN, TITLE_SIDE_MARGIN, Viewport};
use std::rc::Rc;
use std::time::Duration;

pub const MAIN_MENU_OPTIONS: [&str; 2] = ["Music", "Settings"];
pub const MUSIC_MENU_OPTIONS: [&str; 3] = ["All Songs", "Artists", "Albums"];
pub const ALL_SONGS_TITLE: &str = "All Songs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Select,
    Back,
    Encoder(i32),
    TogglePause,
    Previous,
    Next,
}

/// Requests for collaborators outside the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ApplyTheme(Theme),
    VolumeChanged(f32),
    Status(String),
}

/// One row of whatever list the current screen shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuItem<'a> {
    Label(&'a str),
    TrackRow(&'a Track),
}

impl<'a> MenuItem<'a> {
    pub fn text(self) -> &'a str {
        match self {
            Self::Label(label) => label,
            Self::TrackRow(track) => track.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavContext {
    pub screen: Screen,
    pub selected_index: usize,
    pub filtered_tracks: Vec<Track>,
    pub filter_title: String,
    pub v_scroll_offset: i32,
    pub h_scroll_offset: i32,
    pub last_h_scroll_tick: Duration,
}

impl Default for NavContext {
    fn default() -> Self {
        Self {
            screen: Screen::MainMenu,
            selected_index: 0,
            filtered_tracks: Vec::new(),
            filter_title: String::new(),
            v_scroll_offset: 0,
            h_scroll_offset: 0,
            last_h_scroll_tick: Duration::ZERO,
        }
    }
}

/// The menu state machine. Owns the [`NavContext`]; every transition goes
/// through [`Navigator::apply`].
pub struct Navigator {
    ctx: NavContext,
    library: Rc<LibraryIndex>,
}

impl Navigator {
    pub fn new(library: Rc<LibraryIndex>) -> Self {
        Self {
            ctx: NavContext::default(),
            library,
        }
    }

    pub fn context(&self) -> &NavContext {
        &self.ctx
    }

    pub fn screen(&self) -> Screen {
        self.ctx.screen
    }

    pub fn title(&self) -> &str {
        match self.ctx.screen {
            Screen::MainMenu => "Main Menu",
            Screen::MusicMenu => "Music",
            Screen::SettingsMenu => "Settings",
            Screen::ArtistMenu => "Artists",
            Screen::AlbumMenu => "Albums",
            Screen::AllSongsMenu | Screen::FilteredSongsMenu => &self.ctx.filter_title,
            Screen::Play => "Now Playing",
        }
    }

    /// Length of the list the encoder moves through; `None` on the play screen.
    pub fn active_len(&self) -> Option<usize> {
        match self.ctx.screen {
            Screen::MainMenu => Some(MAIN_MENU_OPTIONS.len()),
            Screen::MusicMenu => Some(MUSIC_MENU_OPTIONS.len()),
            Screen::SettingsMenu => Some(Theme::ALL.len()),
            Screen::ArtistMenu => Some(self.library.artists().len()),
            Screen::AlbumMenu => Some(self.library.albums().len()),
            Screen::AllSongsMenu => Some(self.library.len()),
            Screen::FilteredSongsMenu => Some(self.ctx.filtered_tracks.len()),
            Screen::Play => None,
        }
    }

    pub fn items(&self) -> Vec<MenuItem<'_>> {
        match self.ctx.screen {
            Screen::MainMenu => MAIN_MENU_OPTIONS.iter().map(|o| MenuItem::Label(o)).collect(),
            Screen::MusicMenu => MUSIC_MENU_OPTIONS.iter().map(|o| MenuItem::Label(o)).collect(),
            Screen::SettingsMenu => Theme::ALL
                .iter()
                .map(|theme| MenuItem::Label(theme.label()))
                .collect(),
            Screen::ArtistMenu => self
                .library
                .artists()
                .iter()
                .map(|name| MenuItem::Label(name))
                .collect(),
            Screen::AlbumMenu => self
                .library
                .albums()
                .iter()
                .map(|name| MenuItem::Label(name))
                .collect(),
            Screen::AllSongsMenu => self.library.tracks().iter().map(MenuItem::TrackRow).collect(),
            Screen::FilteredSongsMenu => self
                .ctx
                .filtered_tracks
                .iter()
                .map(MenuItem::TrackRow)
                .collect(),
            Screen::Play => Vec::new(),
        }
    }

    fn selected_item(&self) -> Option<MenuItem<'_>> {
        self.items().get(self.ctx.selected_index).copied()
    }

    fn selected_track(&self) -> Option<&Track> {
        match self.ctx.screen {
            Screen::AllSongsMenu => self.library.tracks().get(self.ctx.selected_index),
            Screen::FilteredSongsMenu => self.ctx.filtered_tracks.get(self.ctx.selected_index),
            _ => None,
        }
    }

    pub fn apply<E: AudioEngine>(
        &mut self,
        action: Action,
        session: &mut PlaybackSession<E>,
    ) -> Option<Effect> {
        match action {
            Action::Select => self.select(session),
            Action::Back => {
                self.back();
                None
            }
            Action::Encoder(delta) => self.rotate(delta, session),
            Action::TogglePause => {
                let allowed = self.ctx.screen == Screen::Play
                    || (self.ctx.screen.is_song_list() && session.current_index().is_some());
                if allowed {
                    session.toggle_pause();
                }
                None
            }
            Action::Previous | Action::Next if self.ctx.screen == Screen::Play => {
                let result = if action == Action::Next {
                    session.next()
                } else {
                    session.previous()
                };
                result
                    .err()
                    .map(|err| Effect::Status(format!("Playback unavailable: {err}")))
            }
            Action::Previous | Action::Next => None,
        }
    }

    fn select<E: AudioEngine>(&mut self, session: &mut PlaybackSession<E>) -> Option<Effect> {
        let index = self.ctx.selected_index;
        match self.ctx.screen {
            Screen::MainMenu => match index {
                0 => self.enter(Screen::MusicMenu),
                1 => self.enter(Screen::SettingsMenu),
                _ => {}
            },
            Screen::MusicMenu => match index {
                0 => {
                    self.ctx.filtered_tracks = self.library.tracks().to_vec();
                    self.ctx.filter_title = ALL_SONGS_TITLE.to_string();
                    self.enter(Screen::AllSongsMenu);
                }
                1 => self.enter(Screen::ArtistMenu),
                2 => self.enter(Screen::AlbumMenu),
                _ => {}
            },
            Screen::SettingsMenu => return Some(Effect::ApplyTheme(Theme::from_index(index))),
            Screen::ArtistMenu => {
                let name = self.library.artists().get(index)?.clone();
                let tracks = self.library.tracks_by_artist(&name);
                return self.open_filtered(name, tracks);
            }
            Screen::AlbumMenu => {
                let name = self.library.albums().get(index)?.clone();
                let tracks = self.library.tracks_by_album(&name);
                return self.open_filtered(name, tracks);
            }
            Screen::AllSongsMenu | Screen::FilteredSongsMenu => {
                return self.play_selected(session);
            }
            Screen::Play => {
                session.toggle_pause();
            }
        }
        None
    }

    fn open_filtered(&mut self, title: String, tracks: Vec<Track>) -> Option<Effect> {
        if tracks.is_empty() {
            tracing::warn!(filter = %title, "refusing to open an empty track list");
            return Some(Effect::Status(format!("No tracks for {title}")));
        }
        self.ctx.filtered_tracks = tracks;
        self.ctx.filter_title = title;
        self.enter(Screen::FilteredSongsMenu);
        None
    }

    fn play_selected<E: AudioEngine>(
        &mut self,
        session: &mut PlaybackSession<E>,
    ) -> Option<Effect> {
        let original_index = self.selected_track()?.original_index;

        if session.current_index() == Some(original_index) && !session.is_unavailable() {
            self.show_play();
            return None;
        }

        match session.play_or_skip(original_index) {
            Ok(_) => {
                self.show_play();
                None
            }
            Err(err) => Some(Effect::Status(format!("Playback unavailable: {err}"))),
        }
    }

    fn show_play(&mut self) {
        self.ctx.screen = Screen::Play;
        self.reset_marquee();
    }

    fn back(&mut self) {
        match self.ctx.screen {
            Screen::Play => {
                self.ctx.screen = if self.ctx.filter_title == ALL_SONGS_TITLE {
                    Screen::AllSongsMenu
                } else {
                    Screen::FilteredSongsMenu
                };
                self.clamp_selection();
                self.reset_marquee();
            }
            Screen::AllSongsMenu
            | Screen::FilteredSongsMenu
            | Screen::ArtistMenu
            | Screen::AlbumMenu => self.enter(Screen::MusicMenu),
            Screen::MusicMenu | Screen::SettingsMenu => self.enter(Screen::MainMenu),
            Screen::MainMenu => {}
        }
    }

    fn rotate<E: AudioEngine>(
        &mut self,
        delta: i32,
        session: &mut PlaybackSession<E>,
    ) -> Option<Effect> {
        if delta == 0 {
            return None;
        }
        let Some(len) = self.active_len() else {
            return Some(Effect::VolumeChanged(session.adjust_volume(delta)));
        };
        if len == 0 {
            return None;
        }

        let len = len as i64;
        let moved = self.ctx.selected_index as i64 + i64::from(delta);
        self.ctx.selected_index = moved.rem_euclid(len) as usize;
        if self.ctx.screen.is_song_list() {
            self.ctx.v_scroll_offset = 0;
        }
        self.reset_marquee();
        None
    }

    /// End-of-track check, run once per tick on every screen.
    pub fn auto_advance<E: AudioEngine>(
        &mut self,
        session: &mut PlaybackSession<E>,
    ) -> Option<Effect> {
        if !session.is_ended() {
            return None;
        }
        tracing::debug!("track ended, advancing");
        session
            .advance_after_end()
            .err()
            .map(|err| Effect::Status(format!("Playback unavailable: {err}")))
    }

    /// Recomputes scroll offsets for the current screen.
    pub fn update_scroll(&mut self, now: Duration, viewport: &Viewport, playing: Option<&Track>) {
        let screen = self.ctx.screen;
        let (text_width, available) = if screen.scrolls() {
            self.ctx.v_scroll_offset = scroll::vertical_offset(
                self.ctx.selected_index,
                viewport.row_height(),
                viewport.list_height(),
                self.ctx.v_scroll_offset,
            );
            let width = self
                .selected_item()
                .map_or(0, |item| viewport.font.text_width(item.text()));
            (width, viewport.width - LIST_SIDE_MARGIN)
        } else if screen == Screen::Play {
            let width = playing.map_or(0, |track| viewport.font.text_width(track.label()));
            (width, viewport.width - TITLE_SIDE_MARGIN)
        } else {
            self.ctx.v_scroll_offset = 0;
            (0, viewport.width)
        };

        let (offset, last_tick) = scroll::horizontal_offset(
            text_width,
            available,
            self.ctx.h_scroll_offset,
            self.ctx.last_h_scroll_tick,
            now,
        );
        self.ctx.h_scroll_offset = offset;
        self.ctx.last_h_scroll_tick = last_tick;
    }

    fn enter(&mut self, screen: Screen) {
        tracing::debug!(from = ?self.ctx.screen, to = ?screen, "screen change");
        self.ctx.screen = screen;
        self.ctx.selected_index = 0;
        self.ctx.v_scroll_offset = 0;
        self.reset_marquee();
    }

    fn clamp_selection(&mut self) {
        match self.active_len() {
            Some(len) if len > 0 => self.ctx.selected_index %= len,
            _ => self.ctx.selected_index = 0,
        }
    }

    fn reset_marquee(&mut self) {
        self.ctx.h_scroll_offset = 0;
    }
}
