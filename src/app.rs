use crate::audio::AudioEngine;
use crate::clock::Clock;
use crate::config::PlayerConfig;
use crate::display::Display;
use crate::input::{Debouncer, InputDevice};
use crate::library::LibraryIndex;
use crate::model::Theme;
use crate::navigation::{Effect, Navigator};
use crate::playback::PlaybackSession;
use crate::render::{self, Frame, NowPlaying, RenderSnapshot};
use crate::scroll::Viewport;
use crate::volume::{VolumeSink, volume_to_percent};
use anyhow::Result;
use std::rc::Rc;
use std::time::{Duration, Instant};

const STATUS_DURATION: Duration = Duration::from_secs(2);
const MAX_CONSECUTIVE_FAILURES: u32 = 50;

/// The control loop: owns every collaborator and advances them one tick at a time.
pub struct Player<E, I, D, V>
where
    E: AudioEngine,
    I: InputDevice,
    D: Display,
    V: VolumeSink,
{
    navigator: Navigator,
    session: PlaybackSession<E>,
    input: I,
    display: D,
    volume_sink: V,
    clock: Rc<dyn Clock>,
    debouncer: Debouncer,
    viewport: Viewport,
    theme: Theme,
    volume_overlay: Duration,
    last_volume_change: Option<Duration>,
    status: Option<(String, Duration)>,
    quit: bool,
}

impl<E, I, D, V> Player<E, I, D, V>
where
    E: AudioEngine,
    I: InputDevice,
    D: Display,
    V: VolumeSink,
{
    pub fn new(
        config: &PlayerConfig,
        library: Rc<LibraryIndex>,
        engine: E,
        input: I,
        display: D,
        volume_sink: V,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let session = PlaybackSession::new(
            Rc::clone(&library),
            engine,
            config.initial_volume,
            config.max_skip_attempts,
        );
        let mut player = Self {
            navigator: Navigator::new(library),
            session,
            input,
            display,
            volume_sink,
            clock,
            debouncer: Debouncer::new(config.debounce()),
            viewport: Viewport::new(config.display_width, config.display_height),
            theme: config.theme,
            volume_overlay: config.volume_overlay(),
            last_volume_change: None,
            status: None,
            quit: false,
        };
        player.push_volume();
        player
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn session(&self) -> &PlaybackSession<E> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession<E> {
        &mut self.session
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn volume_sink(&self) -> &V {
        &self.volume_sink
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// One iteration: input, actions, auto-advance, scroll, render, present.
    pub fn tick(&mut self) -> Result<()> {
        let now = self.clock.now();
        let raw = self.input.poll()?;
        if raw.quit {
            tracing::info!("quit requested");
            self.quit = true;
            return Ok(());
        }

        let frame = self.debouncer.filter(raw, now);
        for action in frame.actions() {
            if let Some(effect) = self.navigator.apply(action, &mut self.session) {
                self.handle_effect(effect, now);
            }
        }
        if let Some(effect) = self.navigator.auto_advance(&mut self.session) {
            self.handle_effect(effect, now);
        }

        self.navigator
            .update_scroll(now, &self.viewport, self.session.current_track());

        if let Some((_, since)) = &self.status
            && now.saturating_sub(*since) >= STATUS_DURATION
        {
            self.status = None;
        }

        let frame = self.render_frame(now);
        self.display.present(&frame)
    }

    /// Ticks at a fixed rate until quit. Tick failures are logged and shown,
    /// a long unbroken run of them ends the loop.
    pub fn run(&mut self, tick_interval: Duration) -> Result<()> {
        let mut failures = 0;
        while !self.quit {
            let started = Instant::now();
            match self.tick() {
                Ok(()) => failures = 0,
                Err(err) => {
                    failures += 1;
                    tracing::warn!("tick failed: {err:#}");
                    self.set_status(format!("Error: {err}"));
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        return Err(err.context("control loop kept failing"));
                    }
                }
            }
            std::thread::sleep(tick_interval.saturating_sub(started.elapsed()));
        }
        Ok(())
    }

    pub fn render_frame(&self, now: Duration) -> Frame {
        let ctx = self.navigator.context();
        let now_playing = self.session.current_track().map(|track| NowPlaying {
            track,
            paused: self.session.is_paused(),
            elapsed_seconds: self.session.elapsed_seconds(),
            length_seconds: self.session.song_length_seconds(),
            progress: self.session.progress(),
        });
        let show_volume = self
            .last_volume_change
            .is_some_and(|changed| now.saturating_sub(changed) < self.volume_overlay);

        let snapshot = RenderSnapshot {
            screen: ctx.screen,
            title: self.navigator.title(),
            items: self.navigator.items(),
            selected_index: ctx.selected_index,
            v_scroll_offset: ctx.v_scroll_offset,
            h_scroll_offset: ctx.h_scroll_offset,
            now_playing,
            theme: self.theme,
            volume: self.session.volume(),
            show_volume,
            status: self.status(),
        };
        render::render(&snapshot, &self.viewport)
    }

    fn handle_effect(&mut self, effect: Effect, now: Duration) {
        match effect {
            Effect::ApplyTheme(theme) => {
                tracing::info!(theme = theme.label(), "theme changed");
                self.theme = theme;
            }
            Effect::VolumeChanged(_) => {
                self.last_volume_change = Some(now);
                self.push_volume();
            }
            Effect::Status(text) => {
                self.status = Some((text, now));
            }
        }
    }

    fn set_status(&mut self, text: String) {
        self.status = Some((text, self.clock.now()));
    }

    fn push_volume(&mut self) {
        let percent = volume_to_percent(self.session.volume());
        if let Err(err) = self.volume_sink.set_volume_percent(percent) {
            tracing::warn!(percent, "failed to set volume: {err:#}");
            self.set_status(String::from("Volume control unavailable"));
        }
    }
}
