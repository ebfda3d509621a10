use crate::audio::{AudioEngine, TransportState};
use crate::library::LibraryIndex;
use crate::model::{FALLBACK_DURATION_SECONDS, Track};
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

pub const VOLUME_STEP: f32 = 0.05;

/// A track that ends before this much playback counts as a short play.
pub const SHORT_PLAY_SECONDS: f64 = 0.5;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("library is empty")]
    EmptyLibrary,
    #[error("track {index} ({file}) is unavailable")]
    TrackUnavailable {
        index: usize,
        file: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("gave up after {attempts} unplayable tracks")]
    SkipBudgetExhausted {
        attempts: usize,
        #[source]
        last: Box<PlaybackError>,
    },
    #[error("{attempts} tracks in a row ended without playing")]
    EndedWithoutPlaying { attempts: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Forward,
    Backward,
}

/// Transport state layered over an [`AudioEngine`].
///
/// `current_original_index` stays `None` until the first play attempt. A failed
/// load still moves the cursor, so `next`/`previous` continue past the broken
/// track instead of retrying it.
pub struct PlaybackSession<E: AudioEngine> {
    library: Rc<LibraryIndex>,
    engine: E,
    current_original_index: Option<usize>,
    paused: bool,
    song_length_seconds: f64,
    duration_probed: bool,
    paused_position: Option<Duration>,
    volume: f32,
    unavailable: bool,
    max_skip_attempts: usize,
    short_plays: usize,
}

impl<E: AudioEngine> PlaybackSession<E> {
    pub fn new(library: Rc<LibraryIndex>, engine: E, volume: f32, max_skip_attempts: usize) -> Self {
        Self {
            library,
            engine,
            current_original_index: None,
            paused: false,
            song_length_seconds: 0.0,
            duration_probed: false,
            paused_position: None,
            volume: volume.clamp(0.0, 1.0),
            unavailable: false,
            max_skip_attempts: max_skip_attempts.max(1),
            short_plays: 0,
        }
    }

    pub fn library(&self) -> &Rc<LibraryIndex> {
        &self.library
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_original_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.library.track(self.current_original_index?)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    pub fn song_length_seconds(&self) -> f64 {
        self.song_length_seconds
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Loads and starts one track, no skipping. Returns the normalized index.
    pub fn play(&mut self, original_index: usize) -> Result<usize, PlaybackError> {
        let len = self.library.len();
        if len == 0 {
            return Err(PlaybackError::EmptyLibrary);
        }

        let index = original_index % len;
        let track = self.library.tracks()[index].clone();
        let path = self.library.path_of(&track);

        self.current_original_index = Some(index);
        self.paused = false;
        self.paused_position = None;

        if let Err(err) = self.engine.load(&path) {
            self.unavailable = true;
            self.song_length_seconds = 0.0;
            self.duration_probed = false;
            tracing::warn!(track = %track.file_name, "track unavailable: {err:#}");
            return Err(PlaybackError::TrackUnavailable {
                index,
                file: track.file_name,
                source: err.into(),
            });
        }
        self.engine.play();
        self.unavailable = false;

        match self.engine.query_duration(&path) {
            Ok(duration) => {
                self.song_length_seconds = duration.as_secs_f64();
                self.duration_probed = true;
            }
            Err(err) => {
                tracing::debug!(track = %track.file_name, "duration query failed: {err:#}");
                match track.duration_seconds {
                    Some(seconds) => {
                        self.song_length_seconds = seconds;
                        self.duration_probed = true;
                    }
                    None => {
                        self.song_length_seconds = FALLBACK_DURATION_SECONDS;
                        self.duration_probed = false;
                    }
                }
            }
        }

        tracing::info!(
            track = %track.file_name,
            index,
            length = self.song_length_seconds,
            "playing"
        );
        Ok(index)
    }

    /// Plays `original_index`, moving on to the following track when it cannot
    /// be loaded, for at most `min(max_skip_attempts, track_count)` attempts.
    pub fn play_or_skip(&mut self, original_index: usize) -> Result<usize, PlaybackError> {
        self.short_plays = 0;
        self.play_stepping(original_index, Step::Forward)
    }

    pub fn next(&mut self) -> Result<usize, PlaybackError> {
        self.short_plays = 0;
        self.play_stepping(self.following_index(), Step::Forward)
    }

    pub fn previous(&mut self) -> Result<usize, PlaybackError> {
        self.short_plays = 0;
        let len = self.library.len().max(1);
        let start = self
            .current_original_index
            .map_or(0, |current| (current + len - 1) % len);
        self.play_stepping(start, Step::Backward)
    }

    /// Moves on after the current track ended by itself.
    ///
    /// Tracks that end within [`SHORT_PLAY_SECONDS`] are counted; after
    /// `min(max_skip_attempts, track_count)` of them in a row the session goes
    /// idle like an exhausted skip. A track that plays longer resets the count.
    pub fn advance_after_end(&mut self) -> Result<usize, PlaybackError> {
        if self.elapsed_seconds() < SHORT_PLAY_SECONDS {
            self.short_plays += 1;
        } else {
            self.short_plays = 0;
        }

        let limit = self.max_skip_attempts.min(self.library.len().max(1));
        if self.short_plays >= limit {
            self.unavailable = true;
            self.short_plays = 0;
            tracing::error!(attempts = limit, "tracks keep ending immediately, playback stopped");
            return Err(PlaybackError::EndedWithoutPlaying { attempts: limit });
        }
        self.play_stepping(self.following_index(), Step::Forward)
    }

    fn following_index(&self) -> usize {
        let len = self.library.len().max(1);
        self.current_original_index.map_or(0, |current| (current + 1) % len)
    }

    fn play_stepping(&mut self, start: usize, step: Step) -> Result<usize, PlaybackError> {
        let len = self.library.len();
        if len == 0 {
            return Err(PlaybackError::EmptyLibrary);
        }

        let budget = self.max_skip_attempts.min(len);
        let mut index = start % len;
        let mut last_error = None;
        for _ in 0..budget {
            match self.play(index) {
                Ok(played) => return Ok(played),
                Err(err) => last_error = Some(err),
            }
            index = match step {
                Step::Forward => (index + 1) % len,
                Step::Backward => (index + len - 1) % len,
            };
        }

        tracing::error!(attempts = budget, "no playable track found, playback stopped");
        let last = last_error.unwrap_or(PlaybackError::EmptyLibrary);
        Err(PlaybackError::SkipBudgetExhausted {
            attempts: budget,
            last: Box::new(last),
        })
    }

    /// Flips pause. Returns the new paused state; a no-op without a loaded track.
    pub fn toggle_pause(&mut self) -> bool {
        if self.current_original_index.is_none() || self.unavailable {
            return self.paused;
        }

        if self.paused {
            self.engine.resume();
            if let Some(position) = self.paused_position.take()
                && let Err(err) = self.engine.set_position(position)
            {
                tracing::warn!("failed to restore pause position: {err:#}");
            }
            self.paused = false;
            tracing::debug!("resumed");
        } else {
            self.paused_position = self.engine.position();
            self.engine.pause();
            self.paused = true;
            tracing::debug!("paused");
        }
        self.paused
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.engine
            .position()
            .map(|position| position.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Natural end of track, or the known length has fully elapsed.
    pub fn is_ended(&self) -> bool {
        if self.current_original_index.is_none() || self.unavailable {
            return false;
        }
        if self.engine.transport_state() == TransportState::Ended {
            return true;
        }
        self.duration_probed
            && !self.paused
            && self.song_length_seconds > 0.0
            && self.elapsed_seconds() >= self.song_length_seconds
    }

    pub fn progress(&self) -> f64 {
        if self.song_length_seconds <= 0.0 {
            return 0.0;
        }
        (self.elapsed_seconds() / self.song_length_seconds).clamp(0.0, 1.0)
    }

    /// Applies encoder ticks to the volume and returns the clamped result.
    pub fn adjust_volume(&mut self, delta: i32) -> f32 {
        let next = self.volume + delta as f32 * VOLUME_STEP;
        self.volume = next.clamp(0.0, 1.0);
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedAudioEngine;
    use crate::clock::ManualClock;
    use crate::model::TrackTags;
    use std::path::PathBuf;

    fn library(names: &[&str]) -> Rc<LibraryIndex> {
        let entries = names
            .iter()
            .map(|name| (name.to_string(), TrackTags::default()))
            .collect();
        Rc::new(LibraryIndex::from_entries(PathBuf::from("music"), entries).expect("library"))
    }

    fn session(
        names: &[&str],
        clock: &ManualClock,
        seconds: u64,
    ) -> PlaybackSession<SimulatedAudioEngine> {
        let library = library(names);
        let mut engine = SimulatedAudioEngine::new(Rc::new(clock.clone()));
        for name in names {
            engine = engine.with_duration(
                PathBuf::from("music").join(name),
                Duration::from_secs(seconds),
            );
        }
        PlaybackSession::new(library, engine, 0.5, 3)
    }

    #[test]
    fn play_normalizes_index_and_resets_state() {
        let clock = ManualClock::new();
        let mut session = session(&["a.mp3", "b.mp3", "c.flac"], &clock, 100);

        assert_eq!(session.play(4).expect("play"), 1);
        assert_eq!(session.current_index(), Some(1));
        assert!(!session.is_paused());
        assert_eq!(session.song_length_seconds(), 100.0);
        assert_eq!(
            session.engine().current_track(),
            Some(PathBuf::from("music").join("b.mp3").as_path())
        );
    }

    #[test]
    fn unknown_duration_falls_back() {
        let clock = ManualClock::new();
        let mut engine = SimulatedAudioEngine::new(Rc::new(clock.clone()));
        engine = engine.with_duration("elsewhere.mp3", Duration::from_secs(1));
        let mut session = PlaybackSession::new(library(&["a.mp3"]), engine, 0.5, 3);

        session.play(0).expect("play");
        assert_eq!(session.song_length_seconds(), FALLBACK_DURATION_SECONDS);

        clock.advance(Duration::from_secs(200));
        assert!(!session.is_ended(), "fallback length must not force a skip");
    }

    #[test]
    fn tagged_length_is_used_when_the_engine_cannot_tell() {
        let clock = ManualClock::new();
        let entries = vec![(
            "a.mp3".to_string(),
            TrackTags {
                duration_seconds: Some(42.0),
                ..TrackTags::default()
            },
        )];
        let library = Rc::new(
            LibraryIndex::from_entries(PathBuf::from("music"), entries).expect("library"),
        );
        let mut engine = SimulatedAudioEngine::new(Rc::new(clock.clone()));
        engine = engine.with_duration("elsewhere.mp3", Duration::from_secs(1));
        let mut session = PlaybackSession::new(library, engine, 0.5, 3);

        session.play(0).expect("play");
        assert_eq!(session.song_length_seconds(), 42.0);

        clock.advance(Duration::from_secs(43));
        assert!(session.is_ended());
    }

    #[test]
    fn next_and_previous_wrap() {
        let clock = ManualClock::new();
        let mut session = session(&["a.mp3", "b.mp3", "c.flac"], &clock, 100);

        session.play(2).expect("play");
        assert_eq!(session.next().expect("next"), 0);
        assert_eq!(session.previous().expect("previous"), 2);
        assert_eq!(session.previous().expect("previous"), 1);
    }

    #[test]
    fn pause_round_trip_restores_position() {
        let clock = ManualClock::new();
        let mut session = session(&["a.mp3"], &clock, 100);
        session.play(0).expect("play");
        clock.advance(Duration::from_secs(7));

        assert!(session.toggle_pause());
        let paused_at = session.elapsed_seconds();
        clock.advance(Duration::from_secs(30));
        assert!(!session.toggle_pause());
        clock.advance(Duration::from_millis(33));

        assert!(!session.is_paused());
        let drift = session.elapsed_seconds() - paused_at;
        assert!((0.0..=0.034).contains(&drift), "drift was {drift}");
    }

    #[test]
    fn toggle_without_track_is_noop() {
        let clock = ManualClock::new();
        let mut session = session(&["a.mp3"], &clock, 100);
        assert!(!session.toggle_pause());
        assert!(!session.is_paused());
    }

    #[test]
    fn ended_and_progress_follow_engine_time() {
        let clock = ManualClock::new();
        let mut session = session(&["a.mp3", "b.mp3"], &clock, 10);
        session.play(0).expect("play");

        clock.advance(Duration::from_secs(5));
        assert!((session.progress() - 0.5).abs() < 1e-9);
        assert!(!session.is_ended());

        clock.advance(Duration::from_secs(6));
        assert_eq!(session.progress(), 1.0);
        assert!(session.is_ended());
    }

    #[test]
    fn unavailable_track_is_skipped() {
        let clock = ManualClock::new();
        let mut session = session(&["a.mp3", "b.mp3", "c.flac"], &clock, 100);
        session
            .engine_mut()
            .mark_unplayable(PathBuf::from("music").join("b.mp3"));

        assert!(matches!(
            session.play(1),
            Err(PlaybackError::TrackUnavailable { index: 1, .. })
        ));
        assert!(session.is_unavailable());
        assert!(!session.is_ended());

        assert_eq!(session.play_or_skip(1).expect("skip"), 2);
        assert!(!session.is_unavailable());
    }

    #[test]
    fn skipping_is_bounded_when_every_track_fails() {
        let clock = ManualClock::new();
        let names = ["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"];
        let mut session = session(&names, &clock, 100);
        for name in names {
            session
                .engine_mut()
                .mark_unplayable(PathBuf::from("music").join(name));
        }

        let err = session.next().expect_err("nothing is playable");
        assert!(matches!(
            err,
            PlaybackError::SkipBudgetExhausted { attempts: 3, .. }
        ));
        assert!(session.is_unavailable());
        assert!(!session.is_ended());
        assert!(!session.toggle_pause());
    }

    #[test]
    fn zero_length_tracks_stop_auto_advance() {
        let clock = ManualClock::new();
        let names = ["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"];
        let mut engine = SimulatedAudioEngine::new(Rc::new(clock.clone()));
        for name in names {
            engine = engine.with_duration(PathBuf::from("music").join(name), Duration::ZERO);
        }
        let mut session = PlaybackSession::new(library(&names), engine, 0.5, 3);
        session.play_or_skip(0).expect("play");

        let mut advances = 0;
        while session.is_ended() {
            advances += 1;
            assert!(advances <= names.len(), "auto-advance did not stop");
            match session.advance_after_end() {
                Ok(_) => {}
                Err(err) => {
                    assert!(matches!(err, PlaybackError::EndedWithoutPlaying { attempts: 3 }));
                    break;
                }
            }
        }
        assert_eq!(advances, 3);
        assert!(session.is_unavailable());
        assert!(!session.is_ended());

        assert_eq!(session.play_or_skip(0).expect("user pick"), 0);
        assert!(!session.is_unavailable());
    }

    #[test]
    fn a_full_play_resets_the_short_play_count() {
        let clock = ManualClock::new();
        let names = ["a.mp3", "b.mp3", "c.mp3", "d.mp3"];
        let mut engine = SimulatedAudioEngine::new(Rc::new(clock.clone()));
        for name in ["a.mp3", "b.mp3", "d.mp3"] {
            engine = engine.with_duration(PathBuf::from("music").join(name), Duration::ZERO);
        }
        engine = engine.with_duration(PathBuf::from("music").join("c.mp3"), Duration::from_secs(5));
        let mut session = PlaybackSession::new(library(&names), engine, 0.5, 3);
        session.play_or_skip(0).expect("play");

        assert_eq!(session.advance_after_end().expect("to b"), 1);
        assert_eq!(session.advance_after_end().expect("to c"), 2);
        clock.advance(Duration::from_secs(5));
        assert!(session.is_ended());
        assert_eq!(session.advance_after_end().expect("to d"), 3);
        assert_eq!(session.advance_after_end().expect("to a"), 0);
        assert!(!session.is_unavailable());
    }

    #[test]
    fn volume_is_clamped() {
        let clock = ManualClock::new();
        let mut session = session(&["a.mp3"], &clock, 100);
        assert_eq!(session.adjust_volume(-40), 0.0);
        assert!((session.adjust_volume(3) - 0.15).abs() < 1e-6);
        assert_eq!(session.adjust_volume(100), 1.0);
    }

    proptest::proptest! {
        #[test]
        fn next_cycles_back_to_start(len in 1usize..12, start in 0usize..40) {
            let clock = ManualClock::new();
            let names: Vec<String> = (0..len).map(|n| format!("t{n:02}.mp3")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let mut session = session(&refs, &clock, 100);

            let first = session.play(start).expect("play");
            for _ in 0..len {
                session.next().expect("next");
            }
            proptest::prop_assert_eq!(session.current_index(), Some(first));

            session.previous().expect("previous");
            session.next().expect("next");
            proptest::prop_assert_eq!(session.current_index(), Some(first));
        }

        #[test]
        fn volume_stays_in_range(deltas in proptest::collection::vec(-30i32..30, 0..60)) {
            let clock = ManualClock::new();
            let mut session = session(&["a.mp3"], &clock, 100);
            for delta in deltas {
                let volume = session.adjust_volume(delta);
                proptest::prop_assert!((0.0..=1.0).contains(&volume));
            }
        }
    }
}
