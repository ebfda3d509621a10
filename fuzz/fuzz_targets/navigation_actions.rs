#![no_main]

use libfuzzer_sys::fuzz_target;
use pocket::audio::SimulatedAudioEngine;
use pocket::clock::{Clock, ManualClock};
use pocket::library::LibraryIndex;
use pocket::model::TrackTags;
use pocket::navigation::{Action, Navigator};
use pocket::playback::PlaybackSession;
use pocket::scroll::Viewport;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let Some((&seed, ops)) = data.split_first() else {
        return;
    };
    let len = usize::from(seed % 16) + 1;
    let entries = (0..len)
        .map(|idx| {
            let tags = TrackTags {
                artist: (idx % 3 != 0).then(|| format!("artist {}", idx % 4)),
                album: (idx % 2 == 0).then(|| format!("album {}", idx % 5)),
                duration_seconds: None,
            };
            (format!("track_{idx}.mp3"), tags)
        })
        .collect();
    let Ok(library) = LibraryIndex::from_entries(PathBuf::from("music"), entries) else {
        return;
    };
    let library = Rc::new(library);

    let clock = ManualClock::new();
    let mut engine = SimulatedAudioEngine::new(Rc::new(clock.clone()));
    for (idx, track) in library.tracks().iter().enumerate() {
        let path = library.path_of(track);
        if usize::from(seed) & (1 << (idx % 8)) != 0 && idx % 3 == 1 {
            engine.mark_unplayable(path);
        } else {
            engine = engine.with_duration(path, Duration::from_secs(5 + idx as u64));
        }
    }
    let mut session = PlaybackSession::new(Rc::clone(&library), engine, 0.5, 3);
    let mut navigator = Navigator::new(library);
    let viewport = Viewport::new(160, 128);

    for byte in ops {
        let action = match byte % 8 {
            0 => Action::Select,
            1 => Action::Back,
            2 => Action::TogglePause,
            3 => Action::Previous,
            4 => Action::Next,
            _ => Action::Encoder(i32::from(*byte as i8) / 8),
        };
        navigator.apply(action, &mut session);
        clock.advance(Duration::from_millis(u64::from(*byte) * 40));
        navigator.auto_advance(&mut session);
        navigator.update_scroll(clock.now(), &viewport, session.current_track());

        if let Some(len) = navigator.active_len() {
            assert!(navigator.context().selected_index < len.max(1));
        }
        assert!((0.0..=1.0).contains(&session.volume()));
    }
});
