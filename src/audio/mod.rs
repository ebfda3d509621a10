use crate::clock::Clock;
use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Playing,
    Paused,
    Ended,
}

/// The decoder/output side of the player. Loading leaves the track paused at
/// zero until `play` is called.
pub trait AudioEngine {
    fn load(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn position(&self) -> Option<Duration>;
    fn set_position(&mut self, position: Duration) -> Result<()>;
    fn transport_state(&self) -> TransportState;
    fn query_duration(&self, path: &Path) -> Result<Duration>;
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
}

impl RodioAudioEngine {
    pub fn new() -> Result<Self> {
        let mut stream = with_silenced_stderr(|| {
            OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                })
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            stream,
            sink,
            current: None,
        })
    }
}

impl AudioEngine for RodioAudioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.sink.stop();
        self.current = None;
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();

        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.sink.append(source);
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) {
        if self.current.is_some() {
            self.sink.play();
        }
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.play();
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn transport_state(&self) -> TransportState {
        if self.current.is_none() {
            TransportState::Idle
        } else if self.sink.empty() {
            TransportState::Ended
        } else if self.sink.is_paused() {
            TransportState::Paused
        } else {
            TransportState::Playing
        }
    }

    fn query_duration(&self, path: &Path) -> Result<Duration> {
        probe_duration(path)
    }
}

/// Reads the container header through symphonia to find the track length.
pub fn probe_duration(path: &Path) -> Result<Duration> {
    let file =
        File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("failed to probe {}", path.display()))?;

    probed
        .format
        .default_track()
        .and_then(|track| codec_duration(&track.codec_params))
        .filter(|duration| !duration.is_zero())
        .with_context(|| format!("duration unknown for {}", path.display()))
}

fn codec_duration(codec_params: &CodecParameters) -> Option<Duration> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        return Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
    }

    let (frame_count, sample_rate) = codec_params
        .n_frames
        .zip(codec_params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)?;
    Some(Duration::from_secs_f64(
        frame_count as f64 / f64::from(sample_rate),
    ))
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Clock-driven engine with no output device. Used by tests and the fuzz
/// target; tracks can be given fixed lengths or marked unplayable.
pub struct SimulatedAudioEngine {
    clock: Rc<dyn Clock>,
    current: Option<PathBuf>,
    paused: bool,
    started_at: Option<Duration>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    durations: HashMap<PathBuf, Duration>,
    unplayable: Vec<PathBuf>,
}

impl SimulatedAudioEngine {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            current: None,
            paused: false,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            durations: HashMap::new(),
            unplayable: Vec::new(),
        }
    }

    pub fn with_duration(mut self, path: impl Into<PathBuf>, duration: Duration) -> Self {
        self.durations.insert(path.into(), duration);
        self
    }

    pub fn mark_unplayable(&mut self, path: impl Into<PathBuf>) {
        self.unplayable.push(path.into());
    }

    pub fn current_track(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(self.clock.now().saturating_sub(started_at));
        }
        match self.track_duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

impl AudioEngine for SimulatedAudioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.current = None;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        if self.unplayable.iter().any(|candidate| candidate == path) {
            anyhow::bail!("device busy, cannot open {}", path.display());
        }

        self.paused = true;
        self.track_duration = self.query_duration(path).ok();
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) {
        if self.current.is_some() {
            self.started_at = Some(self.clock.now());
            self.paused = false;
        }
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        self.play();
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = (!self.paused).then(|| self.clock.now());
        Ok(())
    }

    fn transport_state(&self) -> TransportState {
        if self.current.is_none() {
            return TransportState::Idle;
        }
        if self.paused {
            return TransportState::Paused;
        }
        match self.track_duration {
            Some(duration) if self.current_position() >= duration => TransportState::Ended,
            _ => TransportState::Playing,
        }
    }

    fn query_duration(&self, path: &Path) -> Result<Duration> {
        match self.durations.get(path) {
            Some(duration) => Ok(*duration),
            None => probe_duration(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::fs;
    use tempfile::tempdir;

    fn write_test_wav(path: &Path, duration_ms: u32) {
        let sample_rate: u32 = 44_100;
        let channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let bytes_per_sample = u32::from(bits_per_sample / 8);
        let total_samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1_000) as u32;
        let data_size = total_samples * u32::from(channels) * bytes_per_sample;
        let byte_rate = sample_rate * u32::from(channels) * bytes_per_sample;
        let block_align = channels * (bits_per_sample / 8);
        let riff_chunk_size = 36_u32.saturating_add(data_size);

        let mut bytes = Vec::with_capacity((44_u32 + data_size) as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&riff_chunk_size.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes.resize((44_u32 + data_size) as usize, 0_u8);

        fs::write(path, bytes).expect("wav fixture should be written");
    }

    fn engine(clock: &ManualClock) -> SimulatedAudioEngine {
        SimulatedAudioEngine::new(Rc::new(clock.clone()))
    }

    #[test]
    fn probe_reads_wav_length() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 500);

        let duration = probe_duration(&track).expect("duration should be detected");
        assert!(duration >= Duration::from_millis(490) && duration <= Duration::from_millis(510));
    }

    #[test]
    fn probe_fails_on_garbage() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("garbage.mp3");
        fs::write(&track, b"not audio at all").expect("write");
        assert!(probe_duration(&track).is_err());
        assert!(probe_duration(&dir.path().join("missing.flac")).is_err());
    }

    #[test]
    fn load_waits_for_play() {
        let clock = ManualClock::new();
        let mut engine = engine(&clock).with_duration("a.mp3", Duration::from_secs(10));
        engine.load(Path::new("a.mp3")).expect("load");
        clock.advance(Duration::from_secs(1));
        assert_eq!(engine.position(), Some(Duration::ZERO));

        engine.play();
        clock.advance(Duration::from_secs(2));
        assert_eq!(engine.position(), Some(Duration::from_secs(2)));
        assert_eq!(engine.transport_state(), TransportState::Playing);
    }

    #[test]
    fn pause_freezes_position_and_resume_continues() {
        let clock = ManualClock::new();
        let mut engine = engine(&clock).with_duration("a.mp3", Duration::from_secs(10));
        engine.load(Path::new("a.mp3")).expect("load");
        engine.play();
        clock.advance(Duration::from_secs(3));

        engine.pause();
        clock.advance(Duration::from_secs(5));
        assert_eq!(engine.position(), Some(Duration::from_secs(3)));
        assert_eq!(engine.transport_state(), TransportState::Paused);

        engine.resume();
        clock.advance(Duration::from_secs(1));
        assert_eq!(engine.position(), Some(Duration::from_secs(4)));
    }

    #[test]
    fn reports_end_once_length_elapses() {
        let clock = ManualClock::new();
        let mut engine = engine(&clock).with_duration("a.mp3", Duration::from_secs(2));
        engine.load(Path::new("a.mp3")).expect("load");
        engine.play();
        clock.advance(Duration::from_secs(3));
        assert_eq!(engine.transport_state(), TransportState::Ended);
        assert_eq!(engine.position(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn unknown_length_never_ends() {
        let clock = ManualClock::new();
        let mut engine = engine(&clock);
        engine.load(Path::new("nonexistent-track.flac")).expect("load");
        engine.play();
        clock.advance(Duration::from_secs(600));
        assert_eq!(engine.transport_state(), TransportState::Playing);
    }

    #[test]
    fn unplayable_track_fails_to_load() {
        let clock = ManualClock::new();
        let mut engine = engine(&clock);
        engine.mark_unplayable("bad.mp3");
        assert!(engine.load(Path::new("bad.mp3")).is_err());
        assert_eq!(engine.transport_state(), TransportState::Idle);
        assert_eq!(engine.current_track(), None);
    }

    #[test]
    fn seek_is_clamped_to_length() {
        let clock = ManualClock::new();
        let mut engine = engine(&clock).with_duration("a.mp3", Duration::from_secs(5));
        assert!(engine.set_position(Duration::from_secs(1)).is_err());
        engine.load(Path::new("a.mp3")).expect("load");
        engine
            .set_position(Duration::from_secs(9))
            .expect("seek should succeed");
        assert_eq!(engine.position(), Some(Duration::from_secs(5)));
    }
}
