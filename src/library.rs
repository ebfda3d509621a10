use crate::model::{Track, TrackTags, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use anyhow::{Context, Result};
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("music directory {0} does not exist")]
    MissingDirectory(PathBuf),
    #[error("failed to read music directory {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("no audio files found in {0}")]
    NoAudioFilesFound(PathBuf),
}

pub trait MetadataProvider {
    fn read_tags(&self, path: &Path) -> Result<TrackTags>;
}

/// Reads artist, album and duration through lofty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyMetadata;

impl MetadataProvider for LoftyMetadata {
    fn read_tags(&self, path: &Path) -> Result<TrackTags> {
        let tagged_file = Probe::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .read()
            .with_context(|| format!("failed to parse tags for {}", path.display()))?;

        let duration = tagged_file.properties().duration().as_secs_f64();
        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        Ok(TrackTags {
            artist: tag
                .and_then(|tag| tag.artist())
                .and_then(|value| clean_tag_value(&value)),
            album: tag
                .and_then(|tag| tag.album())
                .and_then(|value| clean_tag_value(&value)),
            duration_seconds: (duration > 0.0).then_some(duration),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LibraryIndex {
    folder: PathBuf,
    tracks: Vec<Track>,
    artists: Vec<String>,
    albums: Vec<String>,
}

impl LibraryIndex {
    pub fn build(folder: &Path, provider: &dyn MetadataProvider) -> Result<Self, LibraryError> {
        let files = scan_audio_files(folder)?;
        let mut entries = Vec::with_capacity(files.len());

        for file_name in files {
            let tags = match provider.read_tags(&folder.join(&file_name)) {
                Ok(tags) => tags,
                Err(err) => {
                    tracing::warn!(file = %file_name, "metadata unavailable, using fallbacks: {err:#}");
                    TrackTags::default()
                }
            };
            entries.push((file_name, tags));
        }

        let index = Self::from_entries(folder.to_path_buf(), entries)?;
        tracing::info!(
            folder = %folder.display(),
            tracks = index.tracks.len(),
            artists = index.artists.len(),
            albums = index.albums.len(),
            "library indexed"
        );
        Ok(index)
    }

    pub fn from_entries(
        folder: PathBuf,
        mut entries: Vec<(String, TrackTags)>,
    ) -> Result<Self, LibraryError> {
        if entries.is_empty() {
            return Err(LibraryError::NoAudioFilesFound(folder));
        }

        entries.sort_by_cached_key(|(file_name, _)| (sort_key(file_name), file_name.clone()));

        let tracks: Vec<Track> = entries
            .into_iter()
            .enumerate()
            .map(|(original_index, (file_name, tags))| Track {
                file_name,
                artist: tags.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
                album: tags.album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
                original_index,
                duration_seconds: tags
                    .duration_seconds
                    .filter(|seconds| seconds.is_finite() && *seconds > 0.0),
            })
            .collect();

        let artists: BTreeSet<&str> = tracks.iter().map(|track| track.artist.as_str()).collect();
        let albums: BTreeSet<&str> = tracks.iter().map(|track| track.album.as_str()).collect();
        let artists = artists.into_iter().map(ToOwned::to_owned).collect();
        let albums = albums.into_iter().map(ToOwned::to_owned).collect();

        Ok(Self {
            folder,
            tracks,
            artists,
            albums,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, original_index: usize) -> Option<&Track> {
        self.tracks.get(original_index)
    }

    pub fn path_of(&self, track: &Track) -> PathBuf {
        self.folder.join(&track.file_name)
    }

    pub fn artists(&self) -> &[String] {
        &self.artists
    }

    pub fn albums(&self) -> &[String] {
        &self.albums
    }

    pub fn tracks_by_artist(&self, name: &str) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|track| track.artist == name)
            .cloned()
            .collect()
    }

    pub fn tracks_by_album(&self, name: &str) -> Vec<Track> {
        self.tracks
            .iter()
            .filter(|track| track.album == name)
            .cloned()
            .collect()
    }
}

pub fn scan_audio_files(folder: &Path) -> Result<Vec<String>, LibraryError> {
    if !folder.is_dir() {
        return Err(LibraryError::MissingDirectory(folder.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| LibraryError::Unreadable {
            path: folder.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() || !is_audio(entry.path()) {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => files.push(name.to_string()),
            None => tracing::warn!(
                file = %entry.path().display(),
                "skipping file with a non UTF-8 name"
            ),
        }
    }

    if files.is_empty() {
        return Err(LibraryError::NoAudioFilesFound(folder.to_path_buf()));
    }

    files.sort_by_cached_key(|name| (sort_key(name), name.clone()));
    Ok(files)
}

pub fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

fn sort_key(name: &str) -> String {
    name.nfkc().flat_map(char::to_lowercase).collect()
}

fn clean_tag_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
