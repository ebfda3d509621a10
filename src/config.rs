use crate::model::Theme;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "pocket-player";
const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "pocket.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_max_skip_attempts")]
    pub max_skip_attempts: usize,
    #[serde(default = "default_mixer_control")]
    pub mixer_control: String,
    #[serde(default = "default_display_width")]
    pub display_width: u32,
    #[serde(default = "default_display_height")]
    pub display_height: u32,
    #[serde(default = "default_volume_overlay_ms")]
    pub volume_overlay_ms: u64,
}

fn default_music_dir() -> PathBuf {
    PathBuf::from("mp3_files")
}

fn default_tick_hz() -> u32 {
    30
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_initial_volume() -> f32 {
    0.5
}

fn default_max_skip_attempts() -> usize {
    3
}

fn default_mixer_control() -> String {
    String::from("Master")
}

fn default_display_width() -> u32 {
    160
}

fn default_display_height() -> u32 {
    128
}

fn default_volume_overlay_ms() -> u64 {
    1_000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            tick_hz: default_tick_hz(),
            debounce_ms: default_debounce_ms(),
            initial_volume: default_initial_volume(),
            theme: Theme::default(),
            max_skip_attempts: default_max_skip_attempts(),
            mixer_control: default_mixer_control(),
            display_width: default_display_width(),
            display_height: default_display_height(),
            volume_overlay_ms: default_volume_overlay_ms(),
        }
    }
}

impl PlayerConfig {
    pub fn sanitized(mut self) -> Self {
        self.tick_hz = self.tick_hz.clamp(1, 240);
        if !self.initial_volume.is_finite() {
            self.initial_volume = default_initial_volume();
        }
        self.initial_volume = self.initial_volume.clamp(0.0, 1.0);
        self.max_skip_attempts = self.max_skip_attempts.max(1);
        self.display_width = self.display_width.max(32);
        self.display_height = self.display_height.max(32);
        if self.mixer_control.trim().is_empty() {
            self.mixer_control = default_mixer_control();
        }
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_hz.max(1)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn volume_overlay(&self) -> Duration {
        Duration::from_millis(self.volume_overlay_ms)
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("POCKET_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(config_root()?.join(LOG_FILE))
}

pub fn load_config() -> Result<PlayerConfig> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<PlayerConfig> {
    if !path.exists() {
        return Ok(PlayerConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: PlayerConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config.sanitized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("absent.json")).expect("load");
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(1) / 30);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "music_dir": "/media/music", "theme": "Purple" }"#).expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.music_dir, PathBuf::from("/media/music"));
        assert_eq!(config.theme, Theme::Purple);
        assert_eq!(config.debounce_ms, 200);
        assert_eq!(config.max_skip_attempts, 3);
    }

    #[test]
    fn out_of_range_values_are_sanitized() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{ "tick_hz": 0, "initial_volume": 4.0, "max_skip_attempts": 0, "display_width": 3 }"#,
        )
        .expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.tick_hz, 1);
        assert_eq!(config.initial_volume, 1.0);
        assert_eq!(config.max_skip_attempts, 1);
        assert_eq!(config.display_width, 32);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").expect("write");

        let err = load_config_from(&path).expect_err("malformed config should fail");
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }
}
