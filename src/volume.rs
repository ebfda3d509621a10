use anyhow::{Context, Result};
use std::process::Command;

/// System-level output volume, outside the audio engine.
pub trait VolumeSink {
    fn set_volume_percent(&mut self, percent: u8) -> Result<()>;
}

pub fn volume_to_percent(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Drives an ALSA mixer control through `amixer`.
#[derive(Debug, Clone)]
pub struct AmixerVolumeSink {
    control: String,
}

impl AmixerVolumeSink {
    pub fn new(control: impl Into<String>) -> Self {
        Self {
            control: control.into(),
        }
    }
}

impl VolumeSink for AmixerVolumeSink {
    fn set_volume_percent(&mut self, percent: u8) -> Result<()> {
        let percent = percent.min(100);
        let output = Command::new("amixer")
            .args(["set", &self.control, &format!("{percent}%")])
            .output()
            .context("failed to run amixer (is alsa-utils installed?)")?;
        if !output.status.success() {
            anyhow::bail!(
                "amixer set {} {percent}% failed: {}",
                self.control,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Remembers the last request without touching the system.
#[derive(Debug, Default, Clone)]
pub struct NullVolumeSink {
    pub last_percent: Option<u8>,
}

impl VolumeSink for NullVolumeSink {
    fn set_volume_percent(&mut self, percent: u8) -> Result<()> {
        self.last_percent = Some(percent.min(100));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_conversion_rounds_and_clamps() {
        assert_eq!(volume_to_percent(0.5), 50);
        assert_eq!(volume_to_percent(0.556), 56);
        assert_eq!(volume_to_percent(-1.0), 0);
        assert_eq!(volume_to_percent(3.0), 100);
    }

    #[test]
    fn null_sink_records_last_value() {
        let mut sink = NullVolumeSink::default();
        sink.set_volume_percent(140).expect("set");
        assert_eq!(sink.last_percent, Some(100));
    }
}
