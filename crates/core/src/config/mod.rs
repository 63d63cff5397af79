use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MetronomeError, Result};

pub const DEFAULT_ACCENT_CLICK: &str = "clicks/Perc_Clap_lo.wav";
pub const DEFAULT_CLICK: &str = "clicks/Perc_Clap_hi.wav";
pub const DEFAULT_RATE_KEYS: &str = ", ";

/// Top-level configuration structure for the metronome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    pub tempo: TempoConfig,
    pub sounds: SoundConfig,
    /// First character decreases the tempo, second increases it.
    pub rate_keys: String,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            tempo: TempoConfig::default(),
            sounds: SoundConfig::default(),
            rate_keys: DEFAULT_RATE_KEYS.to_string(),
        }
    }
}

impl MetronomeConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.tempo.validate()?;
        self.sounds.validate()?;
        crate::RateKeys::parse(&self.rate_keys)?;
        Ok(())
    }
}

/// Tempo parameters. Only the scheduler's current rate changes at runtime;
/// this struct stays as constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub rate_bpm: u32,
    pub beats_per_measure: u32,
    /// Ramp the tempo every N measures; 0 disables ramping.
    pub ramp_every_measures: u32,
    pub rate_step_bpm: u32,
    pub min_rate_bpm: u32,
    pub max_rate_bpm: u32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            rate_bpm: 60,
            beats_per_measure: 4,
            ramp_every_measures: 0,
            rate_step_bpm: 10,
            min_rate_bpm: 20,
            max_rate_bpm: 200,
        }
    }
}

impl TempoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.beats_per_measure == 0 {
            return Err(MetronomeError::invalid_config(
                "beats per measure must be at least 1",
            ));
        }
        if self.rate_step_bpm == 0 {
            return Err(MetronomeError::invalid_config(
                "rate step must be greater than 0",
            ));
        }
        if self.min_rate_bpm == 0 {
            return Err(MetronomeError::invalid_config(
                "minimum rate must be at least 1 BPM",
            ));
        }
        if !self.contains(self.rate_bpm) {
            return Err(MetronomeError::invalid_config(format!(
                "rate {} BPM is outside [{}, {}]",
                self.rate_bpm, self.min_rate_bpm, self.max_rate_bpm
            )));
        }
        Ok(())
    }

    /// Whether `rate_bpm` lies within the configured bounds.
    pub fn contains(&self, rate_bpm: u32) -> bool {
        (self.min_rate_bpm..=self.max_rate_bpm).contains(&rate_bpm)
    }
}

/// Sources and load-time shaping for the beat sounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Played on the first beat of every measure.
    pub accent: PathBuf,
    /// Played on every other beat.
    pub regular: PathBuf,
    /// Playback speed-up applied when the clips are loaded.
    pub speed: f64,
    /// Logarithmic (base 2) volume delta.
    pub volume: f64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            accent: PathBuf::from(DEFAULT_ACCENT_CLICK),
            regular: PathBuf::from(DEFAULT_CLICK),
            speed: 4.0,
            volume: 0.0,
        }
    }
}

impl SoundConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(MetronomeError::invalid_config(format!(
                "playback speed {} must be a positive number",
                self.speed
            )));
        }
        if !self.volume.is_finite() {
            return Err(MetronomeError::invalid_config("volume must be finite"));
        }
        Ok(())
    }
}
