use std::collections::HashMap;
use std::path::Path;

use crate::{decode_wav, MetronomeError, Result, SampleFormat, SoundConfig, Waveform};

/// Sound assigned to one position of the measure.
#[derive(Debug, Clone)]
pub struct BeatSlot {
    position: u32,
    sound: Waveform,
}

impl BeatSlot {
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn sound(&self) -> &Waveform {
        &self.sound
    }
}

/// Ready-to-play beat sounds, one per position in the measure. Built once
/// before the control loop starts and read-only afterwards.
#[derive(Debug, Clone)]
pub struct BeatBank {
    slots: Vec<BeatSlot>,
}

impl BeatBank {
    /// Decodes the configured sounds and shapes them for `output`.
    ///
    /// Each distinct file is decoded once even when several positions use it.
    pub fn load(sounds: &SoundConfig, beats_per_measure: u32, output: SampleFormat) -> Result<Self> {
        let mut decoded: HashMap<&Path, Waveform> = HashMap::new();
        for path in [sounds.accent.as_path(), sounds.regular.as_path()] {
            if decoded.contains_key(path) {
                continue;
            }
            let wave = decode_wav(path)?
                .with_volume(sounds.volume)
                .conform(output, sounds.speed)?;
            tracing::info!(path = %path.display(), frames = wave.frames(), "loaded beat sound");
            decoded.insert(path, wave);
        }

        let accent = decoded[sounds.accent.as_path()].clone();
        let regular = decoded[sounds.regular.as_path()].clone();
        Self::from_sounds(accent, regular, beats_per_measure)
    }

    /// Builds a bank playing `accent` on position 0 and `regular` elsewhere.
    pub fn from_sounds(accent: Waveform, regular: Waveform, beats_per_measure: u32) -> Result<Self> {
        if beats_per_measure == 0 {
            return Err(MetronomeError::invalid_config(
                "beats per measure must be at least 1",
            ));
        }

        let slots = (0..beats_per_measure)
            .map(|position| BeatSlot {
                position,
                sound: if position == 0 {
                    accent.clone()
                } else {
                    regular.clone()
                },
            })
            .collect();
        Ok(Self { slots })
    }

    pub fn slot(&self, position: u32) -> Option<&BeatSlot> {
        self.slots.get(position as usize)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
