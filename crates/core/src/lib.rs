//! Core library for the metronome.
//!
//! A [`RateScheduler`] turns a tempo into timer ticks and beat/measure
//! positions, a key reader turns keypresses into [`TempoCommand`]s, and the
//! [`ControlLoop`] consumes both through one event queue and plays beats
//! from a [`BeatBank`]. Audio decoding and output sit behind the `audio`
//! and `speaker` modules.

pub mod audio;
pub mod bank;
pub mod config;
pub mod control;
pub mod error;
pub mod input;
pub mod scheduler;
pub mod speaker;
pub mod terminal;
pub mod timer;

pub use audio::{decode_wav, Playback, SampleFormat, Waveform};
pub use bank::{BeatBank, BeatSlot};
pub use config::{MetronomeConfig, SoundConfig, TempoConfig};
pub use control::{ControlLoop, Event};
pub use error::{MetronomeError, Result};
pub use input::{spawn_key_reader, RateKeys, TempoCommand};
pub use scheduler::{Beat, RateScheduler};
pub use speaker::Speaker;
pub use terminal::RawMode;
pub use timer::{beat_period, PeriodicTimer, Ticker};
