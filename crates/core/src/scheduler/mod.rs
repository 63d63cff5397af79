use std::time::Duration;

use crate::{beat_period, Result, TempoCommand, TempoConfig, Ticker};

/// Position of a beat that is due to be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    /// 1-based measure the beat belongs to.
    pub measure: u64,
    /// Position within the measure, in `[0, beats_per_measure)`.
    pub index: u32,
}

/// Tempo state machine: owns the timer, the current rate and the
/// beat/measure counters.
///
/// The counters live here rather than in the timer so that replacing the
/// timer on a tempo change never disturbs them.
#[derive(Debug)]
pub struct RateScheduler<T> {
    config: TempoConfig,
    current_rate_bpm: u32,
    beat_index: u32,
    measure: u64,
    period: Duration,
    timer: T,
}

impl<T: Ticker> RateScheduler<T> {
    /// Creates a scheduler positioned at beat 0 of measure 1. The timer is
    /// not armed until [`RateScheduler::start`].
    pub fn new(config: TempoConfig, timer: T) -> Self {
        Self {
            current_rate_bpm: config.rate_bpm,
            beat_index: 0,
            measure: 1,
            period: beat_period(config.rate_bpm),
            config,
            timer,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.reconfigure(self.current_rate_bpm)
    }

    /// Replaces the running timer with one firing at `rate_bpm`.
    ///
    /// The old timer is fully stopped before the new one is armed. Beat and
    /// measure counters are untouched.
    pub fn reconfigure(&mut self, rate_bpm: u32) -> Result<()> {
        self.timer.disarm();
        self.current_rate_bpm = rate_bpm;
        self.period = beat_period(rate_bpm);
        tracing::info!(rate_bpm, period = ?self.period, "tempo set");
        self.timer.arm(self.period)
    }

    /// Returns the beat to play for this tick, then advances the counters.
    ///
    /// Crossing into a new measure may ramp the tempo; the new rate only
    /// affects the interval after this tick.
    pub fn on_tick(&mut self) -> Result<Beat> {
        let beat = Beat {
            measure: self.measure,
            index: self.beat_index,
        };

        self.beat_index += 1;
        if self.beat_index == self.config.beats_per_measure {
            self.beat_index = 0;
            self.measure += 1;
            self.maybe_ramp()?;
        }

        Ok(beat)
    }

    /// Applies a live tempo nudge. Returns `false` when the new rate would
    /// leave the configured bounds, in which case nothing changes.
    pub fn adjust_rate(&mut self, command: TempoCommand) -> Result<bool> {
        let step = self.config.rate_step_bpm;
        let candidate = match command {
            TempoCommand::Increase => self.current_rate_bpm.checked_add(step),
            TempoCommand::Decrease => self.current_rate_bpm.checked_sub(step),
        };

        match candidate {
            Some(rate) if self.config.contains(rate) => {
                self.reconfigure(rate)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn maybe_ramp(&mut self) -> Result<()> {
        let every = u64::from(self.config.ramp_every_measures);
        if every == 0 || (self.measure + 1) % every != 0 {
            return Ok(());
        }
        if self.current_rate_bpm >= self.config.max_rate_bpm {
            return Ok(());
        }

        let Some(rate) = self
            .current_rate_bpm
            .checked_add(self.config.rate_step_bpm)
            .filter(|rate| self.config.contains(*rate))
        else {
            return Ok(());
        };
        tracing::info!(measure = self.measure, rate_bpm = rate, "ramping tempo");
        self.reconfigure(rate)
    }

    pub fn current_rate_bpm(&self) -> u32 {
        self.current_rate_bpm
    }

    pub fn beat_index(&self) -> u32 {
        self.beat_index
    }

    pub fn measure(&self) -> u64 {
        self.measure
    }

    /// Interval of the currently armed timer.
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}
