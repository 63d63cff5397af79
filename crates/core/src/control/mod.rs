use std::io;
use std::sync::mpsc::Receiver;
use std::time::Instant;

use crate::{BeatBank, MetronomeError, Playback, RateScheduler, Result, TempoCommand, Ticker};

/// Everything the control loop reacts to.
#[derive(Debug)]
pub enum Event {
    /// The beat timer fired; carries the deadline it fired for.
    Tick(Instant),
    /// A tempo key was pressed.
    Tempo(TempoCommand),
    /// The keyboard stream broke; no more commands will arrive.
    InputFailed(io::Error),
}

/// Single consumer of the event queue. All scheduler state is owned and
/// mutated here, one event at a time.
#[derive(Debug)]
pub struct ControlLoop<T, P> {
    scheduler: RateScheduler<T>,
    bank: BeatBank,
    playback: P,
}

impl<T: Ticker, P: Playback> ControlLoop<T, P> {
    pub fn new(scheduler: RateScheduler<T>, bank: BeatBank, playback: P) -> Self {
        Self {
            scheduler,
            bank,
            playback,
        }
    }

    /// Arms the timer and handles events until every producer is gone or
    /// a fatal event arrives.
    pub fn run(&mut self, events: &Receiver<Event>) -> Result<()> {
        self.scheduler.start()?;
        while let Ok(event) = events.recv() {
            self.handle(event)?;
        }
        tracing::debug!("event queue closed");
        Ok(())
    }

    pub fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Tick(deadline) => self.on_tick(deadline),
            Event::Tempo(command) => {
                if self.scheduler.adjust_rate(command)? {
                    tracing::info!(
                        ?command,
                        rate_bpm = self.scheduler.current_rate_bpm(),
                        "tempo adjusted"
                    );
                }
                Ok(())
            }
            Event::InputFailed(err) => Err(MetronomeError::Input(err)),
        }
    }

    fn on_tick(&mut self, deadline: Instant) -> Result<()> {
        let beat = self.scheduler.on_tick()?;
        let slot = self.bank.slot(beat.index).ok_or_else(|| {
            MetronomeError::msg(format!("no sound loaded for beat {}", beat.index))
        })?;

        if let Err(err) = self.playback.play(slot.sound()) {
            tracing::warn!(%err, "unable to play beat");
        }
        tracing::info!(
            measure = beat.measure,
            beat = beat.index,
            late = ?deadline.elapsed(),
            "beat"
        );
        Ok(())
    }

    pub fn scheduler(&self) -> &RateScheduler<T> {
        &self.scheduler
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }
}
