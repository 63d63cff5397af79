use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{Event, Result};

/// Converts a tempo into the interval between beats.
///
/// Computed in floating point as `1 / (bpm / 60)` seconds so high tempos are
/// not rounded to whole milliseconds.
pub fn beat_period(rate_bpm: u32) -> Duration {
    let beats_per_second = f64::from(rate_bpm) / 60.0;
    Duration::from_secs_f64(1.0 / beats_per_second)
}

/// Something that can fire ticks at a fixed period.
pub trait Ticker {
    /// Starts firing every `period`, replacing any running timer.
    fn arm(&mut self, period: Duration) -> Result<()>;

    /// Stops firing. Returns only once no further tick can be produced.
    fn disarm(&mut self);
}

/// Thread-backed [`Ticker`] feeding the control loop's event queue.
///
/// Knows nothing about beats or measures: it only enqueues [`Event::Tick`]
/// at a fixed period until disarmed.
#[derive(Debug)]
pub struct PeriodicTimer {
    events: Sender<Event>,
    active: Option<ArmedTimer>,
}

#[derive(Debug)]
struct ArmedTimer {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl PeriodicTimer {
    pub fn new(events: Sender<Event>) -> Self {
        Self {
            events,
            active: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.active.is_some()
    }
}

impl Ticker for PeriodicTimer {
    fn arm(&mut self, period: Duration) -> Result<()> {
        self.disarm();

        let (stop, stopped) = mpsc::channel();
        let events = self.events.clone();
        let thread = thread::Builder::new()
            .name("beat-timer".into())
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match stopped.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            if events.send(Event::Tick(deadline)).is_err() {
                                break;
                            }
                            deadline += period;
                            // Drop ticks the consumer could not keep up with.
                            let now = Instant::now();
                            if deadline <= now {
                                deadline = now + period;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        self.active = Some(ArmedTimer { stop, thread });
        Ok(())
    }

    fn disarm(&mut self) {
        if let Some(armed) = self.active.take() {
            let _ = armed.stop.send(());
            if armed.thread.join().is_err() {
                tracing::warn!("beat timer thread panicked");
            }
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_matches_tempo() {
        for rate in [20, 60, 97, 120, 133, 200] {
            let expected = 60.0 / f64::from(rate);
            assert!((beat_period(rate).as_secs_f64() - expected).abs() < 1e-9);
        }
        assert_eq!(beat_period(120), Duration::from_millis(500));
    }

    #[test]
    fn high_tempo_keeps_sub_millisecond_precision() {
        let period = beat_period(190);
        assert!(period.subsec_nanos() % 1_000_000 != 0);
    }

    #[test]
    fn fires_ticks_until_disarmed() {
        let (tx, rx) = mpsc::channel();
        let mut timer = PeriodicTimer::new(tx);
        timer.arm(Duration::from_millis(5)).unwrap();

        for _ in 0..3 {
            let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert!(matches!(event, Event::Tick(_)));
        }

        timer.disarm();
        assert!(!timer.is_armed());
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(30)).is_err());
    }

    #[test]
    fn rearming_replaces_the_running_timer() {
        let (tx, rx) = mpsc::channel();
        let mut timer = PeriodicTimer::new(tx);
        timer.arm(Duration::from_secs(60)).unwrap();
        timer.arm(Duration::from_millis(5)).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, Event::Tick(_)));
    }
}
