use std::io::{self, Read};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use crate::{Event, MetronomeError, Result};

/// Live tempo nudge requested from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoCommand {
    Increase,
    Decrease,
}

/// The two trigger bytes recognised by the key reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateKeys {
    pub decrease: u8,
    pub increase: u8,
}

impl RateKeys {
    /// Parses a key string: the first character decreases the tempo, the
    /// second increases it. Anything after the second character is ignored.
    pub fn parse(keys: &str) -> Result<Self> {
        let mut chars = keys.chars();
        let (Some(decrease), Some(increase)) = (chars.next(), chars.next()) else {
            return Err(MetronomeError::invalid_config(format!(
                "rate keys `{keys}` must contain two characters"
            )));
        };
        if !decrease.is_ascii() || !increase.is_ascii() {
            return Err(MetronomeError::invalid_config(format!(
                "rate keys `{keys}` must be single-byte characters"
            )));
        }

        Ok(Self {
            decrease: decrease as u8,
            increase: increase as u8,
        })
    }

    pub fn decode(&self, byte: u8) -> Option<TempoCommand> {
        if byte == self.decrease {
            Some(TempoCommand::Decrease)
        } else if byte == self.increase {
            Some(TempoCommand::Increase)
        } else {
            None
        }
    }
}

/// Spawns the thread that turns keypresses read from `input` into
/// [`Event::Tempo`] events.
///
/// Unrecognised bytes are logged and skipped. A read failure (end of input
/// included) is forwarded once as [`Event::InputFailed`] and ends the thread.
pub fn spawn_key_reader<R>(
    mut input: R,
    keys: RateKeys,
    events: Sender<Event>,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("rate-keys".into())
        .spawn(move || {
            let mut byte = [0u8; 1];
            loop {
                let failure = match input.read(&mut byte) {
                    Ok(0) => io::Error::new(io::ErrorKind::UnexpectedEof, "keyboard input closed"),
                    Ok(_) => {
                        let key = byte[0];
                        tracing::debug!(key, "read keypress");
                        match keys.decode(key) {
                            Some(command) => {
                                if events.send(Event::Tempo(command)).is_err() {
                                    return;
                                }
                            }
                            None => tracing::info!(key, "unhandled keypress"),
                        }
                        continue;
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => err,
                };

                let _ = events.send(Event::InputFailed(failure));
                return;
            }
        })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn parses_first_two_characters() {
        let keys = RateKeys::parse("-=x").unwrap();
        assert_eq!(keys.decrease, b'-');
        assert_eq!(keys.increase, b'=');
        assert_eq!(keys.decode(b'-'), Some(TempoCommand::Decrease));
        assert_eq!(keys.decode(b'='), Some(TempoCommand::Increase));
        assert_eq!(keys.decode(b'x'), None);
    }

    #[test]
    fn rejects_short_or_multibyte_keys() {
        assert!(RateKeys::parse("").is_err());
        assert!(RateKeys::parse("1").is_err());
        assert!(RateKeys::parse("é1").is_err());
    }

    #[test]
    fn forwards_commands_in_order_and_fails_at_eof() {
        let (tx, rx) = mpsc::channel();
        let keys = RateKeys::parse(", ").unwrap();
        let reader = spawn_key_reader(Cursor::new(b",q , ".to_vec()), keys, tx).unwrap();
        reader.join().unwrap();

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], Event::Tempo(TempoCommand::Decrease)));
        assert!(matches!(events[1], Event::Tempo(TempoCommand::Increase)));
        assert!(matches!(events[2], Event::Tempo(TempoCommand::Decrease)));
        assert!(matches!(events[3], Event::Tempo(TempoCommand::Increase)));
        match &events[4] {
            Event::InputFailed(err) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected event {other:?}"),
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn read_error_is_reported_once() {
        let (tx, rx) = mpsc::channel();
        let keys = RateKeys::parse("12").unwrap();
        spawn_key_reader(FailingReader, keys, tx)
            .unwrap()
            .join()
            .unwrap();

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(
            matches!(&events[0], Event::InputFailed(err) if err.kind() == io::ErrorKind::BrokenPipe)
        );
    }
}
