use std::sync::Arc;

use cpal::traits::{DeviceTrait as _, HostTrait as _, StreamTrait as _};
use cpal::{BufferSize, FromSample, SizedSample, Stream, StreamConfig, SupportedBufferSize};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::{beat_period, MetronomeError, Playback, Result, SampleFormat, Waveform};

/// Sounds that may be queued between two callbacks.
const QUEUE_CAPACITY: usize = 16;
/// Sounds that may overlap in the mix.
const MAX_VOICES: usize = 16;

/// Default-device output. Sounds reach the stream callback through a
/// lock-free ring buffer and are mixed there, so `play` never waits on the
/// device.
pub struct Speaker {
    // Output stops when the stream is dropped.
    _stream: Stream,
    format: SampleFormat,
    queue: Producer<Arc<[f32]>>,
}

impl Speaker {
    /// Opens the default output device, asking for a callback buffer sized
    /// from the starting tempo. Falls back to the device's own buffer size
    /// if it rejects that request.
    pub fn open(rate_bpm: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(MetronomeError::NoOutputDevice)?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let buffer_size =
            buffer_size_for(supported.buffer_size(), supported.sample_rate().0, rate_bpm);
        let mut config: StreamConfig = supported.into();
        config.buffer_size = buffer_size;

        tracing::info!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            ?sample_format,
            buffer_size = ?config.buffer_size,
            "opening audio output"
        );

        let (stream, queue) = match open_stream(&device, &config, sample_format) {
            Err(MetronomeError::BuildStream(err)) if matches!(config.buffer_size, BufferSize::Fixed(_)) => {
                tracing::warn!(%err, "buffer size rejected, using the device default");
                config.buffer_size = BufferSize::Default;
                open_stream(&device, &config, sample_format)?
            }
            opened => opened?,
        };
        stream.play()?;

        Ok(Self {
            _stream: stream,
            format: SampleFormat {
                sample_rate: config.sample_rate.0,
                channels: config.channels,
            },
            queue,
        })
    }
}

/// Callback buffers per beat. A click can start late by up to one buffer.
const BUFFERS_PER_BEAT: f64 = 64.0;

fn buffer_size_for(
    supported: &SupportedBufferSize,
    sample_rate: u32,
    rate_bpm: u32,
) -> BufferSize {
    match *supported {
        SupportedBufferSize::Range { min, max } => {
            let beat_frames = beat_period(rate_bpm).as_secs_f64() * f64::from(sample_rate);
            let frames = (beat_frames / BUFFERS_PER_BEAT).round() as u32;
            BufferSize::Fixed(frames.max(min).min(max))
        }
        SupportedBufferSize::Unknown => BufferSize::Default,
    }
}

fn open_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: cpal::SampleFormat,
) -> Result<(Stream, Producer<Arc<[f32]>>)> {
    let (queue, incoming) = RingBuffer::new(QUEUE_CAPACITY);
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, incoming)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, incoming)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, incoming)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, incoming)?,
        other => return Err(MetronomeError::UnsupportedSampleFormat(format!("{other:?}"))),
    };
    Ok((stream, queue))
}

impl Playback for Speaker {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn play(&mut self, sound: &Waveform) -> Result<()> {
        if self.queue.push(sound.shared_samples()).is_err() {
            tracing::warn!("audio queue is full, dropping click");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Speaker")
            .field("format", &self.format)
            .finish()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut incoming: Consumer<Arc<[f32]>>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut mixer = Mixer::default();
    let stream = device.build_output_stream(
        config,
        move |buf: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(sound) = incoming.pop() {
                mixer.start(sound);
            }
            mixer.fill(buf);
        },
        |err| tracing::error!(%err, "audio output stream error"),
        None,
    )?;
    Ok(stream)
}

struct Voice {
    samples: Arc<[f32]>,
    cursor: usize,
}

/// Sums every sound still playing into the output buffer.
#[derive(Default)]
struct Mixer {
    voices: Vec<Voice>,
}

impl Mixer {
    fn start(&mut self, samples: Arc<[f32]>) {
        if self.voices.len() == MAX_VOICES {
            self.voices.remove(0);
        }
        self.voices.push(Voice { samples, cursor: 0 });
    }

    fn fill<T>(&mut self, buf: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        for (offset, out) in buf.iter_mut().enumerate() {
            let mixed: f32 = self
                .voices
                .iter()
                .filter_map(|voice| voice.samples.get(voice.cursor + offset))
                .sum();
            *out = T::from_sample(mixed.clamp(-1.0, 1.0));
        }

        for voice in &mut self.voices {
            voice.cursor += buf.len();
        }
        self.voices.retain(|voice| voice.cursor < voice.samples.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixes_overlapping_voices() {
        let mut mixer = Mixer::default();
        mixer.start(Arc::from(vec![0.25_f32; 3]));
        mixer.start(Arc::from(vec![0.5_f32; 5]));

        let mut buf = [0.0_f32; 4];
        mixer.fill(&mut buf);
        assert_eq!(buf, [0.75, 0.75, 0.75, 0.5]);
        assert_eq!(mixer.voices.len(), 1);

        mixer.fill(&mut buf);
        assert_eq!(buf, [0.5, 0.0, 0.0, 0.0]);
        assert!(mixer.voices.is_empty());
    }

    #[test]
    fn clamps_and_converts_samples() {
        let mut mixer = Mixer::default();
        mixer.start(Arc::from(vec![0.9_f32; 2]));
        mixer.start(Arc::from(vec![0.9_f32; 2]));

        let mut buf = [0_i16; 2];
        mixer.fill(&mut buf);
        assert_eq!(buf, [i16::MAX, i16::MAX]);
    }

    #[test]
    fn oldest_voice_is_dropped_when_full() {
        let mut mixer = Mixer::default();
        for _ in 0..MAX_VOICES + 2 {
            mixer.start(Arc::from(vec![0.0_f32; 8]));
        }
        assert_eq!(mixer.voices.len(), MAX_VOICES);
    }

    #[test]
    fn buffer_follows_tempo_within_device_limits() {
        let range = SupportedBufferSize::Range { min: 64, max: 1024 };
        // 48 kHz at 60 BPM is 48000 frames per beat.
        assert!(matches!(buffer_size_for(&range, 48_000, 60), BufferSize::Fixed(750)));
        assert!(matches!(buffer_size_for(&range, 48_000, 200), BufferSize::Fixed(225)));
        assert!(matches!(buffer_size_for(&range, 48_000, 20), BufferSize::Fixed(1024)));
        assert!(matches!(buffer_size_for(&range, 8_000, 600), BufferSize::Fixed(64)));
    }

    #[test]
    fn unknown_buffer_range_uses_device_default() {
        assert!(matches!(
            buffer_size_for(&SupportedBufferSize::Unknown, 48_000, 60),
            BufferSize::Default
        ));
    }
}
