use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use crate::{MetronomeError, Result};

/// Layout of interleaved `f32` sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decoded, immutable sound. Cloning shares the sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Arc<[f32]>,
    format: SampleFormat,
}

/// Output side of the audio engine.
pub trait Playback {
    /// Format sounds must be conformed to before [`Playback::play`].
    fn format(&self) -> SampleFormat;

    /// Starts playing `sound` and returns without waiting for it to finish.
    fn play(&mut self, sound: &Waveform) -> Result<()>;
}

/// Decodes a WAV file into interleaved `f32` samples in `[-1, 1]`.
pub fn decode_wav(path: &Path) -> Result<Waveform> {
    let file = File::open(path).map_err(|source| MetronomeError::SoundFile {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_err = |source| MetronomeError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = hound::WavReader::new(BufReader::new(file)).map_err(decode_err)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect()
        }
    }
    .map_err(decode_err)?;

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        frames = samples.len() / usize::from(spec.channels.max(1)),
        "decoded sound"
    );

    Ok(Waveform::new(
        samples,
        SampleFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
    ))
}

impl Waveform {
    pub fn new(samples: Vec<f32>, format: SampleFormat) -> Self {
        Self {
            samples: samples.into(),
            format,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn shared_samples(&self) -> Arc<[f32]> {
        self.samples.clone()
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.format.channels.max(1))
    }

    /// Scales the sound by `2^delta`: +1 doubles the amplitude, -1 halves it.
    pub fn with_volume(self, delta: f64) -> Self {
        if delta == 0.0 {
            return self;
        }
        let gain = 2_f64.powf(delta) as f32;
        let samples: Vec<f32> = self.samples.iter().map(|sample| sample * gain).collect();
        Self::new(samples, self.format)
    }

    /// Resamples into `target` while playing `speed` times faster.
    ///
    /// Channels are averaged to mono, band-limited and resampled with a sinc
    /// resampler, then copied into every output channel.
    pub fn conform(&self, target: SampleFormat, speed: f64) -> Result<Self> {
        let channels = usize::from(self.format.channels.max(1));
        let mono: Vec<f32> = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        let ratio = f64::from(target.sample_rate) / (f64::from(self.format.sample_rate) * speed);
        let resampled = resample(mono, ratio)?;

        let out_channels = usize::from(target.channels.max(1));
        let samples = resampled
            .iter()
            .flat_map(|&value| std::iter::repeat(value).take(out_channels))
            .collect();
        Ok(Self::new(samples, target))
    }
}

/// Frames of silence appended so the filter tail of the last input frame
/// reaches the output.
const SINC_LEN: usize = 256;

fn resample(mut mono: Vec<f32>, ratio: f64) -> Result<Vec<f32>> {
    if mono.is_empty() || ratio == 1.0 {
        return Ok(mono);
    }

    let frames = mono.len();
    let expected = (frames as f64 * ratio).ceil() as usize;
    mono.resize(frames + SINC_LEN, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        1.0,
        SincInterpolationParameters {
            sinc_len: SINC_LEN,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::Blackman,
        },
        mono.len(),
        1,
    )?;
    let delay = resampler.output_delay();
    let output = resampler.process(&[mono], None)?;

    Ok(output[0].iter().skip(delay).take(expected).copied().collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use super::*;

    pub(crate) fn write_wav(name: &str, spec: hound::WavSpec, samples: &[i16]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("metronome-{}-{name}.wav", std::process::id()));
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for sample in samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    pub(crate) fn pcm16(sample_rate: u32, channels: u16) -> hound::WavSpec {
        hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn decodes_integer_pcm_to_unit_range() {
        let path = write_wav("pcm", pcm16(8_000, 2), &[i16::MAX, 0, -16_384, 16_384]);
        let wave = decode_wav(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            wave.format(),
            SampleFormat {
                sample_rate: 8_000,
                channels: 2
            }
        );
        assert_eq!(wave.frames(), 2);
        assert!((wave.samples()[0] - 1.0).abs() < 1e-4);
        assert_eq!(wave.samples()[2], -0.5);
        assert_eq!(wave.samples()[3], 0.5);
    }

    #[test]
    fn missing_file_is_a_sound_file_error() {
        let err = decode_wav(Path::new("/nonexistent/click.wav")).unwrap_err();
        assert!(matches!(err, MetronomeError::SoundFile { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let path = std::env::temp_dir().join(format!("metronome-{}-garbage.wav", std::process::id()));
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        let err = decode_wav(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, MetronomeError::Decode { .. }));
    }

    #[test]
    fn volume_is_logarithmic() {
        let format = SampleFormat {
            sample_rate: 100,
            channels: 1,
        };
        let wave = Waveform::new(vec![0.25, -0.5], format);
        assert_eq!(wave.clone().with_volume(1.0).samples(), &[0.5, -1.0]);
        assert_eq!(wave.clone().with_volume(-2.0).samples(), &[0.0625, -0.125]);
        assert_eq!(wave.with_volume(0.0).samples(), &[0.25, -0.5]);
    }

    fn sine(frames: usize, cycles_per_frame: f64) -> Vec<f32> {
        (0..frames)
            .map(|n| (2.0 * std::f64::consts::PI * cycles_per_frame * n as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn conform_speeds_up_and_spreads_channels() {
        let format = SampleFormat {
            sample_rate: 1_000,
            channels: 1,
        };
        let target = SampleFormat {
            sample_rate: 1_000,
            channels: 2,
        };
        let source = Waveform::new(sine(800, 0.0025), format);

        let fast = source.conform(target, 4.0).unwrap();
        assert_eq!(fast.format(), target);
        assert_eq!(fast.frames(), 200);
        for frame in fast.samples().chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        // A slow sine played 4x faster lands on every 4th input frame.
        for (n, frame) in fast.samples().chunks_exact(2).enumerate().skip(40).take(120) {
            let expected = source.samples()[n * 4];
            assert!((frame[0] - expected).abs() < 0.05, "frame {n}");
        }
    }

    #[test]
    fn conform_filters_content_above_the_new_nyquist() {
        let format = SampleFormat {
            sample_rate: 1_000,
            channels: 1,
        };
        // Alternating samples: plain decimation by 4 would turn this into DC.
        let alternating: Vec<f32> = (0..800)
            .map(|n| if n % 2 == 0 { 0.8 } else { -0.8 })
            .collect();
        let source = Waveform::new(alternating, format);

        let fast = source.conform(format, 4.0).unwrap();
        assert_eq!(fast.frames(), 200);
        let peak = fast.samples()[40..160]
            .iter()
            .fold(0.0_f32, |peak, sample| peak.max(sample.abs()));
        assert!(peak < 0.05, "aliased peak {peak}");
    }

    #[test]
    fn conform_without_rate_change_copies_samples() {
        let format = SampleFormat {
            sample_rate: 100,
            channels: 2,
        };
        let source = Waveform::new(vec![0.0, 1.0, 0.5, 0.5], format);
        let target = SampleFormat {
            sample_rate: 100,
            channels: 1,
        };

        let same = source.conform(target, 1.0).unwrap();
        assert_eq!(same.samples(), &[0.5, 0.5]);
    }

    #[test]
    fn conform_upsampling_doubles_length() {
        let source = Waveform::new(
            sine(300, 0.01),
            SampleFormat {
                sample_rate: 100,
                channels: 1,
            },
        );
        let target = SampleFormat {
            sample_rate: 200,
            channels: 1,
        };

        let up = source.conform(target, 1.0).unwrap();
        assert_eq!(up.frames(), 600);
        for n in (100..500).step_by(2) {
            assert!((up.samples()[n] - source.samples()[n / 2]).abs() < 0.05, "frame {n}");
        }
    }
}
