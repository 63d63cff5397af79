use std::path::PathBuf;
use std::sync::mpsc;

use clap::Parser;
use metronome_core::{
    spawn_key_reader, BeatBank, ControlLoop, MetronomeConfig, PeriodicTimer, Playback, RateKeys,
    RateScheduler, RawMode, Speaker,
};
use tracing_subscriber::EnvFilter;

fn main() -> metronome_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.into_config()?;
    config.validate()?;

    run(config)
}

fn run(config: MetronomeConfig) -> metronome_core::Result<()> {
    let keys = RateKeys::parse(&config.rate_keys)?;
    tracing::info!(tempo = ?config.tempo, ?keys, "starting metronome");

    let speaker = Speaker::open(config.tempo.rate_bpm)?;
    let bank = BeatBank::load(
        &config.sounds,
        config.tempo.beats_per_measure,
        speaker.format(),
    )?;

    let (events, queue) = mpsc::channel();

    // Declared before the control loop so the timer stops before the
    // terminal is restored.
    let _raw_mode = match RawMode::acquire_stdin() {
        Ok(raw_mode) => {
            spawn_key_reader(std::io::stdin(), keys, events.clone())?;
            Some(raw_mode)
        }
        Err(err) => {
            tracing::warn!(%err, "unable to make raw terminal, live tempo keys disabled");
            None
        }
    };

    let scheduler = RateScheduler::new(config.tempo, PeriodicTimer::new(events));
    let mut control = ControlLoop::new(scheduler, bank, speaker);
    control.run(&queue)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audible metronome with live tempo keys", long_about = None)]
struct Cli {
    /// Tempo in beats per minute [default: 60].
    #[arg(long)]
    rate: Option<u32>,
    /// Beats per measure [default: 4].
    #[arg(long)]
    tsig: Option<u32>,
    /// Raise the tempo every N measures, up to the maximum rate; 0 disables.
    #[arg(long)]
    mrate: Option<u32>,
    /// BPM added or removed by a ramp or a key press [default: 10].
    #[arg(long)]
    rate_step: Option<u32>,
    /// Lowest tempo reachable with the rate keys [default: 20].
    #[arg(long)]
    min_rate: Option<u32>,
    /// Highest tempo reachable with the rate keys or ramping [default: 200].
    #[arg(long)]
    max_rate: Option<u32>,
    /// Two keys: the first decreases the tempo, the second increases it
    /// [default: ", "].
    #[arg(long)]
    rate_keys: Option<String>,
    /// Logarithmic volume change, positive or negative.
    #[arg(long, allow_negative_numbers = true)]
    vol: Option<f64>,
    /// WAV file played on the first beat of each measure.
    #[arg(long)]
    accent_click: Option<PathBuf>,
    /// WAV file played on the remaining beats.
    #[arg(long)]
    click: Option<PathBuf>,
    /// JSON configuration file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> metronome_core::Result<MetronomeConfig> {
        let mut config = match &self.config {
            Some(path) => MetronomeConfig::from_json_file(path)?,
            None => MetronomeConfig::default(),
        };

        let tempo = &mut config.tempo;
        if let Some(rate) = self.rate {
            tempo.rate_bpm = rate;
        }
        if let Some(tsig) = self.tsig {
            tempo.beats_per_measure = tsig;
        }
        if let Some(mrate) = self.mrate {
            tempo.ramp_every_measures = mrate;
        }
        if let Some(step) = self.rate_step {
            tempo.rate_step_bpm = step;
        }
        if let Some(min) = self.min_rate {
            tempo.min_rate_bpm = min;
        }
        if let Some(max) = self.max_rate {
            tempo.max_rate_bpm = max;
        }

        let sounds = &mut config.sounds;
        if let Some(vol) = self.vol {
            sounds.volume = vol;
        }
        if let Some(path) = self.accent_click {
            sounds.accent = path;
        }
        if let Some(path) = self.click {
            sounds.regular = path;
        }

        if let Some(keys) = self.rate_keys {
            config.rate_keys = keys;
        }
        Ok(config)
    }
}
