use std::path::PathBuf;

/// Result alias that carries the custom [`MetronomeError`] type.
pub type Result<T> = std::result::Result<T, MetronomeError>;

/// Common error type for the core crate.
///
/// Everything except [`MetronomeError::Input`] is a setup error raised before
/// the control loop starts.
#[derive(Debug, thiserror::Error)]
pub enum MetronomeError {
    /// Free-form message for internal invariant failures.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A flag or configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    ConfigFile(#[from] serde_json::Error),
    /// A beat sound could not be opened.
    #[error("unable to open sound `{}`: {source}", .path.display())]
    SoundFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A beat sound could not be decoded as WAV.
    #[error("unable to decode sound `{}`: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("no audio output device is available")]
    NoOutputDevice,
    #[error("audio output sample format {0} is not supported")]
    UnsupportedSampleFormat(String),
    #[error("unable to query audio output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("unable to build audio output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("unable to start audio output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("unable to build resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),
    #[error("unable to resample sound: {0}")]
    Resample(#[from] rubato::ResampleError),
    /// Reading the keyboard failed after raw mode was entered.
    #[error("keyboard input failed: {0}")]
    Input(#[source] std::io::Error),
}

impl MetronomeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
