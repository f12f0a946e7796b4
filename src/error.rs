use std::fmt;

pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug)]
pub enum SynthError {
    /// The wavetable source is not mono at the engine sample rate.
    InvalidWaveFormat { channels: u16, sample_rate: u32 },
    /// The wavetable source is shorter than the minimum analysis length.
    SampleTooShort { samples: usize },
    /// The detected fundamental lies outside the supported analysis range.
    FundamentalOutOfRange { hz: f64 },
    /// A controller was mapped to a knob name the engine does not know.
    UnknownControl(String),
    /// A tuning mode string could not be understood.
    InvalidTuning(String),
    /// A note-on arrived for a key that is already held.
    DuplicateKey(u8),
    /// A key number outside `0..=127`.
    InvalidKey(u8),
    /// The command queue to the audio side is full.
    QueueFull,
    Wav(hound::Error),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::InvalidWaveFormat {
                channels,
                sample_rate,
            } => write!(
                f,
                "Wavetable source must be mono at {} Hz, got {channels} channel(s) at {sample_rate} Hz",
                crate::SAMPLE_RATE
            ),
            SynthError::SampleTooShort { samples } => {
                write!(f, "Wavetable source too short: {samples} samples")
            }
            SynthError::FundamentalOutOfRange { hz } => {
                write!(f, "Detected fundamental {hz:.1} Hz is out of range")
            }
            SynthError::UnknownControl(name) => write!(f, "Unknown control '{name}'"),
            SynthError::InvalidTuning(spec) => write!(f, "Invalid tuning '{spec}'"),
            SynthError::DuplicateKey(key) => write!(f, "Note-on for held key {key}"),
            SynthError::InvalidKey(key) => write!(f, "Key {key} out of range"),
            SynthError::QueueFull => write!(f, "Command queue full"),
            SynthError::Wav(e) => write!(f, "WAV decode error: {e}"),
        }
    }
}

impl std::error::Error for SynthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SynthError::Wav(e) => Some(e),
            _ => None,
        }
    }
}

impl From<hound::Error> for SynthError {
    fn from(e: hound::Error) -> Self {
        SynthError::Wav(e)
    }
}
