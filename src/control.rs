//! Smoothed knobs driven by control-change events.

use std::str::FromStr;

use crate::error::{Result, SynthError};
use crate::SAMPLE_RATE;

/// Smoothing time constant, in seconds.
pub const SMOOTHING_TIME: f32 = 0.005;

/// Fraction of the remaining distance covered per sample since the last
/// update.
const SMOOTHING_RATE: f32 = 1.0 / (SMOOTHING_TIME * SAMPLE_RATE as f32);

/// Dynamic range of a [`Scale::Log`] knob: 60 dB.
const LOG_RANGE: f32 = 6.907_755; // ln(1000)

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Exponential response, for perceptual controls like volume.
    Log,
    Linear,
}

impl Scale {
    /// Map a raw knob position in `0..=1` to its effective value in `0..=1`.
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Scale::Log => ((x * LOG_RANGE).exp() - 1.0) / (LOG_RANGE.exp() - 1.0),
            Scale::Linear => x,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Knob {
    Volume,
    ModWheel,
}

const KNOB_COUNT: usize = 2;

impl Knob {
    pub const ALL: [Knob; KNOB_COUNT] = [Knob::Volume, Knob::ModWheel];

    pub fn name(self) -> &'static str {
        match self {
            Knob::Volume => "volume",
            Knob::ModWheel => "modwheel",
        }
    }

    fn scale(self) -> Scale {
        match self {
            Knob::Volume => Scale::Log,
            Knob::ModWheel => Scale::Linear,
        }
    }
}

impl FromStr for Knob {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        Knob::ALL
            .into_iter()
            .find(|knob| knob.name() == s)
            .ok_or_else(|| SynthError::UnknownControl(s.to_string()))
    }
}

/// One smoothed value. Times are in samples of the engine clock.
#[derive(Debug, Clone)]
pub struct Control {
    scale: Scale,
    target: f32,
    smoothed: f32,
    last_update: u64,
}

impl Control {
    pub fn new(scale: Scale, initial: f32) -> Self {
        let initial = initial.clamp(0.0, 1.0);
        Self {
            scale,
            target: initial,
            smoothed: initial,
            last_update: 0,
        }
    }

    /// Move the target. The smoothed value follows on later reads.
    pub fn set(&mut self, value: f32, now: u64) {
        self.target = value.clamp(0.0, 1.0);
        self.last_update = now;
    }

    /// Step the smoothed value toward the target and return it scaled.
    pub fn value(&mut self, now: u64) -> f32 {
        let elapsed = now.saturating_sub(self.last_update) as f32;
        let ds = (elapsed * SMOOTHING_RATE).min(1.0);
        self.smoothed = self.target * ds + self.smoothed * (1.0 - ds);
        self.scale.apply(self.smoothed)
    }
}

/// All knobs the engine reads.
#[derive(Debug, Clone)]
pub struct ControlBank {
    controls: [Control; KNOB_COUNT],
}

impl Default for ControlBank {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlBank {
    /// Volume starts fully up, the mod wheel starts at full depth so a
    /// configured FM amount is heard before the wheel is touched.
    pub fn new() -> Self {
        Self {
            controls: Knob::ALL.map(|knob| Control::new(knob.scale(), 1.0)),
        }
    }

    pub fn set(&mut self, knob: Knob, value: f32, now: u64) {
        self.controls[knob as usize].set(value, now);
    }

    pub fn value(&mut self, knob: Knob, now: u64) -> f32 {
        self.controls[knob as usize].value(now)
    }
}
