//! Oscillators. Every oscillator is a pure function of the sample time, so a
//! voice only has to remember where it is in time.

pub mod fm;
pub mod saw;
pub mod sine;
pub mod square;
pub mod triangle;
pub mod wavetable;

use std::sync::Arc;

use crate::wavetable::Wavetable;
use crate::SAMPLE_RATE;

use self::{
    fm::FmOscillator, saw::SawOscillator, sine::SineOscillator, square::SquareOscillator,
    triangle::TriangleOscillator, wavetable::WavetableOscillator,
};

/// Externally driven modulation, sampled once per block.
#[derive(Debug, Clone, Copy)]
pub struct Modulation {
    /// FM depth, usually the smoothed mod wheel position in `0..=1`.
    pub depth: f32,
}

impl Default for Modulation {
    fn default() -> Self {
        Self { depth: 1.0 }
    }
}

pub trait Oscillator {
    /// Fill the buffer with consecutive samples, the first one at sample time
    /// `t0`.
    ///
    /// The oscillator **overwrites** the buffer. All samples are in `-1..=1`.
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, modulation: &Modulation);
}

/// Fractional position within one cycle of `freq` at sample time `t`.
#[inline]
pub(crate) fn phase(freq: f64, t: f64) -> f64 {
    (freq * t / SAMPLE_RATE as f64).fract()
}

/// Which oscillator new voices get.
#[derive(Debug, Clone)]
pub enum GeneratorKind {
    Sine,
    Saw,
    Square,
    Triangle,
    /// `fmod` is added to the carrier frequency to get the modulator
    /// frequency, in Hz. `amod` is the peak modulation, in samples of time
    /// offset.
    Fm { fmod: f64, amod: f64 },
    Wavetable(Arc<Wavetable>),
}

impl GeneratorKind {
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorKind::Sine => "sine",
            GeneratorKind::Saw => "saw",
            GeneratorKind::Square => "square",
            GeneratorKind::Triangle => "triangle",
            GeneratorKind::Fm { .. } => "fm",
            GeneratorKind::Wavetable(_) => "wavetable",
        }
    }

    /// Build a generator for a note of frequency `freq`.
    pub fn instantiate(&self, freq: f64) -> Generator {
        match self {
            GeneratorKind::Sine => Generator::Sine(SineOscillator::new(freq)),
            GeneratorKind::Saw => Generator::Saw(SawOscillator::new(freq)),
            GeneratorKind::Square => Generator::Square(SquareOscillator::new(freq)),
            GeneratorKind::Triangle => Generator::Triangle(TriangleOscillator::new(freq)),
            GeneratorKind::Fm { fmod, amod } => {
                Generator::Fm(FmOscillator::new(freq, *fmod, *amod))
            }
            GeneratorKind::Wavetable(table) => {
                Generator::Wavetable(WavetableOscillator::new(freq, Arc::clone(table)))
            }
        }
    }
}

/// The closed set of oscillators a voice can own.
#[derive(Debug, Clone)]
pub enum Generator {
    Sine(SineOscillator),
    Saw(SawOscillator),
    Square(SquareOscillator),
    Triangle(TriangleOscillator),
    Fm(FmOscillator),
    Wavetable(WavetableOscillator),
}

impl Oscillator for Generator {
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, modulation: &Modulation) {
        match self {
            Generator::Sine(osc) => osc.fill_samples(buffer, t0, modulation),
            Generator::Saw(osc) => osc.fill_samples(buffer, t0, modulation),
            Generator::Square(osc) => osc.fill_samples(buffer, t0, modulation),
            Generator::Triangle(osc) => osc.fill_samples(buffer, t0, modulation),
            Generator::Fm(osc) => osc.fill_samples(buffer, t0, modulation),
            Generator::Wavetable(osc) => osc.fill_samples(buffer, t0, modulation),
        }
    }
}
