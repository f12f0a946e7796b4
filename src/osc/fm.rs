use std::f64::consts::TAU;

use super::{phase, Modulation, Oscillator};

/// Two-operator FM: a sine carrier whose read position is pushed back and
/// forth by a sine modulator.
///
/// ```plaintext
/// m(t) = amod * depth * sin(2pi (f + fmod) t / rate)
/// s(t) = sin(2pi f (t + m(t)) / rate)
/// ```
#[derive(Debug, Clone)]
pub struct FmOscillator {
    /// Carrier frequency, in Hz.
    freq: f64,
    /// Modulator frequency, in Hz.
    mod_freq: f64,
    /// Peak time offset, in samples, at full depth.
    amod: f64,
}

impl FmOscillator {
    pub fn new(freq: f64, fmod: f64, amod: f64) -> Self {
        Self {
            freq,
            mod_freq: freq + fmod,
            amod,
        }
    }
}

impl Oscillator for FmOscillator {
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, modulation: &Modulation) {
        let amp = self.amod * modulation.depth as f64;
        for (i, sample) in buffer.iter_mut().enumerate() {
            let t = (t0 + i as u64) as f64;
            let m = amp * (TAU * phase(self.mod_freq, t)).sin();
            *sample = (TAU * phase(self.freq, t + m)).sin() as f32;
        }
    }
}
