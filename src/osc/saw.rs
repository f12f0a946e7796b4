use super::{phase, Modulation, Oscillator};

#[derive(Debug, Clone)]
pub struct SawOscillator {
    freq: f64,
}

impl SawOscillator {
    pub fn new(freq: f64) -> Self {
        Self { freq }
    }
}

/// Centered sawtooth: zero at `t = 0`, rising to 1 and wrapping to -1 half a
/// cycle later.
#[inline]
pub(crate) fn saw(freq: f64, t: f64) -> f64 {
    2.0 * (phase(freq, t) + 0.5).fract() - 1.0
}

impl Oscillator for SawOscillator {
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, _modulation: &Modulation) {
        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample = saw(self.freq, (t0 + i as u64) as f64) as f32;
        }
    }
}
