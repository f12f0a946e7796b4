use std::f64::consts::TAU;

use super::{phase, Modulation, Oscillator};

#[derive(Debug, Clone)]
pub struct SineOscillator {
    freq: f64,
}

impl SineOscillator {
    pub fn new(freq: f64) -> Self {
        Self { freq }
    }
}

impl Oscillator for SineOscillator {
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, _modulation: &Modulation) {
        for (i, sample) in buffer.iter_mut().enumerate() {
            let t = (t0 + i as u64) as f64;
            *sample = (TAU * phase(self.freq, t)).sin() as f32;
        }
    }
}
