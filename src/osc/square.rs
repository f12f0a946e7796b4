use super::{phase, Modulation, Oscillator};

#[derive(Debug, Clone)]
pub struct SquareOscillator {
    freq: f64,
}

impl SquareOscillator {
    pub fn new(freq: f64) -> Self {
        Self { freq }
    }
}

impl Oscillator for SquareOscillator {
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, _modulation: &Modulation) {
        for (i, sample) in buffer.iter_mut().enumerate() {
            let t = (t0 + i as u64) as f64;
            *sample = if phase(self.freq, t) < 0.5 { 1.0 } else { -1.0 };
        }
    }
}
