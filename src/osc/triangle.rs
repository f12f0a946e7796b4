use super::{saw::saw, Modulation, Oscillator};

#[derive(Debug, Clone)]
pub struct TriangleOscillator {
    freq: f64,
}

impl TriangleOscillator {
    pub fn new(freq: f64) -> Self {
        Self { freq }
    }
}

impl Oscillator for TriangleOscillator {
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, _modulation: &Modulation) {
        for (i, sample) in buffer.iter_mut().enumerate() {
            // Fold the saw around zero.
            let s = saw(self.freq, (t0 + i as u64) as f64);
            *sample = (2.0 * s.abs() - 1.0) as f32;
        }
    }
}
