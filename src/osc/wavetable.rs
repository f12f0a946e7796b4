use std::sync::Arc;

use super::{Modulation, Oscillator};
use crate::wavetable::Wavetable;

/// Plays a shared wavetable back at a different pitch by stepping through it
/// at `freq / fundamental` samples per output sample.
#[derive(Debug, Clone)]
pub struct WavetableOscillator {
    ratio: f64,
    table: Arc<Wavetable>,
}

impl WavetableOscillator {
    pub fn new(freq: f64, table: Arc<Wavetable>) -> Self {
        Self {
            ratio: freq / table.fundamental(),
            table,
        }
    }
}

impl Oscillator for WavetableOscillator {
    fn fill_samples(&self, buffer: &mut [f32], t0: u64, _modulation: &Modulation) {
        let samples = self.table.samples();
        let len = samples.len();
        if len == 0 {
            buffer.fill(0.0);
            return;
        }
        for (i, sample) in buffer.iter_mut().enumerate() {
            let pos = (self.ratio * (t0 + i as u64) as f64) % len as f64;
            let ix = pos as usize % len;
            let frac = (pos - pos.floor()) as f32;
            let a = samples[ix];
            let b = samples[(ix + 1) % len];
            *sample = a + (b - a) * frac;
        }
    }
}
