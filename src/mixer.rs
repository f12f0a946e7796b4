//! Summing voices into the output signal.

use crate::control::{ControlBank, Knob};
use crate::osc::Modulation;
use crate::voice::VoiceRegistry;

/// Default number of voices below which the mix is not scaled down further.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 5;

/// Sums every sounding voice, divides by the polyphony (but never by less
/// than the compression threshold), applies the volume knob and clamps.
///
/// All scratch space is allocated up front; mixing never allocates.
pub struct Mixer {
    compression_threshold: usize,
    block_size: usize,
    sum: Vec<f32>,
    gains: Vec<f32>,
    samples: Vec<f32>,
    /// Float staging for integer output.
    staging: Vec<f32>,
}

impl Mixer {
    pub fn new(compression_threshold: usize, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            compression_threshold: compression_threshold.max(1),
            block_size,
            sum: vec![0.0; block_size],
            gains: vec![0.0; block_size],
            samples: vec![0.0; block_size],
            staging: vec![0.0; block_size],
        }
    }

    /// Overwrite `out` with the next `out.len()` samples, the first at engine
    /// time `start`. Long buffers are mixed in chunks of the block size.
    pub fn mix(
        &mut self,
        registry: &mut VoiceRegistry,
        controls: &mut ControlBank,
        start: u64,
        out: &mut [f32],
    ) {
        let mut now = start;
        for chunk in out.chunks_mut(self.block_size) {
            self.mix_block(registry, controls, now, chunk);
            now += chunk.len() as u64;
        }
    }

    /// Like [`Mixer::mix`], scaled to 16-bit amplitudes.
    pub fn mix_i16(
        &mut self,
        registry: &mut VoiceRegistry,
        controls: &mut ControlBank,
        start: u64,
        out: &mut [i16],
    ) {
        let mut staging = std::mem::take(&mut self.staging);
        let mut now = start;
        for chunk in out.chunks_mut(self.block_size) {
            let block = &mut staging[..chunk.len()];
            self.mix_block(registry, controls, now, block);
            for (out, sample) in chunk.iter_mut().zip(block.iter()) {
                *out = (sample * i16::MAX as f32).round() as i16;
            }
            now += chunk.len() as u64;
        }
        self.staging = staging;
    }

    /// `out` must not be longer than the block size.
    fn mix_block(
        &mut self,
        registry: &mut VoiceRegistry,
        controls: &mut ControlBank,
        now: u64,
        out: &mut [f32],
    ) {
        let n = out.len();
        debug_assert!(n <= self.block_size);
        let count = registry.active_count();
        if count == 0 {
            out.fill(0.0);
            return;
        }

        let modulation = Modulation {
            depth: controls.value(Knob::ModWheel, now),
        };
        let sum = &mut self.sum[..n];
        let gains = &mut self.gains[..n];
        let samples = &mut self.samples[..n];
        sum.fill(0.0);
        // Voices that finish mid-block contribute zeros for the rest of it and
        // are swept afterwards.
        for voice in registry.voices_mut() {
            voice.render(sum, gains, samples, &modulation);
        }
        registry.retain_sounding();

        // Volume is read per sample so a knob change ramps instead of
        // stepping at the next block boundary.
        let divisor = count.max(self.compression_threshold) as f32;
        for (i, (out, s)) in out.iter_mut().zip(sum.iter()).enumerate() {
            let volume = controls.value(Knob::Volume, now + i as u64);
            *out = (s * volume / divisor).clamp(-1.0, 1.0);
        }
    }
}
