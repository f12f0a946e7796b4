pub mod adsr;

pub use adsr::AdsrEnvelope;

use crate::SAMPLE_RATE;

/// ADSR timings as configured, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrConfig {
    pub attack_ms: f32,
    pub decay_ms: f32,
    /// The level held while the key is down, in `0..=1`.
    pub sustain: f32,
    pub release_ms: f32,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self {
            attack_ms: 10.0,
            decay_ms: 100.0,
            sustain: 0.7,
            release_ms: 200.0,
        }
    }
}

fn ms_to_samples(ms: f32) -> u32 {
    (ms.max(0.0) * SAMPLE_RATE as f32 / 1000.0).round() as u32
}

/// An ADSR envelope configuration. Durations are in samples.
///
/// ```plaintext
/// amplitude
/// ^
/// |     /\
/// |    /  \
/// |   /    +---------------+\ -  -  -  -  -  -  -  +
/// |  /     |               | \                     | Sustain
/// +-+------+---------------+--+------> time  -  -  +
///   |  |   |               +--+ Release
///   |  |   |               (note is released)
///   |  +---+ Decay
/// t=0--+ Attack
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: u32,
    pub decay: u32,
    pub sustain: f32,
    /// Release time for a note-off at velocity 0.05. Faster releases get
    /// shorter, see [`AdsrEnvelope::release`].
    pub release: u32,
}

impl Adsr {
    pub fn new(attack: u32, decay: u32, sustain: f32, release: u32) -> Self {
        Self {
            attack,
            decay,
            sustain: sustain.clamp(0.0, 1.0),
            release,
        }
    }
}

impl From<AdsrConfig> for Adsr {
    fn from(cfg: AdsrConfig) -> Self {
        Adsr::new(
            ms_to_samples(cfg.attack_ms),
            ms_to_samples(cfg.decay_ms),
            cfg.sustain,
            ms_to_samples(cfg.release_ms),
        )
    }
}
