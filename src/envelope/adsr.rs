use super::Adsr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Per-voice envelope state. Produces one gain per sample, all linear
/// segments, continuous across phase changes.
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    adsr: Adsr,
    phase: Phase,
    /// Samples spent in the current phase.
    elapsed: u32,
    /// The most recently produced gain.
    level: f32,
    /// Gain at the moment of release.
    release_from: f32,
    /// Release duration after velocity scaling.
    release_len: u32,
}

impl AdsrEnvelope {
    pub fn new(adsr: Adsr) -> Self {
        let phase = if adsr.attack == 0 {
            Phase::Decay
        } else {
            Phase::Attack
        };
        Self {
            adsr,
            phase,
            elapsed: 0,
            level: 0.0,
            release_from: 0.0,
            release_len: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn is_releasing(&self) -> bool {
        matches!(self.phase, Phase::Release | Phase::Done)
    }

    /// Start the release from wherever the envelope is now. The release
    /// takes `release * (1.05 - velocity)` samples, so harder note-offs cut
    /// the note quicker. Releasing twice does nothing.
    pub fn release(&mut self, velocity: f32) {
        if self.is_releasing() {
            return;
        }
        let velocity = velocity.clamp(0.0, 1.0);
        self.release_from = self.level;
        self.release_len = (self.adsr.release as f32 * (1.05 - velocity)).round() as u32;
        self.enter(Phase::Release);
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.elapsed = 0;
    }

    /// Gain for the next sample.
    fn next_gain(&mut self) -> f32 {
        loop {
            let gain = match self.phase {
                Phase::Attack if self.elapsed < self.adsr.attack => {
                    self.elapsed as f32 / self.adsr.attack as f32
                }
                Phase::Attack => {
                    self.enter(Phase::Decay);
                    continue;
                }
                Phase::Decay if self.elapsed < self.adsr.decay => {
                    let t = self.elapsed as f32 / self.adsr.decay as f32;
                    1.0 + (self.adsr.sustain - 1.0) * t
                }
                Phase::Decay => {
                    self.enter(Phase::Sustain);
                    continue;
                }
                Phase::Sustain => self.adsr.sustain,
                Phase::Release if self.elapsed < self.release_len => {
                    let t = self.elapsed as f32 / self.release_len as f32;
                    self.release_from * (1.0 - t)
                }
                Phase::Release => {
                    self.enter(Phase::Done);
                    continue;
                }
                Phase::Done => return 0.0,
            };
            if self.phase != Phase::Sustain {
                self.elapsed += 1;
            }
            self.level = gain;
            return gain;
        }
    }

    /// Fill `gains` with the next samples of the envelope. Once done, the
    /// remaining gains are zero. Returns whether the envelope is done.
    pub fn fill_gains(&mut self, gains: &mut [f32]) -> bool {
        for gain in gains.iter_mut() {
            *gain = self.next_gain();
        }
        self.is_done()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn gains(env: &mut AdsrEnvelope, n: usize) -> Vec<f32> {
        let mut buf = vec![0.0; n];
        env.fill_gains(&mut buf);
        buf
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn follows_the_adsr_shape() {
        let (a, d, s, r) = (100, 200, 0.5, 400);
        let mut env = AdsrEnvelope::new(Adsr::new(a, d, s, r));
        let g = gains(&mut env, 1000);
        assert_eq!(g[0], 0.0);
        assert!(close(g[50], 0.5));
        assert!(close(g[a as usize], 1.0));
        assert!(close(g[(a + d) as usize], s));
        assert!(g[(a + d) as usize..].iter().all(|&x| close(x, s)));
        assert_eq!(env.phase(), Phase::Sustain);
    }

    #[test]
    fn release_ramps_to_zero_and_finishes() {
        let mut env = AdsrEnvelope::new(Adsr::new(10, 10, 0.8, 1000));
        gains(&mut env, 100);
        env.release(1.0);
        // 1000 * (1.05 - 1.0) = 50 samples
        let g = gains(&mut env, 60);
        assert!(close(g[0], 0.8));
        assert!(g[..50].windows(2).all(|w| w[1] <= w[0]));
        assert!(g[49] > 0.0);
        assert!(g[50..].iter().all(|&x| x == 0.0));
        assert!(env.is_done());
    }

    #[test]
    fn soft_release_is_longer() {
        let mut env = AdsrEnvelope::new(Adsr::new(0, 0, 1.0, 1000));
        gains(&mut env, 10);
        env.release(0.0);
        let g = gains(&mut env, 1100);
        assert!(g[1049] > 0.0);
        assert_eq!(g[1050], 0.0);
    }

    #[test]
    fn release_during_attack_starts_from_current_level() {
        let mut env = AdsrEnvelope::new(Adsr::new(100, 100, 0.5, 100));
        let before = gains(&mut env, 25);
        env.release(0.55);
        let after = gains(&mut env, 10);
        assert!(close(after[0], before[24]));
        assert!(after[1] < after[0]);
    }

    #[test]
    fn zero_attack_starts_in_decay() {
        let env = AdsrEnvelope::new(Adsr::new(0, 10, 0.5, 10));
        assert_eq!(env.phase(), Phase::Decay);
        let mut env = env;
        assert_eq!(gains(&mut env, 1)[0], 1.0);
    }

    #[test]
    fn zero_release_is_done_immediately() {
        let mut env = AdsrEnvelope::new(Adsr::new(0, 0, 1.0, 0));
        gains(&mut env, 4);
        env.release(0.5);
        assert_eq!(gains(&mut env, 4), vec![0.0; 4]);
        assert!(env.is_done());
    }

    #[test]
    fn second_release_is_ignored() {
        let mut env = AdsrEnvelope::new(Adsr::new(0, 0, 1.0, 100));
        gains(&mut env, 4);
        env.release(0.0);
        let first = gains(&mut env, 10);
        env.release(1.0);
        let second = gains(&mut env, 10);
        assert!(second[0] < first[9]);
        assert!(!env.is_done());
    }

    #[test]
    fn random_envelopes_stay_in_range_and_continuous() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let adsr = Adsr::new(
                rng.gen_range(1..500),
                rng.gen_range(1..500),
                rng.gen_range(0.0..=1.0),
                rng.gen_range(1..2000),
            );
            let mut env = AdsrEnvelope::new(adsr);
            let held = rng.gen_range(0..1500);
            let velocity = rng.gen_range(0.0..=1.0);

            let mut g = gains(&mut env, held);
            env.release(velocity);
            g.extend(gains(&mut env, 2200));
            assert!(env.is_done());

            let release_len = (adsr.release as f32 * (1.05 - velocity)).round().max(1.0);
            let max_step = (1.0 / adsr.attack as f32)
                .max(1.0 / adsr.decay as f32)
                .max(1.0 / release_len)
                + 1e-5;
            for w in g.windows(2) {
                assert!((0.0..=1.0).contains(&w[0]));
                assert!((w[1] - w[0]).abs() <= max_step, "{adsr:?}: {w:?}");
            }
        }
    }
}
