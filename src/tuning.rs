//! Key number to frequency conversion.

use std::str::FromStr;

use crate::error::{Result, SynthError};

/// Note number of A4.
pub const A4_NOTE: u8 = 69;
/// Frequency of A4, in Hz.
pub const A4_HZ: f64 = 440.0;

/// Number of MIDI keys.
pub const KEY_COUNT: usize = 128;

const JUST_RATIOS: [f64; 12] = [
    1.0,
    16.0 / 15.0,
    9.0 / 8.0,
    6.0 / 5.0,
    5.0 / 4.0,
    4.0 / 3.0,
    45.0 / 32.0,
    3.0 / 2.0,
    8.0 / 5.0,
    5.0 / 3.0,
    9.0 / 5.0,
    15.0 / 8.0,
];

const PYTHAGOREAN_RATIOS: [f64; 12] = [
    1.0,
    256.0 / 243.0,
    9.0 / 8.0,
    32.0 / 27.0,
    81.0 / 64.0,
    4.0 / 3.0,
    729.0 / 512.0,
    3.0 / 2.0,
    128.0 / 81.0,
    27.0 / 16.0,
    16.0 / 9.0,
    243.0 / 128.0,
];

/// Equal-tempered frequency of a (possibly fractional) note number.
pub fn note_to_hz(note: f64) -> f64 {
    A4_HZ * 2.0_f64.powf((note - A4_NOTE as f64) / 12.0)
}

/// Decode a MIDI Tuning Standard frequency word: semitone followed by a
/// 14-bit fraction in units of 1/16384 semitone.
///
/// Returns `None` for the "no change" word `7f 7f 7f` and for bytes with the
/// high bit set.
pub fn pitch_to_hz(pitch: [u8; 3]) -> Option<f64> {
    if pitch.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    if pitch == [0x7f; 3] {
        return None;
    }
    let frac = ((pitch[1] as u32) << 7) | pitch[2] as u32;
    Some(note_to_hz(pitch[0] as f64 + frac as f64 / 16384.0))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TuningMode {
    #[default]
    Equal,
    /// 5-limit just intonation rooted at `base`.
    Just { base: u8 },
    Pythagorean { base: u8 },
}

impl FromStr for TuningMode {
    type Err = SynthError;

    /// Parses `equal`, `just[:KEY]` or `pythagorean[:KEY]`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SynthError::InvalidTuning(s.to_string());
        let (name, base) = match s.split_once(':') {
            Some((name, base)) => {
                let base = base.trim().parse::<u8>().map_err(|_| invalid())?;
                (name.trim(), Some(base))
            }
            None => (s.trim(), None),
        };
        match (name.to_ascii_lowercase().as_str(), base) {
            ("equal", None) => Ok(TuningMode::Equal),
            ("just", base) => Ok(TuningMode::Just {
                base: base.unwrap_or(A4_NOTE),
            }),
            ("pythagorean", base) => Ok(TuningMode::Pythagorean {
                base: base.unwrap_or(A4_NOTE),
            }),
            _ => Err(invalid()),
        }
    }
}

/// Frequencies in Hz for every MIDI key, fixed at construction.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    freqs: [f64; KEY_COUNT],
}

impl FrequencyTable {
    pub fn new(mode: TuningMode) -> Result<Self> {
        let mut freqs = [0.0; KEY_COUNT];
        match mode {
            TuningMode::Equal => {
                for (key, freq) in freqs.iter_mut().enumerate() {
                    *freq = note_to_hz(key as f64);
                }
            }
            TuningMode::Just { base } => fill_ratios(&mut freqs, base, &JUST_RATIOS)?,
            TuningMode::Pythagorean { base } => {
                fill_ratios(&mut freqs, base, &PYTHAGOREAN_RATIOS)?
            }
        }
        Ok(Self { freqs })
    }

    /// Frequency of `key`, in Hz. Keys above 127 are clamped.
    pub fn frequency(&self, key: u8) -> f64 {
        self.freqs[(key as usize).min(KEY_COUNT - 1)]
    }
}

/// The base key keeps its equal-tempered pitch, every other key is a ratio
/// away from it within its octave.
fn fill_ratios(freqs: &mut [f64; KEY_COUNT], base: u8, ratios: &[f64; 12]) -> Result<()> {
    if base as usize >= KEY_COUNT {
        return Err(SynthError::InvalidTuning(format!("base key {base}")));
    }
    let base_hz = note_to_hz(base as f64);
    for (key, freq) in freqs.iter_mut().enumerate() {
        let offset = key as i32 - base as i32;
        let octave = offset.div_euclid(12);
        let degree = offset.rem_euclid(12) as usize;
        *freq = base_hz * ratios[degree] * 2.0_f64.powi(octave);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn equalish(x: f64, y: f64, tolerance: f64) -> bool {
        (x - y).abs() <= tolerance
    }

    mod note_to_hz {
        use super::*;

        #[test]
        fn converts_the_concert_pitch_exactly() {
            assert_eq!(note_to_hz(69.0), 440.0);
        }

        #[test]
        fn matches_known_pitches() {
            assert!(equalish(note_to_hz(21.0), 27.5, 0.01));
            assert!(equalish(note_to_hz(68.0), 415.30, 0.01));
            assert!(equalish(note_to_hz(108.0), 4186.0, 0.01));
        }
    }

    mod pitch_to_hz {
        use super::*;

        fn from_hex(x: u32) -> Option<f64> {
            pitch_to_hz([(x >> 16) as u8, (x >> 8) as u8, x as u8])
        }

        #[test]
        fn decodes_whole_semitones() {
            assert_eq!(from_hex(0x450000), Some(440.0));
            assert!(equalish(from_hex(0x3c0000).unwrap(), 261.6256, 0.1));
            assert!(equalish(from_hex(0x000000).unwrap(), 8.1758, 0.1));
        }

        #[test]
        fn decodes_fractions() {
            assert!(equalish(from_hex(0x447f7f).unwrap(), 439.9984, 0.1));
            assert!(equalish(from_hex(0x7f0001).unwrap(), 12543.92, 0.1));
            assert!(equalish(from_hex(0x7f7f7e).unwrap(), 13289.73, 0.1));
        }

        #[test]
        fn no_change_word_is_none() {
            assert_eq!(from_hex(0x7f7f7f), None);
        }

        #[test]
        fn rejects_high_bit() {
            assert_eq!(pitch_to_hz([0x80, 0, 0]), None);
        }
    }

    mod frequency_table {
        use super::*;

        #[test]
        fn equal_temperament_has_a440() {
            let table = FrequencyTable::new(TuningMode::Equal).unwrap();
            assert_eq!(table.frequency(69), 440.0);
        }

        #[test]
        fn octaves_double_in_every_mode() {
            for mode in [
                TuningMode::Equal,
                TuningMode::Just { base: 60 },
                TuningMode::Pythagorean { base: 62 },
            ] {
                let table = FrequencyTable::new(mode).unwrap();
                for key in 0..(128 - 12) {
                    let lo = table.frequency(key);
                    let hi = table.frequency(key + 12);
                    assert!(equalish(hi, 2.0 * lo, 1e-9 * hi), "{mode:?} key {key}");
                }
            }
        }

        #[test]
        fn is_monotonic() {
            for mode in [
                TuningMode::Equal,
                TuningMode::Just { base: 69 },
                TuningMode::Pythagorean { base: 0 },
            ] {
                let table = FrequencyTable::new(mode).unwrap();
                for key in 0..127 {
                    assert!(table.frequency(key) <= table.frequency(key + 1));
                }
            }
        }

        #[test]
        fn just_fifth_is_three_halves() {
            let table = FrequencyTable::new(TuningMode::Just { base: 60 }).unwrap();
            assert!(equalish(
                table.frequency(67),
                table.frequency(60) * 1.5,
                1e-9
            ));
            assert_eq!(table.frequency(60), note_to_hz(60.0));
        }

        #[test]
        fn rejects_base_out_of_range() {
            assert!(matches!(
                FrequencyTable::new(TuningMode::Just { base: 200 }),
                Err(SynthError::InvalidTuning(_))
            ));
        }
    }

    mod parse {
        use super::*;

        #[test]
        fn defaults_to_equal() {
            assert_eq!(TuningMode::default(), TuningMode::Equal);
        }

        #[test]
        fn parses_modes() {
            assert_eq!("equal".parse::<TuningMode>().unwrap(), TuningMode::Equal);
            assert_eq!(
                "just:60".parse::<TuningMode>().unwrap(),
                TuningMode::Just { base: 60 }
            );
            assert_eq!(
                "Pythagorean".parse::<TuningMode>().unwrap(),
                TuningMode::Pythagorean { base: 69 }
            );
        }

        #[test]
        fn equal_with_base_conflicts() {
            assert!(matches!(
                "equal:60".parse::<TuningMode>(),
                Err(SynthError::InvalidTuning(_))
            ));
        }

        #[test]
        fn rejects_garbage() {
            assert!("meantone".parse::<TuningMode>().is_err());
            assert!("just:x".parse::<TuningMode>().is_err());
        }
    }
}
