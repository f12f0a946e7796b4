//! Turning a recorded note into a loop-ready wavetable.
//!
//! The analysis runs once, before any audio starts:
//!
//! 1. normalize the peak amplitude to 1,
//! 2. reject anything shorter than 0.1 s,
//! 3. take a centered slice of at most 16384 samples,
//! 4. find the strongest bin of its Blackman-windowed spectrum, which is the
//!    fundamental estimate,
//! 5. if there is room, find a loop point near the end that lines up with
//!    the start and crossfade the seam over one period.

use std::f64::consts::TAU;
use std::io::Cursor;

use log::{debug, info};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{Result, SynthError};
use crate::SAMPLE_RATE;

/// Largest FFT window used for fundamental detection.
pub const MAX_FFT_WINDOW: usize = 16384;
/// Shortest usable recording, in samples (0.1 s).
pub const MIN_SAMPLES: usize = SAMPLE_RATE as usize / 10;
/// Lowest accepted fundamental, in Hz.
pub const MIN_FUNDAMENTAL: f64 = 100.0;
/// Highest accepted fundamental, in Hz.
pub const MAX_FUNDAMENTAL: f64 = 4000.0;
/// Length of the loop-start window, in periods.
const HEAD_PERIODS: usize = 8;
/// Length of the loop-end search window, in periods.
const TAIL_PERIODS: usize = 16;

/// A fundamental estimate together with the samples to loop over. Shared
/// read-only between voices.
#[derive(Debug, Clone)]
pub struct Wavetable {
    fundamental: f64,
    samples: Vec<f32>,
}

impl Wavetable {
    /// A wavetable from already analysed data.
    pub fn from_parts(fundamental: f64, samples: Vec<f32>) -> Self {
        Self {
            fundamental,
            samples,
        }
    }

    /// The fundamental frequency of the recording, in Hz.
    pub fn fundamental(&self) -> f64 {
        self.fundamental
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

pub struct WavetableBuilder {
    samples: Vec<f32>,
}

impl WavetableBuilder {
    /// Start from raw mono samples at [`SAMPLE_RATE`].
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Decode a WAV byte buffer. Only mono at [`SAMPLE_RATE`] is accepted.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        if spec.channels != 1 || spec.sample_rate != SAMPLE_RATE {
            return Err(SynthError::InvalidWaveFormat {
                channels: spec.channels,
                sample_rate: spec.sample_rate,
            });
        }
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        debug!(
            "decoded {} samples, {} bit {:?}",
            samples.len(),
            spec.bits_per_sample,
            spec.sample_format
        );
        Ok(Self { samples })
    }

    pub fn build(self) -> Result<Wavetable> {
        let mut samples = self.samples;
        normalize(&mut samples);
        if samples.len() < MIN_SAMPLES {
            return Err(SynthError::SampleTooShort {
                samples: samples.len(),
            });
        }

        let fundamental = detect_fundamental(&samples);
        if !(MIN_FUNDAMENTAL..=MAX_FUNDAMENTAL).contains(&fundamental) {
            return Err(SynthError::FundamentalOutOfRange { hz: fundamental });
        }

        let original_len = samples.len();
        let samples = splice_loop(samples, fundamental);
        info!(
            "wavetable: fundamental {:.1} Hz, {} of {} samples kept",
            fundamental,
            samples.len(),
            original_len
        );
        Ok(Wavetable {
            fundamental,
            samples,
        })
    }
}

fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

fn blackman(i: usize, n: usize) -> f64 {
    let x = i as f64 / (n - 1) as f64;
    0.42 - 0.5 * (TAU * x).cos() + 0.08 * (2.0 * TAU * x).cos()
}

/// Frequency of the strongest bin of the windowed spectrum of a centered
/// slice.
fn detect_fundamental(samples: &[f32]) -> f64 {
    let n = samples.len().min(MAX_FFT_WINDOW);
    let start = (samples.len() - n) / 2;
    let slice = &samples[start..start + n];

    let mut buffer: Vec<Complex<f64>> = slice
        .iter()
        .enumerate()
        .map(|(i, &s)| Complex::new(s as f64 * blackman(i, n), 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let mut peak_bin = 0;
    let mut peak_mag = f64::MIN;
    for (bin, c) in buffer[..=n / 2].iter().enumerate() {
        let mag = c.norm();
        if mag > peak_mag {
            peak_bin = bin;
            peak_mag = mag;
        }
    }
    peak_bin as f64 * SAMPLE_RATE as f64 / n as f64
}

/// Cut the recording where its tail best matches its head, then crossfade
/// the first period with what followed the cut so playback wraps smoothly.
///
/// Recordings shorter than `2 * HEAD_PERIODS` periods are returned as is.
fn splice_loop(samples: Vec<f32>, fundamental: f64) -> Vec<f32> {
    let period = (SAMPLE_RATE as f64 / fundamental).round() as usize;
    let head_len = HEAD_PERIODS * period;
    if period == 0 || samples.len() < 2 * head_len {
        return samples;
    }
    let tail_len = (TAIL_PERIODS * period).min(samples.len());
    let tail_start = samples.len() - tail_len;
    let head = &samples[..head_len];

    // Sliding cross-correlation of the head over the tail, "valid" offsets
    // only. A cut inside the head would correlate the head with itself.
    let mut best: Option<(usize, f64)> = None;
    for offset in 0..=(tail_len - head_len) {
        let cut = tail_start + offset;
        if cut < head_len {
            continue;
        }
        let corr: f64 = samples[cut..cut + head_len]
            .iter()
            .zip(head)
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum();
        if best.map_or(true, |(_, c)| corr > c) {
            best = Some((cut, corr));
        }
    }
    let Some((cut, _)) = best else {
        return samples;
    };
    debug!("loop splice at sample {cut}, period {period}");

    let mut out = samples;
    for i in 0..period {
        let fade_in = i as f32 / period as f32;
        out[i] = out[i] * fade_in + out[cut + i] * (1.0 - fade_in);
    }
    out.truncate(cut);
    out
}
