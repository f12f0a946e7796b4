pub mod control;
pub mod envelope;
pub mod error;
pub mod event;
pub mod mixer;
pub mod osc;
pub mod realtime;
pub mod tuning;
pub mod voice;
pub mod wavetable;

use std::sync::Arc;

use log::info;
use ringbuf::HeapRb;

pub use control::Knob;
pub use envelope::AdsrConfig;
pub use error::{Result, SynthError};
pub use event::Event;
pub use realtime::{AudioRenderer, EventSender, Flow};
pub use tuning::TuningMode;

use control::ControlBank;
use event::ControllerMap;
use mixer::Mixer;
use osc::GeneratorKind;
use realtime::{Engine, Router};
use tuning::FrequencyTable;
use voice::{VoiceFactory, VoiceRegistry};
use wavetable::WavetableBuilder;

/// The fixed sample rate of the engine, in Hz. Output is mono.
pub const SAMPLE_RATE: u32 = 48_000;

pub const DEFAULT_MAX_VOICES: usize = 256;
pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Oscillator selection as configured.
#[derive(Debug, Clone)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
    /// `fmod` is added to the note frequency to get the modulator frequency,
    /// in Hz. `amod` is the modulation amount at full mod wheel.
    Fm { fmod: f64, amod: f64 },
    /// A WAV recording, mono at [`SAMPLE_RATE`], to extract a wavetable from.
    Wavetable(Vec<u8>),
}

impl Waveform {
    fn resolve(&self) -> Result<GeneratorKind> {
        Ok(match self {
            Waveform::Sine => GeneratorKind::Sine,
            Waveform::Saw => GeneratorKind::Saw,
            Waveform::Square => GeneratorKind::Square,
            Waveform::Triangle => GeneratorKind::Triangle,
            Waveform::Fm { fmod, amod } => GeneratorKind::Fm {
                fmod: *fmod,
                amod: *amod,
            },
            Waveform::Wavetable(bytes) => {
                let table = WavetableBuilder::from_wav_bytes(bytes)?.build()?;
                GeneratorKind::Wavetable(Arc::new(table))
            }
        })
    }
}

pub struct Config {
    pub waveform: Waveform,
    pub tuning: TuningMode,
    pub adsr: AdsrConfig,
    /// Polyphony below which the mix is not scaled down further.
    pub compression_threshold: usize,
    /// Controller number to knob name.
    pub controllers: Vec<(u8, String)>,
    /// A controller that releases everything and ends event processing.
    pub stop_controller: Option<u8>,
    /// Two keys that, held together, do the same.
    pub stop_chord: Option<(u8, u8)>,
    /// Preallocated voices. Never less than one per key.
    pub max_voices: usize,
    /// Samples mixed per internal block; longer buffers are split.
    pub block_size: usize,
    /// Commands that can be queued between event and audio side.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            tuning: TuningMode::Equal,
            adsr: AdsrConfig::default(),
            compression_threshold: mixer::DEFAULT_COMPRESSION_THRESHOLD,
            controllers: vec![(1, "modwheel".to_string()), (7, "volume".to_string())],
            stop_controller: None,
            stop_chord: None,
            max_voices: DEFAULT_MAX_VOICES,
            block_size: DEFAULT_BLOCK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// A polyphonic synth driven from a single thread. Use [`Synth::split`] to
/// run event handling and audio rendering on separate threads.
pub struct Synth {
    router: Router,
    engine: Engine,
    queue_capacity: usize,
}

impl Synth {
    /// Fails on any configuration problem: a bad wavetable source, an unknown
    /// knob name, a bad tuning base or a stop chord key out of range.
    pub fn new(cfg: Config) -> Result<Self> {
        let generator = cfg.waveform.resolve()?;
        let table = FrequencyTable::new(cfg.tuning)?;
        let controllers = ControllerMap::new(&cfg.controllers, cfg.stop_controller)?;
        if let Some((a, b)) = cfg.stop_chord {
            if let Some(key) = [a, b].into_iter().find(|k| *k as usize >= tuning::KEY_COUNT) {
                return Err(SynthError::InvalidKey(key));
            }
        }

        let factory = VoiceFactory {
            table,
            generator,
            adsr: cfg.adsr.into(),
        };
        info!(
            "synth: {} oscillator, {:?}, {:?}, compression at {} voices",
            factory.generator.name(),
            cfg.tuning,
            factory.adsr,
            cfg.compression_threshold
        );

        Ok(Self {
            router: Router::new(controllers, cfg.stop_chord),
            engine: Engine {
                registry: VoiceRegistry::new(factory, cfg.max_voices),
                controls: ControlBank::new(),
                mixer: Mixer::new(cfg.compression_threshold, cfg.block_size),
                now: 0,
            },
            queue_capacity: cfg.queue_capacity.max(1),
        })
    }

    /// Apply one event. Note-on for a held key is rejected with
    /// [`SynthError::DuplicateKey`] and changes nothing.
    pub fn handle_event(&mut self, event: Event) -> Result<Flow> {
        let Synth { router, engine, .. } = self;
        router.route(event, |command| engine.apply(command))
    }

    pub fn note_on(&mut self, key: u8, velocity: u8) -> Result<Flow> {
        self.handle_event(Event::NoteOn { key, velocity })
    }

    pub fn note_off(&mut self, key: u8, velocity: u8) -> Result<Flow> {
        self.handle_event(Event::NoteOff { key, velocity })
    }

    pub fn control_change(&mut self, controller: u8, value: u8) -> Result<Flow> {
        self.handle_event(Event::ControlChange { controller, value })
    }

    /// Release every held key at full velocity.
    pub fn panic_stop(&mut self) {
        self.router.forget_held();
        self.engine.registry.panic_stop();
    }

    /// Fill a buffer of 16-bit samples.
    pub fn fill(&mut self, out: &mut [i16]) {
        self.engine.fill(out);
    }

    /// Fill a buffer of float samples in `-1..=1`.
    pub fn fill_f32(&mut self, out: &mut [f32]) {
        self.engine.fill_f32(out);
    }

    /// Samples rendered so far.
    pub fn now(&self) -> u64 {
        self.engine.now
    }

    pub fn active_voices(&self) -> usize {
        self.engine.registry.active_count()
    }

    /// Voices evicted so far because the arena was full.
    pub fn stolen_voices(&self) -> u64 {
        self.engine.registry.stolen_count()
    }

    pub fn held_keys(&self) -> usize {
        self.engine.registry.held_count()
    }

    /// Split into an event half and an audio half connected by a lock-free
    /// queue.
    pub fn split(self) -> (EventSender, AudioRenderer) {
        let (producer, consumer) = HeapRb::new(self.queue_capacity).split();
        (
            EventSender {
                router: self.router,
                producer,
            },
            AudioRenderer {
                engine: self.engine,
                consumer,
                rejected: 0,
            },
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn peak(buf: &[i16]) -> i16 {
        buf.iter().map(|s| s.saturating_abs()).max().unwrap_or(0)
    }

    #[test]
    fn note_starts_silent_and_fades_out_after_release() {
        let mut synth = Synth::new(Config::default()).unwrap();
        synth.note_on(69, 100).unwrap();

        let mut block = [0i16; 48];
        synth.fill(&mut block);
        assert_eq!(block[0], 0);
        assert!(block.iter().any(|&s| s != 0));

        for _ in 0..100 {
            synth.fill(&mut block);
        }
        synth.note_off(69, 100).unwrap();

        let mut tail = vec![0i16; 48 * 300];
        for chunk in tail.chunks_mut(48) {
            synth.fill(chunk);
        }
        let first = peak(&tail[..480]);
        let later = peak(&tail[960..1440]);
        assert!(first > 0);
        assert!(later < first);
        assert_eq!(peak(&tail[tail.len() - 480..]), 0);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn two_notes_saturate_instead_of_wrapping() {
        let render = |keys: &[u8]| {
            let mut synth = Synth::new(Config::default()).unwrap();
            for &key in keys {
                synth.note_on(key, 127).unwrap();
            }
            let mut out = vec![0.0f32; 2048];
            synth.fill_f32(&mut out);
            out
        };
        let a = render(&[60]);
        let b = render(&[64]);
        let both = render(&[60, 64]);
        for ((x, y), z) in a.iter().zip(&b).zip(&both) {
            assert!(z.abs() <= x.abs() + y.abs() + 1e-6);
            assert!(z.abs() <= 1.0);
        }
    }

    #[test]
    fn many_notes_stay_in_range() {
        let mut synth = Synth::new(Config {
            waveform: Waveform::Square,
            ..Default::default()
        })
        .unwrap();
        for key in 30..90 {
            synth.note_on(key, 127).unwrap();
        }
        let mut out = vec![0i16; 4800];
        synth.fill(&mut out);
        assert!(out.iter().all(|&s| s > i16::MIN));
    }

    #[test]
    fn volume_jump_is_smoothed_across_buffers() {
        let mut synth = Synth::new(Config {
            waveform: Waveform::Square,
            ..Default::default()
        })
        .unwrap();
        synth.note_on(69, 100).unwrap();
        let mut warm = vec![0.0f32; 4800];
        synth.fill_f32(&mut warm);

        synth.control_change(7, 0).unwrap();
        let mut first = vec![0.0f32; 512];
        let mut second = vec![0.0f32; 512];
        synth.fill_f32(&mut first);
        synth.fill_f32(&mut second);

        let levels: Vec<f32> = warm[4799..]
            .iter()
            .chain(&first)
            .chain(&second)
            .map(|s| s.abs())
            .collect();
        let largest_step = levels
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0f32, f32::max);
        assert!(largest_step < 0.05, "step of {largest_step}");
        assert!(second.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn duplicate_note_on_is_rejected() {
        let mut synth = Synth::new(Config::default()).unwrap();
        synth.note_on(60, 100).unwrap();
        assert!(matches!(
            synth.note_on(60, 100),
            Err(SynthError::DuplicateKey(60))
        ));
        assert_eq!(synth.active_voices(), 1);
        assert_eq!(synth.held_keys(), 1);
    }

    #[test]
    fn zero_velocity_note_on_releases() {
        let mut synth = Synth::new(Config::default()).unwrap();
        synth.note_on(60, 100).unwrap();
        synth.note_on(60, 0).unwrap();
        assert_eq!(synth.held_keys(), 0);
        synth.note_on(60, 100).unwrap();
    }

    #[test]
    fn stray_note_off_and_unknown_controllers_are_ignored() {
        let mut synth = Synth::new(Config::default()).unwrap();
        assert_eq!(synth.note_off(60, 10).unwrap(), Flow::Continue);
        assert_eq!(synth.control_change(74, 10).unwrap(), Flow::Continue);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn stop_controller_releases_and_stops() {
        let mut synth = Synth::new(Config {
            stop_controller: Some(20),
            ..Default::default()
        })
        .unwrap();
        synth.note_on(60, 100).unwrap();
        synth.note_on(64, 100).unwrap();
        assert_eq!(synth.control_change(20, 64).unwrap(), Flow::Continue);
        assert_eq!(synth.held_keys(), 2);
        assert_eq!(synth.control_change(20, 0).unwrap(), Flow::Stop);
        assert_eq!(synth.held_keys(), 0);
        assert_eq!(synth.active_voices(), 2);
    }

    #[test]
    fn stop_chord_stops() {
        let mut synth = Synth::new(Config {
            stop_chord: Some((83, 84)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(synth.note_on(83, 100).unwrap(), Flow::Continue);
        assert_eq!(synth.note_on(84, 100).unwrap(), Flow::Stop);
        assert_eq!(synth.held_keys(), 0);
    }

    #[test]
    fn panic_stop_clears_held_keys() {
        let mut synth = Synth::new(Config::default()).unwrap();
        synth.note_on(60, 100).unwrap();
        synth.panic_stop();
        assert_eq!(synth.held_keys(), 0);
        synth.note_on(60, 100).unwrap();
    }

    #[test]
    fn volume_knob_silences_output() {
        let mut synth = Synth::new(Config::default()).unwrap();
        synth.note_on(60, 100).unwrap();
        synth.control_change(7, 0).unwrap();
        let mut out = vec![0i16; 9600];
        synth.fill(&mut out);
        assert_eq!(peak(&out[4800..]), 0);
    }

    #[test]
    fn fm_responds_to_the_mod_wheel() {
        let render = |wheel: u8| {
            let mut synth = Synth::new(Config {
                waveform: Waveform::Fm {
                    fmod: 5.0,
                    amod: 40.0,
                },
                ..Default::default()
            })
            .unwrap();
            synth.control_change(1, wheel).unwrap();
            // let the knob settle
            let mut out = vec![0.0f32; 960];
            synth.fill_f32(&mut out);
            synth.note_on(57, 127).unwrap();
            synth.fill_f32(&mut out);
            out
        };
        let plain = render(0);
        let modulated = render(127);
        assert!(plain
            .iter()
            .zip(&modulated)
            .any(|(a, b)| (a - b).abs() > 0.01));
    }

    mod config_errors {
        use super::*;

        #[test]
        fn unknown_knob_name() {
            let result = Synth::new(Config {
                controllers: vec![(74, "cutoff".to_string())],
                ..Default::default()
            });
            assert!(matches!(result, Err(SynthError::UnknownControl(_))));
        }

        #[test]
        fn bad_tuning_base() {
            let result = Synth::new(Config {
                tuning: TuningMode::Pythagorean { base: 130 },
                ..Default::default()
            });
            assert!(matches!(result, Err(SynthError::InvalidTuning(_))));
        }

        #[test]
        fn bad_wavetable_source() {
            let result = Synth::new(Config {
                waveform: Waveform::Wavetable(b"RIFF".to_vec()),
                ..Default::default()
            });
            assert!(matches!(result, Err(SynthError::Wav(_))));
        }

        #[test]
        fn stop_chord_out_of_range() {
            let result = Synth::new(Config {
                stop_chord: Some((60, 200)),
                ..Default::default()
            });
            assert!(matches!(result, Err(SynthError::InvalidKey(200))));
        }
    }
}
