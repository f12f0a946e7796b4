//! The two halves of a running synth.
//!
//! The event side owns note topology: it decides which key starts or stops a
//! voice and keeps its own record of held keys, so protocol errors are
//! reported to whoever sends the event. It hands commands to the audio side
//! over a lock-free queue. The audio side applies queued commands at the
//! start of each buffer, then renders; it never blocks or allocates.

use log::{debug, info, warn};
use ringbuf::{HeapConsumer, HeapProducer};

use crate::control::{ControlBank, Knob};
use crate::error::{Result, SynthError};
use crate::event::{unit, ControllerMap, Event, Route};
use crate::mixer::Mixer;
use crate::tuning::KEY_COUNT;
use crate::voice::VoiceRegistry;

/// Whether the event loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Every held key was released; stop reading events. Audio keeps playing
    /// the release tails.
    Stop,
}

/// A change to apply on the audio side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    NoteOn { key: u8, velocity: f32 },
    NoteOff { key: u8, velocity: f32 },
    Control(Knob, f32),
    PanicStop,
}

/// Turns events into commands and tracks held keys.
#[derive(Debug, Clone)]
pub struct Router {
    controllers: ControllerMap,
    stop_chord: Option<(u8, u8)>,
    held: [bool; KEY_COUNT],
}

impl Router {
    pub fn new(controllers: ControllerMap, stop_chord: Option<(u8, u8)>) -> Self {
        Self {
            controllers,
            stop_chord,
            held: [false; KEY_COUNT],
        }
    }

    /// Route one event, passing the resulting commands to `sink`. The held
    /// key record only changes once `sink` has accepted a command.
    pub fn route(
        &mut self,
        event: Event,
        mut sink: impl FnMut(Command) -> Result<()>,
    ) -> Result<Flow> {
        match event {
            Event::NoteOn { key, velocity: 0 } => self.note_off(key, 64, sink),
            Event::NoteOn { key, velocity } => {
                let held = self
                    .held
                    .get_mut(key as usize)
                    .ok_or(SynthError::InvalidKey(key))?;
                if *held {
                    return Err(SynthError::DuplicateKey(key));
                }
                // The key completing the stop chord is never started, so the
                // whole stop is a single command.
                if self.completes_stop_chord(key) {
                    info!("stop chord completed by {key}");
                    self.release_all(&mut sink)?;
                    return Ok(Flow::Stop);
                }
                sink(Command::NoteOn {
                    key,
                    velocity: unit(velocity),
                })?;
                self.held[key as usize] = true;
                debug!("note on {key} ({velocity})");
                Ok(Flow::Continue)
            }
            Event::NoteOff { key, velocity } => self.note_off(key, velocity, sink),
            Event::ControlChange { controller, value } => {
                match self.controllers.route(controller, value) {
                    Route::Knob(knob, value) => sink(Command::Control(knob, value))?,
                    Route::AllNotesOff => self.release_all(&mut sink)?,
                    Route::Stop => {
                        info!("stop controller {controller} received");
                        self.release_all(&mut sink)?;
                        return Ok(Flow::Stop);
                    }
                    Route::Ignored => {}
                }
                Ok(Flow::Continue)
            }
        }
    }

    fn note_off(
        &mut self,
        key: u8,
        velocity: u8,
        mut sink: impl FnMut(Command) -> Result<()>,
    ) -> Result<Flow> {
        if !self.is_held(key) {
            debug!("note off {key} not held");
            return Ok(Flow::Continue);
        }
        sink(Command::NoteOff {
            key,
            velocity: unit(velocity),
        })?;
        self.held[key as usize] = false;
        debug!("note off {key} ({velocity})");
        Ok(Flow::Continue)
    }

    fn completes_stop_chord(&self, key: u8) -> bool {
        match self.stop_chord {
            Some((a, b)) => (key == a && self.is_held(b)) || (key == b && self.is_held(a)),
            None => false,
        }
    }

    fn release_all(&mut self, sink: &mut impl FnMut(Command) -> Result<()>) -> Result<()> {
        sink(Command::PanicStop)?;
        self.forget_held();
        Ok(())
    }

    pub(crate) fn forget_held(&mut self) {
        self.held = [false; KEY_COUNT];
    }

    pub fn is_held(&self, key: u8) -> bool {
        self.held.get(key as usize).copied().unwrap_or(false)
    }
}

/// Audio-side state: the voices, the knobs and the sample clock.
pub struct Engine {
    pub(crate) registry: VoiceRegistry,
    pub(crate) controls: ControlBank,
    pub(crate) mixer: Mixer,
    /// Samples rendered so far.
    pub(crate) now: u64,
}

impl Engine {
    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::NoteOn { key, velocity } => {
                self.registry.note_on(key, velocity)?;
            }
            Command::NoteOff { key, velocity } => {
                self.registry.note_off(key, velocity);
            }
            Command::Control(knob, value) => self.controls.set(knob, value, self.now),
            Command::PanicStop => self.registry.panic_stop(),
        }
        Ok(())
    }

    pub fn fill_f32(&mut self, out: &mut [f32]) {
        self.mixer
            .mix(&mut self.registry, &mut self.controls, self.now, out);
        self.now += out.len() as u64;
    }

    pub fn fill(&mut self, out: &mut [i16]) {
        self.mixer
            .mix_i16(&mut self.registry, &mut self.controls, self.now, out);
        self.now += out.len() as u64;
    }
}

/// The event-ingestion half. Lives on whatever thread reads MIDI.
pub struct EventSender {
    pub(crate) router: Router,
    pub(crate) producer: HeapProducer<Command>,
}

impl EventSender {
    /// Route an event to the audio side. It takes effect at the start of the
    /// next rendered buffer.
    pub fn send(&mut self, event: Event) -> Result<Flow> {
        let EventSender { router, producer } = self;
        router.route(event, |command| {
            producer.push(command).map_err(|command| {
                warn!("command queue full, dropping {command:?}");
                SynthError::QueueFull
            })
        })
    }

    pub fn is_held(&self, key: u8) -> bool {
        self.router.is_held(key)
    }
}

/// The audio half. Lives in the audio callback.
pub struct AudioRenderer {
    pub(crate) engine: Engine,
    pub(crate) consumer: HeapConsumer<Command>,
    pub(crate) rejected: u64,
}

impl AudioRenderer {
    fn drain(&mut self) {
        while let Some(command) = self.consumer.pop() {
            if self.engine.apply(command).is_err() {
                self.rejected += 1;
            }
        }
    }

    /// Fill a buffer of 16-bit samples.
    pub fn fill(&mut self, out: &mut [i16]) {
        self.drain();
        self.engine.fill(out);
    }

    /// Fill a buffer of float samples in `-1..=1`.
    pub fn fill_f32(&mut self, out: &mut [f32]) {
        self.drain();
        self.engine.fill_f32(out);
    }

    pub fn active_voices(&self) -> usize {
        self.engine.registry.active_count()
    }

    /// Voices evicted so far because the arena was full.
    pub fn stolen_voices(&self) -> u64 {
        self.engine.registry.stolen_count()
    }

    /// Queued commands the engine refused, such as a note-on for a key
    /// outside the keyboard.
    pub fn rejected_commands(&self) -> u64 {
        self.rejected
    }
}
