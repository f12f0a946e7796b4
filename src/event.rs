//! The note/control event stream the engine consumes.

use log::debug;

use crate::control::Knob;
use crate::error::Result;

/// Controller number of the MIDI "all notes off" channel mode message.
pub const ALL_NOTES_OFF: u8 = 123;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
}

impl Event {
    /// Decode a raw MIDI channel message, on any channel. A note-on with
    /// velocity 0 is a note-off. Anything else yields `None`.
    pub fn from_midi(message: &[u8]) -> Option<Event> {
        let (&status, data) = message.split_first()?;
        let (a, b) = match data {
            [a, b, ..] if a & 0x80 == 0 && b & 0x80 == 0 => (*a, *b),
            _ => return None,
        };
        match status & 0xf0 {
            0x80 => Some(Event::NoteOff {
                key: a,
                velocity: b,
            }),
            0x90 if b == 0 => Some(Event::NoteOff {
                key: a,
                velocity: 64,
            }),
            0x90 => Some(Event::NoteOn {
                key: a,
                velocity: b,
            }),
            0xb0 => Some(Event::ControlChange {
                controller: a,
                value: b,
            }),
            _ => None,
        }
    }

    /// Like [`Event::from_midi`], logging what gets dropped.
    pub fn from_midi_logged(message: &[u8]) -> Option<Event> {
        let event = Event::from_midi(message);
        if event.is_none() {
            debug!("ignoring MIDI message {message:02x?}");
        }
        event
    }
}

/// Normalize a 7-bit MIDI value to `0..=1`.
pub fn unit(value: u8) -> f32 {
    value.min(127) as f32 / 127.0
}

/// What a control-change means to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Route {
    Knob(Knob, f32),
    /// Release everything, keep listening.
    AllNotesOff,
    /// Release everything and stop listening for events. Sent when the stop
    /// controller reaches zero: a knob turned all the way down, or a button
    /// let go.
    Stop,
    Ignored,
}

/// Controller number to knob table, built from configuration.
#[derive(Debug, Clone)]
pub struct ControllerMap {
    knobs: [Option<Knob>; 128],
    stop: Option<u8>,
}

impl ControllerMap {
    /// Fails on a knob name the engine does not know.
    pub fn new(mapping: &[(u8, String)], stop: Option<u8>) -> Result<Self> {
        let mut knobs = [None; 128];
        for (controller, name) in mapping {
            let knob = name.parse::<Knob>()?;
            if let Some(slot) = knobs.get_mut(*controller as usize) {
                *slot = Some(knob);
            }
        }
        Ok(Self { knobs, stop })
    }

    pub fn route(&self, controller: u8, value: u8) -> Route {
        if Some(controller) == self.stop {
            return if value == 0 {
                Route::Stop
            } else {
                Route::Ignored
            };
        }
        if controller == ALL_NOTES_OFF {
            return Route::AllNotesOff;
        }
        match self.knobs.get(controller as usize).copied().flatten() {
            Some(knob) => Route::Knob(knob, unit(value)),
            None => {
                debug!("ignoring unmapped controller {controller} = {value}");
                Route::Ignored
            }
        }
    }
}
