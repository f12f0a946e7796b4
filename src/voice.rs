//! Sounding notes and the bookkeeping of which keys own them.

use slotmap::SlotMap;

use crate::envelope::{Adsr, AdsrEnvelope};
use crate::error::{Result, SynthError};
use crate::osc::{Generator, GeneratorKind, Modulation, Oscillator};
use crate::tuning::{FrequencyTable, KEY_COUNT};

/// One sounding note.
#[derive(Debug, Clone)]
pub struct Voice {
    /// The key that started the note.
    key: u8,
    /// Note-on velocity in `0..=1`.
    velocity: f32,
    /// Samples rendered so far.
    time: u64,
    /// Start order, used to pick a voice to steal.
    serial: u64,
    generator: Generator,
    envelope: AdsrEnvelope,
}

impl Voice {
    pub fn new(key: u8, velocity: f32, generator: Generator, adsr: Adsr) -> Self {
        Self {
            key,
            velocity: velocity.clamp(0.0, 1.0),
            time: 0,
            serial: 0,
            generator,
            envelope: AdsrEnvelope::new(adsr),
        }
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn release(&mut self, velocity: f32) {
        self.envelope.release(velocity);
    }

    pub fn is_done(&self) -> bool {
        self.envelope.is_done()
    }

    /// **Add** this voice's next `out.len()` samples to `out`. `gains` and
    /// `samples` are scratch space of the same length. Returns whether the
    /// voice finished within the block.
    pub fn render(
        &mut self,
        out: &mut [f32],
        gains: &mut [f32],
        samples: &mut [f32],
        modulation: &Modulation,
    ) -> bool {
        debug_assert!(gains.len() == out.len() && samples.len() == out.len());
        if self.envelope.is_done() {
            return true;
        }
        let done = self.envelope.fill_gains(gains);
        self.generator.fill_samples(samples, self.time, modulation);
        for ((out, gain), sample) in out.iter_mut().zip(gains.iter()).zip(samples.iter()) {
            *out += sample * gain * self.velocity;
        }
        self.time += out.len() as u64;
        done
    }
}

/// Everything needed to start a voice for a key.
#[derive(Debug, Clone)]
pub struct VoiceFactory {
    pub table: FrequencyTable,
    pub generator: GeneratorKind,
    pub adsr: Adsr,
}

impl VoiceFactory {
    pub fn create(&self, key: u8, velocity: f32) -> Voice {
        let freq = self.table.frequency(key);
        Voice::new(key, velocity, self.generator.instantiate(freq), self.adsr)
    }
}

slotmap::new_key_type! {
    pub struct VoiceId;
}

/// Held keys and sounding voices.
///
/// A released voice leaves `keymap` at once but stays in `active` until its
/// envelope is done. Every id in `keymap` is in `active`.
pub struct VoiceRegistry {
    factory: VoiceFactory,
    keymap: [Option<VoiceId>; KEY_COUNT],
    active: SlotMap<VoiceId, Voice>,
    capacity: usize,
    next_serial: u64,
    stolen: u64,
}

impl VoiceRegistry {
    /// `capacity` voices are preallocated; it is raised to at least one voice
    /// per key.
    pub fn new(factory: VoiceFactory, capacity: usize) -> Self {
        let capacity = capacity.max(KEY_COUNT);
        Self {
            factory,
            keymap: [None; KEY_COUNT],
            active: SlotMap::with_capacity_and_key(capacity),
            capacity,
            next_serial: 0,
            stolen: 0,
        }
    }

    pub fn note_on(&mut self, key: u8, velocity: f32) -> Result<VoiceId> {
        let slot = self
            .keymap
            .get(key as usize)
            .ok_or(SynthError::InvalidKey(key))?;
        if slot.is_some() {
            return Err(SynthError::DuplicateKey(key));
        }

        if self.active.len() >= self.capacity {
            self.steal_oldest_released();
        }

        let mut voice = self.factory.create(key, velocity);
        voice.serial = self.next_serial;
        self.next_serial += 1;
        let id = self.active.insert(voice);
        self.keymap[key as usize] = Some(id);
        Ok(id)
    }

    /// Release the voice held by `key`. Returns `false` if the key was not
    /// held.
    pub fn note_off(&mut self, key: u8, velocity: f32) -> bool {
        let Some(id) = self.keymap.get_mut(key as usize).and_then(Option::take) else {
            return false;
        };
        match self.active.get_mut(id) {
            Some(voice) => voice.release(velocity),
            None => debug_assert!(false, "held key {key} has no active voice"),
        }
        true
    }

    /// Release every held key at full velocity.
    pub fn panic_stop(&mut self) {
        for slot in self.keymap.iter_mut() {
            if let Some(id) = slot.take() {
                if let Some(voice) = self.active.get_mut(id) {
                    voice.release(1.0);
                }
            }
        }
    }

    pub fn is_held(&self, key: u8) -> bool {
        matches!(self.keymap.get(key as usize), Some(Some(_)))
    }

    pub fn held_count(&self) -> usize {
        self.keymap.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of voices still producing sound, releasing ones included.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// How many voices were cut short because the registry was full.
    pub fn stolen_count(&self) -> u64 {
        self.stolen
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.active.get(id)
    }

    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.active.values_mut()
    }

    /// Drop every voice whose envelope is done.
    pub fn retain_sounding(&mut self) {
        self.active.retain(|_, voice| !voice.is_done());
        debug_assert!(self
            .keymap
            .iter()
            .flatten()
            .all(|id| self.active.contains_key(*id)));
    }

    fn steal_oldest_released(&mut self) {
        let oldest = self
            .active
            .iter()
            .filter(|(_, voice)| voice.envelope.is_releasing())
            .min_by_key(|(_, voice)| voice.serial)
            .map(|(id, _)| id);
        if let Some(id) = oldest {
            self.active.remove(id);
            self.stolen += 1;
        }
    }
}
