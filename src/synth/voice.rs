// Voice - One struck piano key

use super::envelope::{AdsrEnvelope, AdsrParams};
use std::f32::consts::TAU;

/// Number of harmonic partials summed per voice
const PARTIALS: usize = 6;

/// Relative amplitude of each partial
const PARTIAL_GAINS: [f32; PARTIALS] = [1.0, 0.45, 0.25, 0.12, 0.07, 0.04];

/// Slight stretch of the upper partials, as in a real string
const INHARMONICITY: f32 = 0.0004;

/// Convert a MIDI key number to its frequency (A4 = 440 Hz)
pub fn midi_to_frequency(pitch: u8) -> f32 {
    440.0 * 2_f32.powf((pitch as f32 - 69.0) / 12.0)
}

pub struct Voice {
    phases: [f32; PARTIALS],
    increments: [f32; PARTIALS],
    /// Per-sample decay applied to the upper partials, brighter at the strike
    brightness: f32,
    brightness_decay: f32,
    envelope: AdsrEnvelope,
    note: u8,
    velocity: f32,
    held: bool,
    sample_rate: f32,
    /// Age counter for voice stealing priority (lower = older)
    age: u64,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phases: [0.0; PARTIALS],
            increments: [0.0; PARTIALS],
            brightness: 0.0,
            // About 0.4s to lose most of the upper harmonics
            brightness_decay: (-1.0 / (0.4 * sample_rate)).exp(),
            envelope: AdsrEnvelope::new(AdsrParams::default(), sample_rate),
            note: 0,
            velocity: 0.0,
            held: false,
            sample_rate,
            age: 0,
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: u8, age: u64) {
        self.note = note;
        self.velocity = velocity as f32 / 127.0;
        self.held = true;
        self.age = age;

        let fundamental = midi_to_frequency(note);
        let nyquist = self.sample_rate * 0.5;
        for (index, increment) in self.increments.iter_mut().enumerate() {
            let n = (index + 1) as f32;
            let frequency = fundamental * n * (1.0 + INHARMONICITY * n * n).sqrt();
            // Partials above Nyquist would alias, leave them silent
            *increment = if frequency < nyquist {
                frequency / self.sample_rate
            } else {
                0.0
            };
        }
        self.phases = [0.0; PARTIALS];
        self.brightness = 1.0;

        self.envelope.note_on();
    }

    pub fn note_off(&mut self) {
        self.held = false;
        self.envelope.note_off();
    }

    /// Voice is active while its envelope runs, release included
    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    /// Key is down (not yet released)
    pub fn is_held(&self) -> bool {
        self.held && self.envelope.is_active()
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn set_adsr(&mut self, params: AdsrParams) {
        self.envelope.set_params(params);
    }

    pub fn next_sample(&mut self) -> f32 {
        if !self.envelope.is_active() {
            return 0.0;
        }

        let envelope_value = self.envelope.process();

        let mut sample = 0.0;
        for index in 0..PARTIALS {
            if self.increments[index] == 0.0 {
                continue;
            }
            let gain = if index == 0 {
                PARTIAL_GAINS[0]
            } else {
                PARTIAL_GAINS[index] * (0.3 + 0.7 * self.brightness)
            };
            sample += (self.phases[index] * TAU).sin() * gain;

            self.phases[index] += self.increments[index];
            if self.phases[index] >= 1.0 {
                self.phases[index] -= 1.0;
            }
        }
        self.brightness *= self.brightness_decay;

        sample * self.velocity * envelope_value
    }
}
