// Voice Manager - Polyphony handling

use super::envelope::AdsrParams;
use super::voice::Voice;

/// Enough for sustained two-hand passages with overlapping releases
pub const MAX_VOICES: usize = 48;

/// Output gain applied to the voice mix
const MIX_GAIN: f32 = 0.2;

pub struct VoiceManager {
    voices: [Voice; MAX_VOICES],
    /// Age counter incremented on each note_on for voice stealing priority
    age_counter: u64,
}

impl VoiceManager {
    pub fn new(sample_rate: f32) -> Self {
        // Pre-allocate all voices
        let voices = std::array::from_fn(|_| Voice::new(sample_rate));

        Self {
            voices,
            age_counter: 0,
        }
    }

    /// Strike a key. Every strike gets its own voice, even for a key already sounding.
    pub fn note_on(&mut self, note: u8, velocity: u8) {
        self.age_counter = self.age_counter.wrapping_add(1);

        if let Some(voice) = self.voices.iter_mut().find(|v| !v.is_active()) {
            voice.note_on(note, velocity, self.age_counter);
            return;
        }

        let victim = self.find_voice_to_steal();
        self.voices[victim].note_on(note, velocity, self.age_counter);
    }

    /// Releasing voices first, then the oldest one
    fn find_voice_to_steal(&self) -> usize {
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, voice)| (!voice.is_releasing(), voice.age()))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    /// Release the oldest held voice of this key
    ///
    /// Overlapping strikes of one key are released one at a time, so the
    /// later strike keeps sounding until its own release.
    pub fn note_off(&mut self, note: u8) {
        let oldest = self
            .voices
            .iter_mut()
            .filter(|voice| voice.is_held() && voice.note() == note)
            .min_by_key(|voice| voice.age());

        if let Some(voice) = oldest {
            voice.note_off();
        }
    }

    pub fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut().filter(|voice| voice.is_held()) {
            voice.note_off();
        }
    }

    pub fn set_adsr(&mut self, params: AdsrParams) {
        for voice in &mut self.voices {
            voice.set_adsr(params);
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        self.voices.iter_mut().map(|v| v.next_sample()).sum::<f32>() * MIX_GAIN
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn held_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_held()).count()
    }
}
