// Envelope - Amplitude shape of a piano voice
//
// Fast linear attack, long exponential-looking decay towards a low sustain
// level (a held piano string keeps fading), linear release on key up.

/// Envelope parameters, times in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl AdsrParams {
    /// Create parameters with validation
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.clamp(0.001, 5.0),
            decay: decay.clamp(0.001, 10.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.clamp(0.001, 5.0),
        }
    }

    /// Same shape with a different release time
    pub fn with_release(self, release: f32) -> Self {
        Self::new(self.attack, self.decay, self.sustain, release)
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 1.5,
            sustain: 0.25,
            release: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvelopeState {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

pub struct AdsrEnvelope {
    params: AdsrParams,
    state: EnvelopeState,
    current_value: f32,
    sample_rate: f32,

    attack_samples: f32,
    decay_samples: f32,
    release_samples: f32,
    current_sample: f32,
    /// Level the release phase started from
    release_start: f32,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        let mut envelope = Self {
            params,
            state: EnvelopeState::Idle,
            current_value: 0.0,
            sample_rate,
            attack_samples: 0.0,
            decay_samples: 0.0,
            release_samples: 0.0,
            current_sample: 0.0,
            release_start: 0.0,
        };
        envelope.update_sample_counts();
        envelope
    }

    fn update_sample_counts(&mut self) {
        self.attack_samples = self.params.attack * self.sample_rate;
        self.decay_samples = self.params.decay * self.sample_rate;
        self.release_samples = self.params.release * self.sample_rate;
    }

    pub fn set_params(&mut self, params: AdsrParams) {
        self.params = params;
        self.update_sample_counts();
    }

    pub fn params(&self) -> AdsrParams {
        self.params
    }

    /// Start the attack phase from silence
    pub fn note_on(&mut self) {
        self.state = EnvelopeState::Attack;
        self.current_sample = 0.0;
        self.current_value = 0.0;
    }

    /// Start the release phase from the current level
    pub fn note_off(&mut self) {
        if !matches!(self.state, EnvelopeState::Idle | EnvelopeState::Release) {
            self.state = EnvelopeState::Release;
            self.current_sample = 0.0;
            self.release_start = self.current_value;
        }
    }

    /// Advance one sample, returns a gain in [0, 1]
    pub fn process(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Idle => {
                self.current_value = 0.0;
            }

            EnvelopeState::Attack => {
                self.current_sample += 1.0;
                self.current_value = (self.current_sample / self.attack_samples).min(1.0);

                if self.current_sample >= self.attack_samples {
                    self.state = EnvelopeState::Decay;
                    self.current_sample = 0.0;
                    self.current_value = 1.0;
                }
            }

            EnvelopeState::Decay => {
                self.current_sample += 1.0;
                let progress = (self.current_sample / self.decay_samples).min(1.0);
                // Quadratic fall approximates the string's exponential decay
                let remaining = (1.0 - progress) * (1.0 - progress);
                self.current_value =
                    self.params.sustain + (1.0 - self.params.sustain) * remaining;

                if self.current_sample >= self.decay_samples {
                    self.state = EnvelopeState::Sustain;
                    self.current_value = self.params.sustain;
                }
            }

            EnvelopeState::Sustain => {
                self.current_value = self.params.sustain;
            }

            EnvelopeState::Release => {
                self.current_sample += 1.0;
                let progress = (self.current_sample / self.release_samples).min(1.0);
                self.current_value = self.release_start * (1.0 - progress);

                if self.current_sample >= self.release_samples {
                    self.state = EnvelopeState::Idle;
                    self.current_value = 0.0;
                }
            }
        }

        self.current_value
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, EnvelopeState::Idle)
    }

    pub fn is_releasing(&self) -> bool {
        matches!(self.state, EnvelopeState::Release)
    }

    pub fn current_value(&self) -> f32 {
        self.current_value
    }

    pub fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.current_value = 0.0;
        self.current_sample = 0.0;
    }
}
