// Instrument - Sound-producing side of the transport
// Attack/release by pitch, a time-based cue scheduler and the transport clock

pub mod scheduler;
pub mod synth;
pub mod virtual_instrument;

pub use scheduler::{CueQueue, TransportClock};
pub use synth::SynthInstrument;
pub use virtual_instrument::{InstrumentCall, VirtualInstrument};

use crate::audio::engine::EngineError;
use crate::score::{FIRST_KEY, LAST_KEY};

/// Opaque identifier of a scheduled cue
pub type CueHandle = u64;

/// What happens when a scheduled cue fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Attack { pitch: u8 },
    Release { pitch: u8 },
    /// Terminal cue of a schedule, playback is over
    End,
}

impl Cue {
    /// Order of cues sharing a fire time: releases, then attacks, then the end
    pub fn rank(&self) -> u8 {
        match self {
            Cue::Release { .. } => 0,
            Cue::Attack { .. } => 1,
            Cue::End => 2,
        }
    }
}

/// Result of a warm-up request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmUp {
    Ready,
    /// Output is still being brought up, ask again later
    Pending,
}

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Contract between the transport and whatever makes the sound
///
/// Times are positions on the musical timeline in seconds. The port owns the
/// transport clock: `start` anchors it at a position, `set_rate` changes how
/// fast it advances from now on, `stop` freezes it. Cues registered with
/// `schedule` come back from `take_due` once the clock reaches them, in fire
/// time order; cancelled cues never come back.
pub trait InstrumentPort {
    /// One-time preparation of the sound output. Idempotent.
    fn warm_up(&mut self) -> Result<WarmUp, InstrumentError>;

    fn attack(&mut self, pitch: u8, at: f64);

    fn release(&mut self, pitch: u8, at: f64);

    /// Release every key of the keyboard
    fn release_all(&mut self, at: f64) {
        for pitch in FIRST_KEY..=LAST_KEY {
            self.release(pitch, at);
        }
    }

    fn schedule(&mut self, cue: Cue, at: f64) -> CueHandle;

    /// Returns false when the handle was unknown or already fired
    fn cancel(&mut self, handle: CueHandle) -> bool;

    fn cancel_all(&mut self);

    fn set_rate(&mut self, rate: f64);

    fn start(&mut self, from: f64);

    /// Freeze the clock and return the position it stopped at
    fn stop(&mut self) -> f64;

    /// Current transport clock position
    fn seconds(&self) -> f64;

    /// Remove and return every cue whose fire time has been reached
    fn take_due(&mut self) -> Vec<(CueHandle, Cue)>;
}
