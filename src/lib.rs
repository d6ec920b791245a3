// Pianofall - Library exports for tests and benchmarks

pub mod audio;
pub mod config;
pub mod instrument;
pub mod messaging;
pub mod score;
pub mod sequencer;
pub mod synth;
pub mod ui;

// Re-export commonly used types for convenience
pub use audio::engine::{AudioEngine, EngineError, EngineSettings};
pub use config::{ConfigError, PlayerConfig};
pub use instrument::{Cue, InstrumentError, InstrumentPort, SynthInstrument, VirtualInstrument};
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use score::{LoadError, NoteEvent, NoteModel, RawNote, load_bytes, load_file};
pub use sequencer::{
    ClockPublisher, ClockReader, PlayOutcome, Transport, TransportError, TransportStatus,
};
pub use synth::envelope::AdsrParams;
pub use synth::voice_manager::VoiceManager;
