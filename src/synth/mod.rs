// Synthesis - Piano-like voices and polyphony

pub mod envelope;
pub mod voice;
pub mod voice_manager;

pub use envelope::AdsrParams;
pub use voice_manager::VoiceManager;
