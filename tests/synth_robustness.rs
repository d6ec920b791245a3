//! Robustness of the real-time side
//!
//! Extreme note patterns must never produce NaN, infinities or samples
//! outside [-1, 1] at the output.

use pianofall::audio::engine::{EngineSettings, Renderer};
use pianofall::audio::parameters::AtomicF32;
use pianofall::create_command_channel;
use pianofall::messaging::command::Command;
use pianofall::synth::voice_manager::{MAX_VOICES, VoiceManager};
use ringbuf::traits::Producer;

const SAMPLE_RATE: f32 = 48000.0;

/// Test voice manager with more strikes than voices
#[test]
fn test_voice_manager_max_polyphony() {
    let mut voice_manager = VoiceManager::new(SAMPLE_RATE);

    // Every key of the piano at once
    for pitch in 21..=108u8 {
        voice_manager.note_on(pitch, 100);
    }

    for _ in 0..1000 {
        let sample = voice_manager.next_sample();
        assert!(sample.is_finite());
    }

    assert_eq!(voice_manager.active_voice_count(), MAX_VOICES);
}

/// Test voice manager with rapid note on/off of one key
#[test]
fn test_voice_manager_rapid_triggering() {
    let mut voice_manager = VoiceManager::new(SAMPLE_RATE);

    for _ in 0..500 {
        voice_manager.note_on(60, 100);
        let _ = voice_manager.next_sample();
        voice_manager.note_off(60);
        let _ = voice_manager.next_sample();
    }

    assert!(voice_manager.active_voice_count() <= MAX_VOICES);
    assert_eq!(voice_manager.held_voice_count(), 0);
}

/// Full renderer: dense chords at full volume stay in range
#[test]
fn test_renderer_output_stays_in_range() {
    let (mut tx, rx) = create_command_channel(1024);
    let mut renderer = Renderer::new(
        SAMPLE_RATE,
        rx,
        AtomicF32::new(1.0),
        EngineSettings::default(),
    );

    let mut buffer = vec![0.0f32; 512 * 2];
    for chord in 0..50u8 {
        let root = 21 + (chord * 5) % 80;
        for offset in [0, 4, 7, 12, 16] {
            let _ = tx.try_push(Command::NoteOn {
                pitch: root + offset,
                velocity: 127,
            });
        }

        renderer.render(&mut buffer, 2);
        for sample in &buffer {
            assert!(sample.is_finite());
            assert!((-1.0..=1.0).contains(sample));
        }

        if chord % 3 == 0 {
            let _ = tx.try_push(Command::AllNotesOff);
        }
    }
}

/// Volume changes and silence never leave denormals behind
#[test]
fn test_silence_after_release_is_clean() {
    let (mut tx, rx) = create_command_channel(64);
    let mut renderer = Renderer::new(
        SAMPLE_RATE,
        rx,
        AtomicF32::new(0.7),
        EngineSettings {
            release_seconds: 0.05,
            ..EngineSettings::default()
        },
    );

    let _ = tx.try_push(Command::NoteOn {
        pitch: 69,
        velocity: 100,
    });
    let _ = tx.try_push(Command::SetVolume(f32::MAX));
    let mut buffer = vec![0.0f32; 4800];
    renderer.render(&mut buffer, 1);
    assert!(buffer.iter().all(|s| s.is_finite() && s.abs() <= 1.0));

    let _ = tx.try_push(Command::NoteOff { pitch: 69 });
    for _ in 0..10 {
        renderer.render(&mut buffer, 1);
    }

    assert_eq!(renderer.active_voice_count(), 0);
    assert!(buffer.iter().all(|s| *s == 0.0 || s.is_normal()));
}
