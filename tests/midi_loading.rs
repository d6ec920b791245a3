// Integration test: MIDI files from disk to playback
//
// Files are assembled byte by byte so the expected timings are known exactly.

use pianofall::{LoadError, Transport, TransportStatus, VirtualInstrument, load_bytes, load_file};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use tempfile::NamedTempFile;

/// 480 ticks as a variable-length quantity
const QUARTER: [u8; 2] = [0x83, 0x60];

/// Format-1 file, 480 ticks per quarter note
fn smf_bytes(tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = b"MThd".to_vec();
    bytes.extend_from_slice(&6u32.to_be_bytes());
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&480u16.to_be_bytes());

    for body in tracks {
        let mut body = body.clone();
        body.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&body);
    }
    bytes
}

/// Tempo track at 60 BPM, a named piano track and a second melodic track
fn two_track_piece() -> Vec<u8> {
    let tempo = vec![0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40];

    let mut piano = vec![0x00, 0xFF, 0x03, 0x05];
    piano.extend_from_slice(b"Piano");
    piano.extend_from_slice(&[0x00, 0x90, 60, 100]);
    piano.extend_from_slice(&QUARTER);
    piano.extend_from_slice(&[0x80, 60, 0]);

    let mut melody = QUARTER.to_vec();
    melody.extend_from_slice(&[0x90, 64, 100]);
    melody.extend_from_slice(&QUARTER);
    melody.extend_from_slice(&[0x80, 64, 0]);

    smf_bytes(&[tempo, piano, melody])
}

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".mid")
        .tempfile()
        .unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_tracks_merge_into_one_timeline() {
    let model = load_bytes(&two_track_piece()).unwrap();

    assert_eq!(model.track_count(), 3);
    assert_eq!(model.len(), 2);
    assert_eq!(model.base_tempo(), 60.0);
    assert_eq!(model.name(), Some("Piano"));

    let notes: Vec<(u8, f64, f64)> = model
        .events()
        .iter()
        .map(|note| (note.pitch, note.start_time, note.duration))
        .collect();
    assert_eq!(notes, vec![(60, 0.0, 1.0), (64, 1.0, 1.0)]);
    assert_eq!(model.total_duration(), 2.0);
}

#[test]
fn test_load_file_names_the_piece_after_the_file() {
    let file = write_temp(&two_track_piece());

    let model = load_file(file.path()).unwrap();

    let expected = file.path().file_name().unwrap().to_string_lossy();
    assert_eq!(model.name(), Some(&*expected));
    assert_eq!(model.len(), 2);
}

#[test]
fn test_loaded_file_plays_to_the_end() {
    let file = write_temp(&two_track_piece());
    let mut transport = Transport::new(VirtualInstrument::new());
    transport.load(load_file(file.path()).unwrap());

    assert_eq!(transport.effective_tempo(), 60.0);
    transport.play().unwrap();

    let mut heard = Vec::new();
    for _ in 0..12 {
        transport.instrument_mut().advance(0.25);
        transport.update().unwrap();
        heard.push(transport.active_notes().pitches());
    }

    assert!(heard.contains(&vec![60]));
    assert!(heard.contains(&vec![64]));
    assert_eq!(transport.status(), TransportStatus::Stopped);
    assert_eq!(transport.current_position(), 2.0);
}

#[test]
fn test_not_a_midi_file() {
    let file = write_temp(b"ID3\x03\x00 definitely an mp3");

    assert!(matches!(
        load_file(file.path()),
        Err(LoadError::InvalidFile(_))
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        load_file(&dir.path().join("gone.mid")),
        Err(LoadError::Io(_))
    ));
}

/// Truncated and corrupted files must fail cleanly, never panic
#[test]
fn test_damaged_files_never_panic() {
    let mut rng = StdRng::seed_from_u64(42);
    let original = two_track_piece();

    for len in 0..original.len() {
        let _ = load_bytes(&original[..len]);
    }

    for _ in 0..500 {
        let mut bytes = original.clone();
        for _ in 0..rng.gen_range(1..8) {
            let index = rng.gen_range(0..bytes.len());
            bytes[index] = rng.r#gen();
        }
        if let Ok(model) = load_bytes(&bytes) {
            assert!(model.events().iter().all(|note| note.duration > 0.0));
            assert!(model.total_duration().is_finite());
        }
    }
}
