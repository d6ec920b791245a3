// MIDI file loading - Standard MIDI File bytes to NoteModel
// Ticks are resolved to seconds with the file's tempo map at load time

use super::{NoteModel, RawNote};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

/// Microseconds per quarter note when a file declares no tempo (120 BPM)
const DEFAULT_MICROS_PER_BEAT: f64 = 500_000.0;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Invalid MIDI file: {0}")]
    InvalidFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read and decode a MIDI file; the file name becomes the model's name
pub fn load_file(path: &Path) -> Result<NoteModel, LoadError> {
    let bytes = std::fs::read(path)?;
    let model = load_bytes(&bytes)?;

    let model = match path.file_name() {
        Some(name) => model.with_name(name.to_string_lossy()),
        None => model,
    };

    tracing::info!(
        path = %path.display(),
        notes = model.len(),
        duration = model.total_duration(),
        "MIDI file loaded"
    );

    Ok(model)
}

/// Decode a MIDI file already in memory
pub fn load_bytes(bytes: &[u8]) -> Result<NoteModel, LoadError> {
    let smf = Smf::parse(bytes).map_err(|e| LoadError::InvalidFile(e.to_string()))?;

    let tempo_map = TempoMap::from_smf(&smf)?;
    let mut tracks = Vec::with_capacity(smf.tracks.len());
    let mut track_name = None;

    for track in &smf.tracks {
        let mut notes = Vec::new();
        // Open note-ons per (channel, key), first in first out
        let mut open: HashMap<(u8, u8), VecDeque<u64>> = HashMap::new();
        let mut tick: u64 = 0;

        for event in track {
            tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open.entry((channel, key.as_int()))
                                .or_default()
                                .push_back(tick);
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let pending = open.get_mut(&(channel, key.as_int()));
                            if let Some(start_tick) = pending.and_then(VecDeque::pop_front) {
                                notes.push(tempo_map.note(key.as_int(), start_tick, tick));
                            }
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) if track_name.is_none() => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    if !name.is_empty() {
                        track_name = Some(name);
                    }
                }
                _ => {}
            }
        }

        // Notes never switched off ring until the end of their track
        for ((_, key), starts) in open {
            for start_tick in starts {
                notes.push(tempo_map.note(key, start_tick, tick));
            }
        }
        notes.sort_by(|a, b| a.start.total_cmp(&b.start));

        tracks.push(notes);
    }

    let model = NoteModel::from_tracks(tracks, tempo_map.initial_bpm());
    tracing::debug!(
        tracks = model.track_count(),
        notes = model.len(),
        bpm = model.base_tempo(),
        "decoded MIDI data"
    );

    Ok(match track_name {
        Some(name) => model.with_name(name),
        None => model,
    })
}

/// One tempo segment starting at `tick`
#[derive(Debug, Clone, Copy)]
struct TempoSegment {
    tick: u64,
    seconds: f64,
    seconds_per_tick: f64,
}

/// Piecewise-linear tick to seconds conversion
#[derive(Debug)]
struct TempoMap {
    segments: Vec<TempoSegment>,
    initial_bpm: Option<f64>,
}

impl TempoMap {
    fn from_smf(smf: &Smf<'_>) -> Result<Self, LoadError> {
        let mut changes: Vec<(u64, f64)> = Vec::new();
        for track in &smf.tracks {
            let mut tick: u64 = 0;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(micros)) = event.kind {
                    changes.push((tick, micros.as_int() as f64));
                }
            }
        }
        changes.sort_by_key(|(tick, _)| *tick);

        let initial_bpm = changes
            .first()
            .filter(|(_, micros)| *micros > 0.0)
            .map(|(_, micros)| 60_000_000.0 / micros);

        let segments = match smf.header.timing {
            Timing::Metrical(ticks_per_beat) => {
                let ticks_per_beat = ticks_per_beat.as_int() as f64;
                if ticks_per_beat <= 0.0 {
                    return Err(LoadError::InvalidFile(
                        "header declares zero ticks per quarter note".to_string(),
                    ));
                }
                Self::metrical_segments(&changes, ticks_per_beat)
            }
            Timing::Timecode(fps, subframes) => {
                let frames_per_second = match fps {
                    midly::Fps::Fps24 => 24.0,
                    midly::Fps::Fps25 => 25.0,
                    midly::Fps::Fps29 => 29.97,
                    midly::Fps::Fps30 => 30.0,
                };
                let ticks_per_second = frames_per_second * subframes.max(1) as f64;
                vec![TempoSegment {
                    tick: 0,
                    seconds: 0.0,
                    seconds_per_tick: 1.0 / ticks_per_second,
                }]
            }
        };

        Ok(Self {
            segments,
            initial_bpm,
        })
    }

    fn metrical_segments(changes: &[(u64, f64)], ticks_per_beat: f64) -> Vec<TempoSegment> {
        let mut segments = vec![TempoSegment {
            tick: 0,
            seconds: 0.0,
            seconds_per_tick: DEFAULT_MICROS_PER_BEAT / 1_000_000.0 / ticks_per_beat,
        }];

        for &(tick, micros) in changes {
            if micros <= 0.0 {
                continue;
            }
            let seconds_per_tick = micros / 1_000_000.0 / ticks_per_beat;
            let last = segments[segments.len() - 1];

            if tick == last.tick {
                // Later change at the same tick wins
                let len = segments.len();
                segments[len - 1].seconds_per_tick = seconds_per_tick;
            } else {
                segments.push(TempoSegment {
                    tick,
                    seconds: last.seconds + (tick - last.tick) as f64 * last.seconds_per_tick,
                    seconds_per_tick,
                });
            }
        }

        segments
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let index = self
            .segments
            .partition_point(|segment| segment.tick <= tick)
            .saturating_sub(1);
        let segment = self.segments[index];
        segment.seconds + (tick - segment.tick) as f64 * segment.seconds_per_tick
    }

    fn note(&self, pitch: u8, start_tick: u64, end_tick: u64) -> RawNote {
        let start = self.seconds_at(start_tick);
        RawNote::new(pitch, start, self.seconds_at(end_tick) - start)
    }

    fn initial_bpm(&self) -> Option<f64> {
        self.initial_bpm
    }
}
