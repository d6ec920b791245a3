// Score - Immutable note model of a loaded piece
// Tracks are merged into one start-ordered sequence, timing already in seconds

pub mod loader;

pub use loader::{LoadError, load_bytes, load_file};

/// Lowest key of an 88-key piano (A0)
pub const FIRST_KEY: u8 = 21;
/// Highest key of an 88-key piano (C8)
pub const LAST_KEY: u8 = 108;

/// Tempo used when the source does not declare one
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Check if a pitch lies on the 88-key keyboard
pub fn is_on_keyboard(pitch: u8) -> bool {
    (FIRST_KEY..=LAST_KEY).contains(&pitch)
}

/// Check if a pitch is a black key (C#, D#, F#, G#, A#)
pub fn is_black_key(pitch: u8) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}

/// Note name with octave, e.g. "C4" for 60 or "A#0" for 22
pub fn note_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// Pitch class letter without accidental ("C" for both C and C#)
pub fn pitch_letter(pitch: u8) -> &'static str {
    let name = NOTE_NAMES[(pitch % 12) as usize];
    &name[..1]
}

/// One note as it comes out of a decoded track, before validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawNote {
    pub pitch: u8,
    pub start: f64,
    pub duration: f64,
}

impl RawNote {
    pub fn new(pitch: u8, start: f64, duration: f64) -> Self {
        Self {
            pitch,
            start,
            duration,
        }
    }
}

/// A played note on the musical timeline (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    /// MIDI key number (0-127, 21-108 on the keyboard)
    pub pitch: u8,
    /// Seconds from the start of the piece
    pub start_time: f64,
    /// Seconds, always > 0
    pub duration: f64,
}

impl NoteEvent {
    /// Release time of the note
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Check if the note is sounding at `time` (start inclusive, end exclusive)
    pub fn is_sounding_at(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time()
    }

    fn from_raw(raw: RawNote) -> Option<Self> {
        let schedulable = raw.pitch <= 127
            && raw.start.is_finite()
            && raw.start >= 0.0
            && raw.duration.is_finite()
            && raw.duration > 0.0;

        schedulable.then_some(Self {
            pitch: raw.pitch,
            start_time: raw.start,
            duration: raw.duration,
        })
    }
}

/// A loaded piece. Built once per successful load and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteModel {
    events: Vec<NoteEvent>,
    base_tempo: f64,
    total_duration: f64,
    name: Option<String>,
    track_count: usize,
}

impl NoteModel {
    /// Merge per-track note lists into a single model
    ///
    /// Notes are ordered by start time. The sort is stable, so notes starting
    /// together keep track order and then source order. Notes that cannot be
    /// scheduled (zero or negative duration, negative start, pitch > 127) are
    /// dropped. Identical overlapping notes are kept as they are.
    pub fn from_tracks<T>(tracks: T, base_tempo: Option<f64>) -> Self
    where
        T: IntoIterator,
        T::Item: IntoIterator<Item = RawNote>,
    {
        let mut events = Vec::new();
        let mut track_count = 0;

        for track in tracks {
            track_count += 1;
            events.extend(track.into_iter().filter_map(NoteEvent::from_raw));
        }

        events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let total_duration = events
            .iter()
            .map(NoteEvent::end_time)
            .fold(0.0_f64, f64::max);

        let base_tempo = base_tempo
            .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
            .unwrap_or(DEFAULT_TEMPO_BPM);

        Self {
            events,
            base_tempo,
            total_duration,
            name: None,
            track_count,
        }
    }

    /// Attach a display name (usually the file name)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Beats per minute declared by the source (120 if absent)
    pub fn base_tempo(&self) -> f64 {
        self.base_tempo
    }

    /// Latest release time over all notes, 0 for an empty piece
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn track_count(&self) -> usize {
        self.track_count
    }

    /// Release time of the last note in start order
    ///
    /// This is what the end of playback is measured from, which can be
    /// earlier than `total_duration` when an earlier note rings longer.
    pub fn last_note_end(&self) -> Option<f64> {
        self.events.last().map(NoteEvent::end_time)
    }

    /// Notes overlapping the window `[from, to)`
    pub fn notes_between(&self, from: f64, to: f64) -> impl Iterator<Item = &NoteEvent> + '_ {
        self.events
            .iter()
            .take_while(move |note| note.start_time < to)
            .filter(move |note| note.end_time() > from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sorts_by_start_time() {
        let model = NoteModel::from_tracks(
            vec![
                vec![RawNote::new(60, 1.0, 0.5), RawNote::new(62, 0.0, 0.5)],
                vec![RawNote::new(64, 0.5, 0.5)],
            ],
            Some(100.0),
        );

        let pitches: Vec<u8> = model.events().iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![62, 64, 60]);
        assert_eq!(model.track_count(), 2);
        assert_eq!(model.base_tempo(), 100.0);
    }

    #[test]
    fn test_ties_keep_track_order() {
        let model = NoteModel::from_tracks(
            vec![
                vec![RawNote::new(72, 0.0, 1.0)],
                vec![RawNote::new(48, 0.0, 1.0)],
                vec![RawNote::new(60, 0.0, 1.0)],
            ],
            None,
        );

        let pitches: Vec<u8> = model.events().iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![72, 48, 60]);
    }

    #[test]
    fn test_unschedulable_notes_are_dropped() {
        let model = NoteModel::from_tracks(
            vec![vec![
                RawNote::new(60, 0.0, 0.0),
                RawNote::new(61, 0.0, -1.0),
                RawNote::new(62, -0.5, 1.0),
                RawNote::new(200, 0.0, 1.0),
                RawNote::new(63, f64::NAN, 1.0),
                RawNote::new(64, 0.25, 0.5),
            ]],
            None,
        );

        assert_eq!(model.len(), 1);
        assert_eq!(model.events()[0].pitch, 64);
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let model = NoteModel::from_tracks(
            vec![vec![RawNote::new(60, 0.0, 1.0), RawNote::new(60, 0.0, 1.0)]],
            None,
        );
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_total_duration_is_latest_release() {
        let model = NoteModel::from_tracks(
            vec![vec![RawNote::new(40, 0.0, 10.0), RawNote::new(60, 2.0, 1.0)]],
            None,
        );

        assert_eq!(model.total_duration(), 10.0);
        assert_eq!(model.last_note_end(), Some(3.0));
    }

    #[test]
    fn test_empty_model() {
        let model = NoteModel::from_tracks(Vec::<Vec<RawNote>>::new(), Some(-5.0));

        assert!(model.is_empty());
        assert_eq!(model.total_duration(), 0.0);
        assert_eq!(model.base_tempo(), DEFAULT_TEMPO_BPM);
        assert_eq!(model.last_note_end(), None);
    }

    #[test]
    fn test_notes_between() {
        let model = NoteModel::from_tracks(
            vec![vec![
                RawNote::new(60, 0.0, 1.0),
                RawNote::new(62, 1.0, 1.0),
                RawNote::new(64, 5.0, 1.0),
            ]],
            None,
        );

        let visible: Vec<u8> = model.notes_between(0.5, 4.0).map(|n| n.pitch).collect();
        assert_eq!(visible, vec![60, 62]);
    }

    #[test]
    fn test_key_helpers() {
        assert!(is_on_keyboard(21));
        assert!(is_on_keyboard(108));
        assert!(!is_on_keyboard(20));
        assert!(!is_on_keyboard(109));

        assert!(is_black_key(61));
        assert!(!is_black_key(60));

        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(21), "A0");
        assert_eq!(note_name(73), "C#5");
        assert_eq!(pitch_letter(61), "C");
    }
}
