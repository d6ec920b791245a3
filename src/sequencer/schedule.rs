// Schedule planning - Cues needed to play a piece from an offset

use crate::instrument::Cue;
use crate::score::NoteModel;

/// Time between the last note's release and the end of playback
pub const END_GRACE_SECONDS: f64 = 0.5;

/// A cue and the transport time it fires at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedCue {
    pub cue: Cue,
    pub fires_at: f64,
}

/// Everything the transport registers when playback starts at `from`
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePlan {
    pub from: f64,
    /// Notes already sounding at `from`, attacked right away
    pub immediate: Vec<u8>,
    /// Sorted by fire time; same-time cues ordered release, attack, end
    pub cues: Vec<PlannedCue>,
}

impl SchedulePlan {
    /// Fire time of the terminal End cue
    pub fn end_time(&self) -> Option<f64> {
        self.cues
            .iter()
            .rev()
            .find(|planned| planned.cue == Cue::End)
            .map(|planned| planned.fires_at)
    }
}

/// Build the schedule for playing `model` from offset `from`
///
/// Notes finished by `from` are skipped. Notes in progress at `from` are
/// attacked immediately and only their release is scheduled, so they never
/// get an attack at their original start. The End cue fires a grace period
/// after the release of the last note in start order, never before `from`.
/// From the end of the piece onwards it fires at `from` right away.
pub fn plan_schedule(model: &NoteModel, from: f64) -> SchedulePlan {
    let mut immediate = Vec::new();
    let mut cues = Vec::with_capacity(model.len() * 2 + 1);

    for note in model.events() {
        let end = note.end_time();
        if end <= from {
            continue;
        }

        if note.start_time < from {
            immediate.push(note.pitch);
        } else {
            cues.push(PlannedCue {
                cue: Cue::Attack { pitch: note.pitch },
                fires_at: note.start_time,
            });
        }
        cues.push(PlannedCue {
            cue: Cue::Release { pitch: note.pitch },
            fires_at: end,
        });
    }

    // Starting at or past the end of a piece leaves nothing to wait for
    let end_at = if !model.is_empty() && from >= model.total_duration() {
        from
    } else {
        model
            .last_note_end()
            .map_or(END_GRACE_SECONDS, |last| last + END_GRACE_SECONDS)
            .max(from)
    };
    cues.push(PlannedCue {
        cue: Cue::End,
        fires_at: end_at,
    });

    // Stable: same-time, same-kind cues keep note order
    cues.sort_by(|a, b| {
        a.fires_at
            .total_cmp(&b.fires_at)
            .then_with(|| a.cue.rank().cmp(&b.cue.rank()))
    });

    SchedulePlan {
        from,
        immediate,
        cues,
    }
}
