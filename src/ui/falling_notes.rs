// Falling notes - Upcoming notes descending towards the keyboard
//
// The bottom edge of the view is the playhead. A note touches it when it
// starts and leaves the view when it ends. The view covers a fixed stretch
// of real time, so faster playback shows more music.

use super::keyboard::key_span;
use crate::score::{NoteModel, is_black_key, pitch_letter};
use eframe::egui::{self, Color32, FontId, Pos2, Rect, Stroke};
use std::collections::BTreeMap;

pub const MIN_NOTE_HEIGHT: f32 = 24.0;
/// Vertical gap kept between consecutive notes of the same pitch
pub const NOTE_GAP: f32 = 2.0;
/// Views narrower than this show half the window
pub const COMPACT_WIDTH: f32 = 600.0;

const NOTE_COLOR: Color32 = Color32::from_rgb(79, 142, 247);
const NOTE_BORDER: Color32 = Color32::from_rgb(35, 36, 58);
const LANDING_LINE_COLOR: Color32 = Color32::from_rgb(106, 90, 205);

/// A note bar ready to paint, coordinates relative to the view
#[derive(Debug, Clone, PartialEq)]
pub struct NoteBar {
    pub pitch: u8,
    pub rect: Rect,
    pub black: bool,
    pub label: &'static str,
}

/// Musical seconds shown above the keyboard
pub fn visible_window(window_seconds: f64, speed: f64, width: f32) -> f64 {
    let window = if width < COMPACT_WIDTH {
        window_seconds / 2.0
    } else {
        window_seconds
    };
    window / speed.max(f64::EPSILON)
}

/// Lay out the notes visible at `position` in a `width` x `height` view
pub fn layout_notes(
    model: &NoteModel,
    position: f64,
    window: f64,
    width: f32,
    height: f32,
) -> Vec<NoteBar> {
    let mut by_pitch: BTreeMap<u8, Vec<(f64, f64)>> = BTreeMap::new();
    for note in model.notes_between(position, position + window) {
        by_pitch
            .entry(note.pitch)
            .or_default()
            .push((note.start_time, note.end_time()));
    }

    let to_y = |time: f64| height - ((time - position) / window) as f32 * height;

    let mut bars = Vec::new();
    for (pitch, mut notes) in by_pitch {
        let Some((x, key_width)) = key_span(pitch, width) else {
            continue;
        };

        // Latest first, from the top of the view down
        notes.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut last_bottom: Option<f32> = None;
        for (start, end) in notes {
            let top = to_y(end);
            let bottom = to_y(start);
            if bottom <= 0.0 || top >= height {
                continue;
            }

            let mut y = top.max(0.0);
            let bar_height = (bottom.min(height) - y).max(MIN_NOTE_HEIGHT);
            if let Some(last) = last_bottom {
                if y < last + NOTE_GAP {
                    y = last + NOTE_GAP;
                }
            }
            last_bottom = Some(y + bar_height);

            bars.push(NoteBar {
                pitch,
                rect: Rect::from_min_size(Pos2::new(x, y), egui::vec2(key_width, bar_height)),
                black: is_black_key(pitch),
                label: pitch_letter(pitch),
            });
        }
    }
    bars
}

/// Paint the falling notes view into `rect`
pub fn paint_falling_notes(
    painter: &egui::Painter,
    rect: Rect,
    model: &NoteModel,
    position: f64,
    window: f64,
) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(227, 232, 240));

    let font_size = if rect.width() < 500.0 { 11.0 } else { 15.0 };
    let clipped = painter.with_clip_rect(rect);

    for bar in layout_notes(model, position, window, rect.width(), rect.height()) {
        let note_rect = bar.rect.translate(rect.min.to_vec2());
        let rounding = if bar.black { 4.0 } else { 6.0 };

        clipped.rect_filled(note_rect, rounding, NOTE_COLOR.gamma_multiply(0.85));
        clipped.rect_stroke(note_rect, rounding, (1.0, NOTE_BORDER));

        let size = if note_rect.width() < 18.0 || note_rect.height() < font_size + 2.0 {
            9.0
        } else {
            font_size
        };
        let label_color = if bar.black { Color32::WHITE } else { NOTE_BORDER };
        clipped.text(
            note_rect.center(),
            egui::Align2::CENTER_CENTER,
            bar.label,
            FontId::proportional(size),
            label_color,
        );
    }

    let landing_y = rect.bottom() - 2.0;
    painter.line_segment(
        [
            Pos2::new(rect.left(), landing_y),
            Pos2::new(rect.right(), landing_y),
        ],
        Stroke::new(3.0, LANDING_LINE_COLOR.gamma_multiply(0.7)),
    );
}
