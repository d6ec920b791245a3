// Keyboard - 88-key piano geometry and painter

use crate::score::{FIRST_KEY, LAST_KEY, is_black_key, is_on_keyboard, note_name};
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect};

/// White keys between A0 and C8
pub const WHITE_KEY_COUNT: usize = 52;

/// Black key width relative to a white key
pub const BLACK_KEY_WIDTH_RATIO: f32 = 0.6;

/// Black key length relative to the keyboard height
pub const BLACK_KEY_HEIGHT_RATIO: f32 = 0.62;

pub const ACTIVE_COLOR: Color32 = Color32::from_rgb(79, 142, 247);

/// Distance from the bottom edge to the centre of octave labels
const OCTAVE_LABEL_OFFSET: f32 = 18.0;

const LABEL_FONT_SIZE: f32 = 10.0;

/// Index of a white key among the 52, None for black or off-keyboard pitches
pub fn white_key_index(pitch: u8) -> Option<usize> {
    if !is_on_keyboard(pitch) || is_black_key(pitch) {
        return None;
    }
    Some(
        (FIRST_KEY..pitch)
            .filter(|p| !is_black_key(*p))
            .count(),
    )
}

/// Horizontal span of a key: (left x, width) for a keyboard `width` wide
///
/// A black key is centred on the right edge of the white key below it.
pub fn key_span(pitch: u8, width: f32) -> Option<(f32, f32)> {
    if !is_on_keyboard(pitch) {
        return None;
    }

    let white_width = width / WHITE_KEY_COUNT as f32;
    if is_black_key(pitch) {
        let black_width = white_width * BLACK_KEY_WIDTH_RATIO;
        // The key below a black key is always white
        let below = white_key_index(pitch - 1)?;
        let x = (below + 1) as f32 * white_width - black_width / 2.0;
        Some((x, black_width))
    } else {
        let index = white_key_index(pitch)?;
        Some((index as f32 * white_width, white_width))
    }
}

/// Text drawn on a key, positioned relative to the keyboard's top-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct KeyLabel {
    pub pitch: u8,
    pub text: String,
    /// Centre of the text
    pub pos: Pos2,
    pub active: bool,
}

impl KeyLabel {
    fn color(&self) -> Color32 {
        match (self.active, is_black_key(self.pitch)) {
            (true, true) => Color32::WHITE,
            (true, false) => Color32::from_rgb(35, 36, 58),
            (false, _) => Color32::from_gray(51),
        }
    }
}

/// Labels for a keyboard `width` by `height`
///
/// Sounding keys show their note name in the middle of the key. Silent C
/// keys are marked with their octave near the bottom edge.
pub fn key_labels(width: f32, height: f32, is_active: impl Fn(u8) -> bool) -> Vec<KeyLabel> {
    let black_height = height * BLACK_KEY_HEIGHT_RATIO;

    (FIRST_KEY..=LAST_KEY)
        .filter_map(|pitch| {
            let (x, key_width) = key_span(pitch, width)?;
            let centre_x = x + key_width / 2.0;
            let active = is_active(pitch);

            let y = if active {
                if is_black_key(pitch) {
                    black_height / 2.0
                } else {
                    height / 2.0
                }
            } else if pitch % 12 == 0 {
                height - OCTAVE_LABEL_OFFSET
            } else {
                return None;
            };

            Some(KeyLabel {
                pitch,
                text: note_name(pitch),
                pos: Pos2::new(centre_x, y),
                active,
            })
        })
        .collect()
}

/// Paint the keyboard into `rect`, highlighting active pitches
pub fn paint_keyboard(painter: &egui::Painter, rect: Rect, is_active: impl Fn(u8) -> bool) {
    let width = rect.width();
    let black_bottom = rect.top() + rect.height() * BLACK_KEY_HEIGHT_RATIO;

    painter.rect_filled(rect, 0.0, Color32::from_gray(30));

    // White keys first, black keys on top
    for black in [false, true] {
        for pitch in (FIRST_KEY..=LAST_KEY).filter(|p| is_black_key(*p) == black) {
            let Some((x, key_width)) = key_span(pitch, width) else {
                continue;
            };

            let bottom = if black { black_bottom } else { rect.bottom() };
            let key_rect = Rect::from_min_max(
                Pos2::new(rect.left() + x, rect.top()),
                Pos2::new(rect.left() + x + key_width, bottom),
            );

            let color = match (is_active(pitch), black) {
                (true, _) => ACTIVE_COLOR,
                (false, true) => Color32::from_gray(35),
                (false, false) => Color32::WHITE,
            };

            painter.rect_filled(key_rect, 2.0, color);
            painter.rect_stroke(key_rect, 2.0, (1.0, Color32::from_gray(120)));
        }
    }

    for label in key_labels(width, rect.height(), &is_active) {
        painter.text(
            rect.min + label.pos.to_vec2(),
            Align2::CENTER_CENTER,
            &label.text,
            FontId::proportional(LABEL_FONT_SIZE),
            label.color(),
        );
    }
}
