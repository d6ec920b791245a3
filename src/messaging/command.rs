// Command types - Control thread → Audio thread

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    /// Release every sounding voice
    AllNotesOff,
    /// Master volume (0.0 to 1.0)
    SetVolume(f32),
}
