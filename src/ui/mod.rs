// User interface - egui player window, falling notes and keyboard

pub mod app;
pub mod falling_notes;
pub mod keyboard;
