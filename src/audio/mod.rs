// Audio - CPAL output stream and real-time rendering

pub mod dsp_utils;
pub mod engine;
pub mod parameters;
