//! Shared helpers for the spectrogram pipeline.

pub mod audio;
pub mod telemetry;
