//! Scrolling spectrogram for a single audio-rate channel.
//!
//! [`dsp::spectrogram::SpectrogramEngine`] turns arbitrarily chunked sample
//! blocks into a rolling matrix of spectral magnitudes, and
//! [`render::palette`] maps those magnitudes onto a fixed logarithmic colour
//! scale for display.

pub mod dsp;
pub mod render;
pub mod settings;
pub mod util;
