//! Colour-mapped pixel output for spectrogram snapshots.

pub mod palette;

pub use palette::{Rgb, color, color_index};

use crate::dsp::spectrogram::SpectrogramSnapshot;
use std::io::{self, Write};

/// One pixel per matrix cell: left column is the oldest step, top row the
/// highest frequency bin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramImage {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl SpectrogramImage {
    pub fn from_snapshot(snapshot: &SpectrogramSnapshot) -> Self {
        let mut image = Self::default();
        image.update_from(snapshot);
        image
    }

    /// Re-renders in place, keeping the pixel allocation when the size is unchanged.
    pub fn update_from(&mut self, snapshot: &SpectrogramSnapshot) {
        self.width = snapshot.num_columns;
        self.height = snapshot.freqs_per_column;
        self.pixels.clear();
        self.pixels.reserve(self.width * self.height);

        for y in 0..self.height {
            let row = self.height - 1 - y;
            self.pixels.extend((0..self.width).map(|x| {
                let value = snapshot.value(x, row).unwrap_or(f32::NAN);
                color(value)
            }));
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    /// Tightly packed RGB bytes, row by row.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Writes a binary PPM (P6) image.
    pub fn write_ppm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        out.write_all(self.as_bytes())?;
        out.flush()
    }
}

/// Colour bar for the legend, top row first.
pub fn legend(height: usize) -> Vec<Rgb> {
    (0..height)
        .map(|row| palette::INFERNO[palette::legend_index(row, height)])
        .collect()
}
