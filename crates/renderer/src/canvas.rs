//! RGB888 pixel buffers.

use map_common::{MapError, MapResult, Resolution};
use rayon::prelude::*;

use crate::ramp::Rgb;

/// Canvases at or above this many pixels are processed row-parallel.
pub(crate) const PARALLEL_THRESHOLD: usize = 64 * 64;

/// Row-major RGB888 image, north-west pixel first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Canvas filled with one color.
    pub fn new(width: u32, height: u32, fill: Rgb) -> Self {
        let pixels = fill
            .channels()
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, pixels }
    }

    pub fn for_resolution(resolution: Resolution, fill: Rgb) -> Self {
        Self::new(resolution.width, resolution.height, fill)
    }

    /// Wrap packed RGB888 bytes. The length must be exactly `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> MapResult<Self> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(MapError::PixelBufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Packed RGB bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Rgb {
        let i = self.offset(x, y);
        Rgb::new(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2])
    }

    pub fn put(&mut self, x: u32, y: u32, rgb: Rgb) {
        let i = self.offset(x, y);
        self.pixels[i..i + 3].copy_from_slice(&rgb.channels());
    }

    /// Whether every pixel is `rgb`.
    pub fn is_uniform(&self, rgb: Rgb) -> bool {
        self.pixels.chunks_exact(3).all(|p| p == rgb.channels())
    }

    /// Flip every channel (`255 - c`), turning ink-on-white into white-on-black.
    pub fn invert(&mut self) {
        if self.pixel_count() >= PARALLEL_THRESHOLD {
            self.pixels.par_iter_mut().for_each(|c| *c = 255 - *c);
        } else {
            self.pixels.iter_mut().for_each(|c| *c = 255 - *c);
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }
}
