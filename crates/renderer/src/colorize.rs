//! Grid values to pixels.

use map_common::{MapError, MapResult};
use rayon::prelude::*;

use crate::canvas::{Canvas, PARALLEL_THRESHOLD};
use crate::ramp::ColorRamp;

/// Map canvas-sized values through `ramp`.
///
/// `values` is row-major, north row first, one value per pixel (the output of
/// projecting a grid onto the canvas). No-data values take the ramp's
/// reserved color.
pub fn colorize(values: &[f32], width: u32, height: u32, ramp: &ColorRamp) -> MapResult<Canvas> {
    let pixel_count = width as usize * height as usize;
    if values.len() != pixel_count {
        return Err(MapError::PixelBufferLength {
            expected: pixel_count,
            actual: values.len(),
        });
    }

    let mut pixels = vec![0u8; pixel_count * 3];
    let paint = |(out, v): (&mut [u8], &f32)| {
        out.copy_from_slice(&ramp.color_of(*v).channels());
    };

    if pixel_count >= PARALLEL_THRESHOLD {
        pixels.par_chunks_mut(3).zip(values.par_iter()).for_each(paint);
    } else {
        pixels.chunks_mut(3).zip(values.iter()).for_each(paint);
    }

    Canvas::from_raw(width, height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::{ColorStop, Rgb};

    fn ramp() -> ColorRamp {
        ColorRamp::new(
            vec![
                ColorStop::new(0.0, Rgb::new(0, 0, 255)),
                ColorStop::new(1.0, Rgb::new(255, 0, 0)),
            ],
            Rgb::new(7, 7, 7),
        )
        .unwrap()
    }

    #[test]
    fn test_colorize_maps_each_value() {
        let canvas = colorize(&[0.0, 1.0, f32::NAN, 0.5], 2, 2, &ramp()).unwrap();
        assert_eq!(canvas.get(0, 0), Rgb::new(0, 0, 255));
        assert_eq!(canvas.get(1, 0), Rgb::new(255, 0, 0));
        assert_eq!(canvas.get(0, 1), Rgb::new(7, 7, 7));
        assert_eq!(canvas.get(1, 1), Rgb::new(128, 0, 128));
    }

    #[test]
    fn test_colorize_large_canvas() {
        let values = vec![f32::NAN; 100 * 50];
        let canvas = colorize(&values, 100, 50, &ramp()).unwrap();
        assert!(canvas.is_uniform(Rgb::new(7, 7, 7)));
    }

    #[test]
    fn test_colorize_rejects_wrong_length() {
        let err = colorize(&[0.0; 3], 2, 2, &ramp()).unwrap_err();
        assert!(matches!(err, MapError::PixelBufferLength { expected: 4, actual: 3 }));
    }
}
