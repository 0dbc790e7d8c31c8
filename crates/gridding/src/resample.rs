//! Sampling a grid onto an equirectangular canvas.
//!
//! The device maps are plate carrée: pixel `(x, y)` of a `W x H` canvas
//! covers the whole globe, with its center at
//! `lon = -180 + (x + 0.5) * 360 / W` and `lat = 90 - (y + 0.5) * 180 / H`.
//! Values are bilinearly interpolated from the four surrounding grid cells.

use map_common::{is_no_data, Grid, NO_DATA};
use rayon::prelude::*;

/// Canvas sizes at or above this pixel count are projected in parallel.
const PARALLEL_THRESHOLD: usize = 64 * 64;

/// Longitude of a pixel center.
pub fn pixel_lon(x: u32, width: u32) -> f64 {
    -180.0 + (x as f64 + 0.5) * 360.0 / width as f64
}

/// Latitude of a pixel center.
pub fn pixel_lat(y: u32, height: u32) -> f64 {
    90.0 - (y as f64 + 0.5) * 180.0 / height as f64
}

/// Bilinear sample at a geographic point.
///
/// No-data corners are left out and the remaining weights renormalized, so a
/// field fades to its edge instead of being dragged toward NaN. Points outside
/// the grid's bounding box are no-data.
pub fn sample_bilinear(grid: &Grid, lon: f64, lat: f64) -> f32 {
    let spec = grid.spec();
    let (row_f, col_f) = spec.fractional_index(lon, lat);
    let max_row = (grid.rows() - 1) as f64;
    let max_col = (grid.cols() - 1) as f64;
    const SLACK: f64 = 1e-9;

    if row_f < -SLACK || col_f < -SLACK || row_f > max_row + SLACK || col_f > max_col + SLACK {
        return NO_DATA;
    }
    let row_f = row_f.clamp(0.0, max_row);
    let col_f = col_f.clamp(0.0, max_col);

    let r0 = row_f.floor() as usize;
    let c0 = col_f.floor() as usize;
    let r1 = (r0 + 1).min(grid.rows() - 1);
    let c1 = (c0 + 1).min(grid.cols() - 1);
    let dy = row_f - r0 as f64;
    let dx = col_f - c0 as f64;

    let corners = [
        (grid.get(r0, c0), (1.0 - dx) * (1.0 - dy)),
        (grid.get(r0, c1), dx * (1.0 - dy)),
        (grid.get(r1, c0), (1.0 - dx) * dy),
        (grid.get(r1, c1), dx * dy),
    ];

    let mut sum = 0.0f64;
    let mut weight = 0.0f64;
    for (v, w) in corners {
        if is_no_data(v) || w <= 0.0 {
            continue;
        }
        sum += v as f64 * w;
        weight += w;
    }

    if weight > 0.0 {
        (sum / weight) as f32
    } else {
        NO_DATA
    }
}

/// Project `grid` onto a `width x height` canvas. Output is row-major, north row first.
pub fn project_to_canvas(grid: &Grid, width: u32, height: u32) -> Vec<f32> {
    let w = width as usize;
    let mut out = vec![NO_DATA; w * height as usize];
    if w == 0 {
        return out;
    }

    let fill_row = |(y, row): (usize, &mut [f32])| {
        let lat = pixel_lat(y as u32, height);
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = sample_bilinear(grid, pixel_lon(x as u32, width), lat);
        }
    };

    if out.len() >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(w).enumerate().for_each(fill_row);
    } else {
        out.chunks_mut(w).enumerate().for_each(fill_row);
    }

    out
}
