//! Synthetic data generators.
//!
//! These create predictable, verifiable sample sets, grids and canvases that
//! can be used across the test suite.

use map_common::{BoundingBox, Grid, GridSpec, Sample, SampleSet};

/// Samples on a regular lattice whose value is `lon + 2 * lat`.
///
/// A linear field makes interpolation errors obvious: any linear scheme
/// reproduces it exactly inside the hull.
pub fn linear_field_samples(bbox: BoundingBox, step: f64) -> SampleSet {
    let mut samples = Vec::new();
    let mut lat = bbox.min_lat;
    while lat <= bbox.max_lat + 1e-9 {
        let mut lon = bbox.min_lon;
        while lon <= bbox.max_lon + 1e-9 {
            samples.push(Sample::new(lon, lat, (lon + 2.0 * lat) as f32));
            lon += step;
        }
        lat += step;
    }
    SampleSet::new(samples)
}

/// An auroral-oval-like ring of samples around the north geomagnetic pole.
///
/// Values peak at `peak` on the 67° ring and fall off linearly over 10° of
/// latitude. `lon_start` lets callers produce 0..360 feeds.
pub fn aurora_ring_samples(peak: f32, lon_start: f64, lon_step: f64) -> SampleSet {
    let mut samples = Vec::new();
    let mut lat = 52.0;
    while lat <= 82.0 {
        let falloff = (1.0 - ((lat - 67.0f64).abs() / 10.0)).max(0.0) as f32;
        let mut lon = lon_start;
        while lon <= lon_start + 360.0 - lon_step + 1e-9 {
            samples.push(Sample::new(lon, lat, peak * falloff));
            lon += lon_step;
        }
        lat += 5.0;
    }
    SampleSet::new(samples)
}

/// Deterministic pseudo-random samples in `bbox` with values in `0..max_value`.
pub fn scattered_samples(bbox: BoundingBox, count: usize, max_value: f32, seed: u32) -> SampleSet {
    (0..count as u32)
        .map(|i| {
            let hx = simple_hash(i, 0, seed);
            let hy = simple_hash(i, 1, seed);
            let hv = simple_hash(i, 2, seed);
            let lon = bbox.min_lon + (hx as f64 / u32::MAX as f64) * bbox.width();
            let lat = bbox.min_lat + (hy as f64 / u32::MAX as f64) * bbox.height();
            let value = (hv % 10_000) as f32 / 10_000.0 * max_value;
            Sample::new(lon, lat, value)
        })
        .collect()
}

/// Render samples in the `lon lat value` text format, one per line.
pub fn samples_to_text(samples: &SampleSet) -> String {
    samples
        .iter()
        .map(|s| format!("{} {} {}\n", s.lon, s.lat, s.value))
        .collect()
}

/// Global grid whose value rises linearly from `low` at the south pole to
/// `high` at the north pole.
pub fn latitude_gradient_grid(step: f64, low: f32, high: f32) -> Grid {
    let spec = GridSpec::global(step).unwrap_or_else(|e| panic!("bad step {}: {}", step, e));
    let mut grid = Grid::filled(spec, low);
    for row in 0..grid.rows() {
        let t = ((spec.lat_at(row) + 90.0) / 180.0) as f32;
        for col in 0..grid.cols() {
            grid.set(row, col, low + (high - low) * t);
        }
    }
    grid
}

/// Packed RGB888 bytes filled with one color.
pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    rgb.iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 3)
        .collect()
}

/// Packed RGB888 bytes where pixel `(x, y)` is `(x % 256, y % 256, (x + y) % 256)`.
pub fn gradient_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            data.push((x % 256) as u8);
            data.push((y % 256) as u8);
            data.push(((x + y) % 256) as u8);
        }
    }
    data
}

/// White canvas with a one-pixel black cross through the middle, like a
/// rasterized coastline rendered "ink on white".
pub fn ink_on_white_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut data = solid_rgb(width, height, [255, 255, 255]);
    let (cx, cy) = (width / 2, height / 2);
    for y in 0..height {
        for x in 0..width {
            if x == cx || y == cy {
                let i = ((y * width + x) * 3) as usize;
                data[i..i + 3].copy_from_slice(&[0, 0, 0]);
            }
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_field_samples() {
        let samples = linear_field_samples(BoundingBox::new(0.0, 0.0, 2.0, 2.0), 1.0);
        assert_eq!(samples.len(), 9);
        assert!(samples.iter().all(|s| s.value == (s.lon + 2.0 * s.lat) as f32));
    }

    #[test]
    fn test_aurora_ring_peaks_at_67() {
        let samples = aurora_ring_samples(10.0, 0.0, 30.0);
        let max = samples.iter().map(|s| s.value).fold(f32::MIN, f32::max);
        assert_eq!(max, 10.0);
        assert!(samples.iter().all(|s| s.lon >= 0.0 && s.lon < 360.0));
    }

    #[test]
    fn test_scattered_samples_are_deterministic() {
        let bbox = BoundingBox::new(-10.0, -10.0, 10.0, 10.0);
        let a = scattered_samples(bbox, 50, 5.0, 7);
        let b = scattered_samples(bbox, 50, 5.0, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| bbox.contains(s.lon, s.lat)));
    }

    #[test]
    fn test_samples_to_text_parses_back() {
        let samples = scattered_samples(BoundingBox::global(), 20, 1.0, 3);
        let parsed = SampleSet::parse(&samples_to_text(&samples)).unwrap();
        assert_eq!(parsed.len(), 20);
    }

    #[test]
    fn test_ink_on_white() {
        let data = ink_on_white_rgb(5, 3);
        assert_eq!(data.len(), 45);
        assert_eq!(&data[0..3], &[255, 255, 255]);
        // (2, 0) is on the vertical stroke
        assert_eq!(&data[6..9], &[0, 0, 0]);
    }
}
