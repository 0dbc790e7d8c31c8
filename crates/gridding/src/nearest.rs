//! Nearest-neighbor gridding with a search radius.
//!
//! Suited to sparse point data (station reports, sparse model output). A cell
//! takes the value of the closest sample within `radius` degrees; cells with
//! nothing in range stay no-data. Distance is planar in degrees and does not
//! wrap across the date line, so feeds that touch 180° must be passed through
//! [`normalize_samples`](crate::antimeridian::normalize_samples) first.

use std::collections::HashMap;

use map_common::{is_no_data, Grid, GridSpec, Sample, NO_DATA};
use rayon::prelude::*;

/// Spatial hash of samples keyed by `radius`-sized buckets.
struct Buckets<'a> {
    size: f64,
    cells: HashMap<(i64, i64), Vec<&'a Sample>>,
    lo: (i64, i64),
    hi: (i64, i64),
}

impl<'a> Buckets<'a> {
    fn new(samples: &'a [Sample], size: f64) -> Self {
        let mut cells: HashMap<(i64, i64), Vec<&'a Sample>> = HashMap::new();
        let (mut lo, mut hi) = ((i64::MAX, i64::MAX), (i64::MIN, i64::MIN));
        for s in samples {
            let key = Self::key(s.lon, s.lat, size);
            lo = (lo.0.min(key.0), lo.1.min(key.1));
            hi = (hi.0.max(key.0), hi.1.max(key.1));
            cells.entry(key).or_default().push(s);
        }
        Self { size, cells, lo, hi }
    }

    fn key(lon: f64, lat: f64, size: f64) -> (i64, i64) {
        ((lon / size).floor() as i64, (lat / size).floor() as i64)
    }

    /// Closest sample within `radius`. Within a bucket, the earlier sample wins ties.
    fn nearest(&self, lon: f64, lat: f64, radius: f64) -> Option<&'a Sample> {
        let (bx, by) = Self::key(lon, lat, self.size);
        let r2 = radius * radius;
        let mut best: Option<(&Sample, f64)> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.cells.get(&(bx + dx, by + dy)) else {
                    continue;
                };
                for s in bucket {
                    let d2 = (s.lon - lon).powi(2) + (s.lat - lat).powi(2);
                    if d2 > r2 {
                        continue;
                    }
                    match best {
                        Some((_, best_d2)) if best_d2 <= d2 => {}
                        _ => best = Some((*s, d2)),
                    }
                }
            }
        }

        best.map(|(s, _)| s)
    }

    /// Closest sample at any distance, searched ring by ring outward from the
    /// query's bucket.
    fn nearest_any(&self, lon: f64, lat: f64) -> Option<&'a Sample> {
        let (bx, by) = Self::key(lon, lat, self.size);
        let reach = [bx - self.lo.0, self.hi.0 - bx, by - self.lo.1, self.hi.1 - by]
            .into_iter()
            .map(i64::abs)
            .max()
            .unwrap_or(0);
        let mut best: Option<(&'a Sample, f64)> = None;

        for ring in 0..=reach {
            for (dx, dy) in ring_offsets(ring) {
                let Some(bucket) = self.cells.get(&(bx + dx, by + dy)) else {
                    continue;
                };
                for s in bucket {
                    let d2 = (s.lon - lon).powi(2) + (s.lat - lat).powi(2);
                    if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
                        best = Some((*s, d2));
                    }
                }
            }
            // Anything in a later ring is farther than `ring` buckets away
            let cleared = ring as f64 * self.size;
            if best.is_some_and(|(_, d2)| d2 <= cleared * cleared) {
                break;
            }
        }

        best.map(|(s, _)| s)
    }
}

/// Bucket offsets on the square ring at Chebyshev distance `k`.
fn ring_offsets(k: i64) -> Vec<(i64, i64)> {
    if k == 0 {
        return vec![(0, 0)];
    }
    let mut out = Vec::with_capacity(8 * k as usize);
    for d in -k..=k {
        out.push((d, -k));
        out.push((d, k));
    }
    for d in (1 - k)..k {
        out.push((-k, d));
        out.push((k, d));
    }
    out
}

/// Bucket edge giving roughly one sample per bucket over the samples' extent.
fn fill_bucket_size(samples: &[Sample], step: f64) -> f64 {
    let (mut min_lon, mut min_lat) = (f64::INFINITY, f64::INFINITY);
    let (mut max_lon, mut max_lat) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for s in samples {
        min_lon = min_lon.min(s.lon);
        min_lat = min_lat.min(s.lat);
        max_lon = max_lon.max(s.lon);
        max_lat = max_lat.max(s.lat);
    }
    let area = (max_lon - min_lon).max(step) * (max_lat - min_lat).max(step);
    (area / samples.len() as f64).sqrt().max(step)
}

/// Grid `samples` onto `spec` by nearest neighbor within `radius` degrees.
pub fn nearest_within_radius(samples: &[Sample], spec: GridSpec, radius: f64) -> Grid {
    let mut grid = Grid::no_data(spec);
    if samples.is_empty() || radius.is_nan() || radius <= 0.0 {
        return grid;
    }

    let buckets = Buckets::new(samples, radius);
    let cols = spec.cols();

    grid.values_mut()
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(row, out)| {
            let lat = spec.lat_at(row);
            for (col, cell) in out.iter_mut().enumerate() {
                let lon = spec.lon_at(col);
                *cell = buckets
                    .nearest(lon, lat, radius)
                    .map(|s| s.value)
                    .unwrap_or(NO_DATA);
            }
        });

    grid
}

/// Fill every no-data cell with its nearest sample, with no radius limit.
///
/// Used to extend a triangulated surface past the convex hull of its samples.
pub fn fill_from_nearest(grid: &mut Grid, samples: &[Sample]) {
    if samples.is_empty() {
        return;
    }
    let spec = *grid.spec();
    let cols = spec.cols();
    let buckets = Buckets::new(samples, fill_bucket_size(samples, spec.step));

    grid.values_mut()
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(row, out)| {
            let lat = spec.lat_at(row);
            for (col, cell) in out.iter_mut().enumerate() {
                if !is_no_data(*cell) {
                    continue;
                }
                if let Some(s) = buckets.nearest_any(spec.lon_at(col), lat) {
                    *cell = s.value;
                }
            }
        });
}
