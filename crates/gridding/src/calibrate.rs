//! Rescaling an interpolated grid against ground-truth observations.
//!
//! A smooth interpolation can drift outside what stations actually measured.
//! When a reference set is available, the grid's valid range is mapped
//! linearly onto the reference's 5th..95th percentile range and then clamped
//! to a hard floor and ceiling.

use map_common::{is_no_data, Grid};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lower reference percentile.
pub const LOW_PERCENTILE: f64 = 5.0;
/// Upper reference percentile.
pub const HIGH_PERCENTILE: f64 = 95.0;

/// Hard bounds applied after rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub floor: f32,
    pub ceiling: f32,
}

impl Calibration {
    pub fn new(floor: f32, ceiling: f32) -> Self {
        Self { floor, ceiling }
    }

    /// Rescale `grid` in place so its range matches `reference`'s p5..p95.
    ///
    /// With no finite reference values the grid is only clamped.
    pub fn apply(&self, grid: &mut Grid, reference: &[f32]) {
        let range = percentile(reference, LOW_PERCENTILE)
            .zip(percentile(reference, HIGH_PERCENTILE));

        match (range, grid.min_max()) {
            (Some((lo, hi)), Some((gmin, gmax))) => {
                debug!(ref_lo = lo, ref_hi = hi, grid_min = gmin, grid_max = gmax, "Calibrating grid");
                let span = gmax - gmin;
                for v in grid.values_mut().iter_mut() {
                    if is_no_data(*v) {
                        continue;
                    }
                    let scaled = if span.abs() < f32::EPSILON {
                        (lo + hi) / 2.0
                    } else {
                        lo + (*v - gmin) * (hi - lo) / span
                    };
                    *v = scaled.clamp(self.floor, self.ceiling);
                }
            }
            (None, _) => {
                warn!("Calibration reference is empty, clamping only");
                self.clamp(grid);
            }
            (_, None) => {}
        }
    }

    /// Clamp every valid cell into `floor..=ceiling`.
    pub fn clamp(&self, grid: &mut Grid) {
        for v in grid.values_mut().iter_mut() {
            if !is_no_data(*v) {
                *v = v.clamp(self.floor, self.ceiling);
            }
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// Non-finite values are ignored. Returns `None` for an empty input.
pub fn percentile(values: &[f32], pct: f64) -> Option<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::{BoundingBox, GridSpec, NO_DATA};

    #[test]
    fn test_percentile() {
        let values: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        assert_eq!(percentile(&values, 5.0), Some(5.0));
        assert_eq!(percentile(&values, 95.0), Some(95.0));
        assert_eq!(percentile(&[1.0, 3.0], 50.0), Some(2.0));
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[f32::NAN], 50.0), None);
    }

    #[test]
    fn test_rescale_then_clamp() {
        let spec = GridSpec::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1.0).unwrap();
        let mut grid = Grid::from_values(spec, vec![0.0, 5.0, 10.0, NO_DATA]).unwrap();
        let reference: Vec<f32> = (0..=100).map(|v| v as f32).collect();

        Calibration::new(0.0, 90.0).apply(&mut grid, &reference);

        assert_eq!(grid.values()[0], 5.0);
        assert_eq!(grid.values()[1], 50.0);
        assert_eq!(grid.values()[2], 90.0); // 95 clamped to ceiling
        assert!(grid.values()[3].is_nan());
    }

    #[test]
    fn test_empty_reference_only_clamps() {
        let spec = GridSpec::new(BoundingBox::new(0.0, 0.0, 1.0, 0.5), 1.0).unwrap();
        let mut grid = Grid::from_values(spec, vec![-5.0, 50.0, 7.0, 8.0]).unwrap();
        Calibration::new(0.0, 10.0).apply(&mut grid, &[]);
        assert_eq!(grid.values(), &[0.0, 10.0, 7.0, 8.0]);
    }
}
