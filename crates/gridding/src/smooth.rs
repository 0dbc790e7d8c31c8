//! Low-pass smoothing of gridded fields.
//!
//! Both kernels skip no-data cells: a valid cell is averaged over its valid
//! neighbors only, and a no-data cell stays no-data. Global grids wrap in
//! longitude and keep their duplicated date-line column identical to column 0.

use map_common::{is_no_data, Grid};
use serde::{Deserialize, Serialize};

/// Which smoothing kernel to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingKernel {
    /// Separable binomial kernel, a discrete Gaussian of the given radius.
    #[default]
    Gaussian,
    /// Center plus the four direct neighbors, equally weighted.
    Cross,
}

/// Smoothing configuration for one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Smoothing {
    #[serde(default)]
    pub passes: u32,
    #[serde(default = "default_radius")]
    pub radius: usize,
    #[serde(default)]
    pub kernel: SmoothingKernel,
}

fn default_radius() -> usize {
    1
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            passes: 0,
            radius: default_radius(),
            kernel: SmoothingKernel::default(),
        }
    }
}

impl Smoothing {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn gaussian(passes: u32, radius: usize) -> Self {
        Self {
            passes,
            radius,
            kernel: SmoothingKernel::Gaussian,
        }
    }

    /// Run all configured passes in place.
    pub fn apply(&self, grid: &mut Grid) {
        for _ in 0..self.passes {
            match self.kernel {
                SmoothingKernel::Gaussian => gaussian_pass(grid, self.radius),
                SmoothingKernel::Cross => cross_pass(grid),
            }
        }
    }
}

/// Binomial weights of length `2 * radius + 1`, i.e. row `2 * radius` of
/// Pascal's triangle.
pub fn binomial_kernel(radius: usize) -> Vec<f64> {
    let n = 2 * radius;
    let mut row = vec![1.0f64];
    for _ in 0..n {
        let mut next = vec![1.0f64; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// Longitude period in columns, or `None` if the grid doesn't span the globe.
///
/// A global grid carries both -180 and 180, so the last column repeats the
/// first and the period is `cols - 1`.
fn wrap_period(grid: &Grid) -> Option<usize> {
    let spec = grid.spec();
    let cols = spec.cols();
    let spans_globe = (spec.bbox.width() - 360.0).abs() < 1e-9
        && ((cols - 1) as f64 * spec.step - 360.0).abs() < 1e-9;
    if spans_globe && cols > 2 {
        Some(cols - 1)
    } else {
        None
    }
}

fn sync_seam(values: &mut [f32], rows: usize, cols: usize) {
    for row in 0..rows {
        values[row * cols + cols - 1] = values[row * cols];
    }
}

/// One separable binomial pass.
pub fn gaussian_pass(grid: &mut Grid, radius: usize) {
    if radius == 0 {
        return;
    }
    let kernel = binomial_kernel(radius);
    let rows = grid.rows();
    let cols = grid.cols();
    let period = wrap_period(grid);
    let r = radius as isize;

    let src = grid.values().to_vec();
    let mut horizontal = src.clone();

    for row in 0..rows {
        for col in 0..cols {
            let idx = row * cols + col;
            if is_no_data(src[idx]) {
                continue;
            }
            let mut sum = 0.0f64;
            let mut weight = 0.0f64;
            for k in -r..=r {
                let c = col as isize + k;
                let c = match period {
                    Some(p) => c.rem_euclid(p as isize) as usize,
                    None if c < 0 || c >= cols as isize => continue,
                    None => c as usize,
                };
                let v = src[row * cols + c];
                if is_no_data(v) {
                    continue;
                }
                let w = kernel[(k + r) as usize];
                sum += w * v as f64;
                weight += w;
            }
            horizontal[idx] = (sum / weight) as f32;
        }
    }

    let out = grid.values_mut();
    for row in 0..rows {
        for col in 0..cols {
            let idx = row * cols + col;
            if is_no_data(horizontal[idx]) {
                continue;
            }
            let mut sum = 0.0f64;
            let mut weight = 0.0f64;
            for k in -r..=r {
                let rr = row as isize + k;
                if rr < 0 || rr >= rows as isize {
                    continue;
                }
                let v = horizontal[rr as usize * cols + col];
                if is_no_data(v) {
                    continue;
                }
                let w = kernel[(k + r) as usize];
                sum += w * v as f64;
                weight += w;
            }
            out[idx] = (sum / weight) as f32;
        }
    }

    if period.is_some() {
        sync_seam(out, rows, cols);
    }
}

/// One 5-point cross pass: `(c + n + s + e + w) / 5` over valid neighbors.
pub fn cross_pass(grid: &mut Grid) {
    let rows = grid.rows();
    let cols = grid.cols();
    let period = wrap_period(grid);
    let src = grid.values().to_vec();
    let out = grid.values_mut();

    let at = |row: isize, col: isize| -> Option<f32> {
        if row < 0 || row >= rows as isize {
            return None;
        }
        let col = match period {
            Some(p) => col.rem_euclid(p as isize),
            None if col < 0 || col >= cols as isize => return None,
            None => col,
        };
        let v = src[row as usize * cols + col as usize];
        (!is_no_data(v)).then_some(v)
    };

    for row in 0..rows {
        for col in 0..cols {
            let idx = row * cols + col;
            if is_no_data(src[idx]) {
                continue;
            }
            let (r, c) = (row as isize, col as isize);
            let neighbors = [at(r, c), at(r - 1, c), at(r + 1, c), at(r, c - 1), at(r, c + 1)];
            let (sum, n) = neighbors
                .iter()
                .flatten()
                .fold((0.0f64, 0u32), |(s, n), v| (s + *v as f64, n + 1));
            out[idx] = (sum / n as f64) as f32;
        }
    }

    if period.is_some() {
        sync_seam(out, rows, cols);
    }
}
