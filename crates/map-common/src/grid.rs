//! Regular lat/lon grids of scalar values.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};
use crate::BoundingBox;

/// Marker for "no measurement here". Never rendered as a real color.
pub const NO_DATA: f32 = f32::NAN;

/// Slack applied before `ceil` so that spans which divide evenly by the step
/// don't gain an extra row from floating point noise.
const STEP_EPSILON: f64 = 1e-9;

/// Specification of a regular lat/lon grid.
///
/// Row 0 is the northern edge (`max_lat`) and rows run southward; column 0 is
/// the western edge (`min_lon`). This matches the canvas orientation, where
/// pixel (0, 0) is the north-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub bbox: BoundingBox,
    /// Cell spacing in degrees, shared by both axes.
    pub step: f64,
}

impl GridSpec {
    /// Create a new grid specification.
    pub fn new(bbox: BoundingBox, step: f64) -> MapResult<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(MapError::InvalidGrid(format!("step must be positive, got {}", step)));
        }
        bbox.validate()?;
        Ok(Self { bbox, step })
    }

    /// Global grid at the given step.
    pub fn global(step: f64) -> MapResult<Self> {
        Self::new(BoundingBox::global(), step)
    }

    /// Number of latitude rows: `ceil((max_lat - min_lat) / step) + 1`.
    pub fn rows(&self) -> usize {
        (self.bbox.height() / self.step - STEP_EPSILON).ceil() as usize + 1
    }

    /// Number of longitude columns: `ceil((max_lon - min_lon) / step) + 1`.
    pub fn cols(&self) -> usize {
        (self.bbox.width() / self.step - STEP_EPSILON).ceil() as usize + 1
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latitude of a row (north first).
    pub fn lat_at(&self, row: usize) -> f64 {
        self.bbox.max_lat - row as f64 * self.step
    }

    /// Longitude of a column (west first).
    pub fn lon_at(&self, col: usize) -> f64 {
        self.bbox.min_lon + col as f64 * self.step
    }

    /// Fractional (row, col) position of a coordinate. May fall outside the grid.
    pub fn fractional_index(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            (self.bbox.max_lat - lat) / self.step,
            (lon - self.bbox.min_lon) / self.step,
        )
    }

    /// Get the 1D array index for a 2D grid position (row-major).
    pub fn flat_index(&self, row: usize, col: usize) -> usize {
        row * self.cols() + col
    }
}

/// A dense grid of values with no-data cells carried as [`NO_DATA`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    spec: GridSpec,
    values: Vec<f32>,
}

impl Grid {
    /// Grid with every cell set to `value`.
    pub fn filled(spec: GridSpec, value: f32) -> Self {
        Self {
            values: vec![value; spec.len()],
            spec,
        }
    }

    /// Grid with every cell marked no-data.
    pub fn no_data(spec: GridSpec) -> Self {
        Self::filled(spec, NO_DATA)
    }

    /// Wrap existing row-major values, checking the length against the spec.
    pub fn from_values(spec: GridSpec, values: Vec<f32>) -> MapResult<Self> {
        if values.len() != spec.len() {
            return Err(MapError::InvalidGrid(format!(
                "{} values for a {}x{} grid",
                values.len(),
                spec.cols(),
                spec.rows()
            )));
        }
        Ok(Self { spec, values })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn rows(&self) -> usize {
        self.spec.rows()
    }

    pub fn cols(&self) -> usize {
        self.spec.cols()
    }

    /// Row-major values, north row first.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[self.spec.flat_index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = self.spec.flat_index(row, col);
        self.values[idx] = value;
    }

    /// Whether a cell carries no measurement.
    pub fn is_no_data(&self, row: usize, col: usize) -> bool {
        is_no_data(self.get(row, col))
    }

    /// Number of cells holding a real value.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !is_no_data(**v)).count()
    }

    /// Min and max over valid cells, or `None` if everything is no-data.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !is_no_data(*v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Whether a value is the no-data sentinel.
#[inline]
pub fn is_no_data(value: f32) -> bool {
    value.is_nan()
}
