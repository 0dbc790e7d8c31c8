//! The per-dataset grid pipeline.
//!
//! `normalize -> interpolate -> smooth -> calibrate -> threshold`, run once per
//! product and shared by every variant and resolution rendered from it.

use map_common::{is_no_data, Grid, GridSpec, MapError, MapResult, SampleSet, NO_DATA};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::antimeridian::{grid_from_unsigned_rows, normalize_samples, LongitudeConvention};
use crate::calibrate::Calibration;
use crate::nearest::{fill_from_nearest, nearest_within_radius};
use crate::smooth::Smoothing;
use crate::triangulate::linear_interpolate;

/// How scattered samples become grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Interpolation {
    /// Closest sample within `radius` degrees; cells beyond it stay no-data.
    Nearest { radius: f64 },
    /// Barycentric interpolation over a Delaunay triangulation. Cells outside
    /// the convex hull take their nearest sample.
    Linear,
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Nearest { radius: 5.0 }
    }
}

/// Result of building one dataset's grid.
#[derive(Debug, Clone)]
pub struct BuiltGrid {
    pub grid: Grid,
    /// True when nothing interesting was found and the grid is all no-data.
    pub quiet: bool,
    /// Largest valid cell value, if any.
    pub observed_max: Option<f32>,
}

impl BuiltGrid {
    fn quiet(spec: GridSpec) -> Self {
        Self {
            grid: Grid::no_data(spec),
            quiet: true,
            observed_max: None,
        }
    }

    fn finished(grid: Grid) -> Self {
        let observed_max = grid.min_max().map(|(_, max)| max);
        Self {
            quiet: observed_max.is_none(),
            grid,
            observed_max,
        }
    }
}

/// Grid pipeline configuration for one dataset.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    spec: GridSpec,
    convention: LongitudeConvention,
    interpolation: Interpolation,
    smoothing: Smoothing,
    threshold: Option<f32>,
    calibration: Option<Calibration>,
    quiet_fallback: bool,
}

impl GridBuilder {
    pub fn new(spec: GridSpec) -> Self {
        Self {
            spec,
            convention: LongitudeConvention::default(),
            interpolation: Interpolation::default(),
            smoothing: Smoothing::none(),
            threshold: None,
            calibration: None,
            quiet_fallback: false,
        }
    }

    pub fn with_convention(mut self, convention: LongitudeConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Cells below `threshold` are marked no-data.
    pub fn with_threshold(mut self, threshold: Option<f32>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_calibration(mut self, calibration: Option<Calibration>) -> Self {
        self.calibration = calibration;
        self
    }

    /// Render an all-background grid instead of failing on an empty dataset.
    pub fn with_quiet_fallback(mut self, quiet_fallback: bool) -> Self {
        self.quiet_fallback = quiet_fallback;
        self
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Build the grid for `samples`.
    ///
    /// An empty sample set is [`MapError::EmptyDataset`] unless the quiet
    /// fallback is enabled. A set whose values all sit below the threshold is
    /// not an error: it yields an all-no-data grid flagged `quiet`.
    #[instrument(skip(self, samples, reference), fields(samples = samples.len()))]
    pub fn build(&self, name: &str, samples: &SampleSet, reference: &[f32]) -> MapResult<BuiltGrid> {
        if samples.is_empty() {
            if self.quiet_fallback {
                warn!(dataset = %name, "Dataset is empty, rendering quiet grid");
                return Ok(BuiltGrid::quiet(self.spec));
            }
            return Err(MapError::EmptyDataset(name.to_string()));
        }

        let samples = normalize_samples(samples, self.convention);

        if let Some(threshold) = self.threshold {
            if samples.iter().all(|s| s.value < threshold) {
                info!(dataset = %name, threshold, "No samples above threshold, rendering quiet grid");
                return Ok(BuiltGrid::quiet(self.spec));
            }
        }

        let grid = match self.interpolation {
            Interpolation::Nearest { radius } => {
                nearest_within_radius(samples.samples(), self.spec, radius)
            }
            Interpolation::Linear => {
                let mut grid = linear_interpolate(samples.samples(), self.spec).unwrap_or_else(|| {
                    debug!(dataset = %name, "Samples do not triangulate, using nearest fill");
                    Grid::no_data(self.spec)
                });
                fill_from_nearest(&mut grid, samples.samples());
                grid
            }
        };

        Ok(self.finish(grid, reference))
    }

    /// Build from a regular 0..360 source grid (see [`grid_from_unsigned_rows`]).
    ///
    /// The source step must equal the builder's step and its box must be global.
    pub fn build_from_unsigned_rows(
        &self,
        name: &str,
        values: &[f32],
        cols: usize,
        rows: usize,
        reference: &[f32],
    ) -> MapResult<BuiltGrid> {
        if values.iter().all(|v| is_no_data(*v)) {
            if self.quiet_fallback {
                warn!(dataset = %name, "Source grid is empty, rendering quiet grid");
                return Ok(BuiltGrid::quiet(self.spec));
            }
            return Err(MapError::EmptyDataset(name.to_string()));
        }
        let grid = grid_from_unsigned_rows(values, cols, rows, self.spec.step)?;
        if grid.spec() != &self.spec {
            return Err(MapError::InvalidGrid(format!(
                "source grid for '{}' is global but the product grid is not",
                name
            )));
        }
        Ok(self.finish(grid, reference))
    }

    fn finish(&self, mut grid: Grid, reference: &[f32]) -> BuiltGrid {
        self.smoothing.apply(&mut grid);

        if let Some(calibration) = &self.calibration {
            calibration.apply(&mut grid, reference);
        }

        if let Some(threshold) = self.threshold {
            for v in grid.values_mut().iter_mut() {
                if *v < threshold {
                    *v = NO_DATA;
                }
            }
        }

        let built = BuiltGrid::finished(grid);
        debug!(
            valid = built.grid.valid_count(),
            cells = built.grid.spec().len(),
            max = ?built.observed_max,
            "Grid built"
        );
        built
    }
}
