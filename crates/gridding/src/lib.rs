//! Grid building for scattered geophysical samples.
//!
//! Turns point clouds, contour vertices and station reports into dense
//! regular lat/lon grids:
//! - Longitude normalization and date-line duplication
//! - Nearest-neighbor gridding with a search radius
//! - Linear interpolation over a Delaunay triangulation
//! - NaN-aware smoothing (binomial or 5-point cross)
//! - Percentile calibration against reference observations
//! - Bilinear projection onto an equirectangular canvas

pub mod antimeridian;
pub mod builder;
pub mod calibrate;
pub mod nearest;
pub mod resample;
pub mod smooth;
pub mod triangulate;

pub use antimeridian::{grid_from_unsigned_rows, normalize_samples, wrap_longitude, LongitudeConvention};
pub use builder::{BuiltGrid, GridBuilder, Interpolation};
pub use calibrate::{percentile, Calibration};
pub use nearest::{fill_from_nearest, nearest_within_radius};
pub use resample::{project_to_canvas, sample_bilinear};
pub use smooth::{Smoothing, SmoothingKernel};
pub use triangulate::linear_interpolate;
