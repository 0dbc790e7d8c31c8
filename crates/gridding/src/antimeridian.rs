//! Longitude normalization and date-line handling.
//!
//! Output grids always run -180..180. Feeds that report 0..360 are rewritten
//! into that range, and any sample sitting exactly on the date line is
//! duplicated onto the opposite edge. Without the duplicate a nearest-neighbor
//! pass sees the point on one edge only and draws a hard seam at 180°.

use map_common::{Grid, GridSpec, MapError, MapResult, Sample, SampleSet};
use serde::{Deserialize, Serialize};

/// Tolerance for "exactly on the date line".
const EDGE_EPSILON: f64 = 1e-9;

/// Longitude range used by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LongitudeConvention {
    /// -180..180
    #[default]
    Signed,
    /// 0..360
    Unsigned,
}

/// Wrap any longitude into -180..=180, keeping +180 as +180.
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Rewrite sample longitudes into -180..180 and mirror date-line samples.
pub fn normalize_samples(samples: &SampleSet, convention: LongitudeConvention) -> SampleSet {
    let mut out = Vec::with_capacity(samples.len() + 8);

    for s in samples.iter() {
        let lon = match convention {
            LongitudeConvention::Unsigned if s.lon > 180.0 => s.lon - 360.0,
            _ => wrap_longitude(s.lon),
        };
        out.push(Sample::new(lon, s.lat, s.value));
    }

    let mirrored: Vec<Sample> = out
        .iter()
        .filter_map(|s| {
            if (s.lon - 180.0).abs() < EDGE_EPSILON {
                Some(Sample::new(-180.0, s.lat, s.value))
            } else if (s.lon + 180.0).abs() < EDGE_EPSILON {
                Some(Sample::new(180.0, s.lat, s.value))
            } else {
                None
            }
        })
        .collect();
    out.extend(mirrored);

    SampleSet::new(out)
}

/// Re-center a regular global grid that starts at 0°E so that it starts at -180°.
///
/// `values` is row-major with `rows` latitude rows (north first) and `cols`
/// columns covering 0..360 without a repeated seam column. The column nearest
/// 180°E becomes column 0 and the first column is repeated at the eastern
/// edge so both -180 and 180 are present.
pub fn grid_from_unsigned_rows(
    values: &[f32],
    cols: usize,
    rows: usize,
    step: f64,
) -> MapResult<Grid> {
    if cols == 0 || rows == 0 || values.len() != cols * rows {
        return Err(MapError::InvalidGrid(format!(
            "{} values for a {}x{} source grid",
            values.len(),
            cols,
            rows
        )));
    }
    if ((cols as f64 * step) - 360.0).abs() > step * 0.5 {
        return Err(MapError::InvalidGrid(format!(
            "{} columns at {}° do not span 360°",
            cols, step
        )));
    }

    let spec = GridSpec::global(step)?;
    if spec.rows() != rows || spec.cols() != cols + 1 {
        return Err(MapError::InvalidGrid(format!(
            "source grid {}x{} does not match global {}° grid {}x{}",
            cols,
            rows,
            step,
            spec.cols(),
            spec.rows()
        )));
    }

    let seam = ((180.0 / step).round() as usize).min(cols - 1);
    let mut out = Vec::with_capacity(spec.len());
    for row in values.chunks_exact(cols) {
        out.extend_from_slice(&row[seam..]);
        out.extend_from_slice(&row[..seam]);
        out.push(row[seam]);
    }

    Grid::from_values(spec, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(0.0), 0.0);
        assert_eq!(wrap_longitude(180.0), 180.0);
        assert_eq!(wrap_longitude(-180.0), -180.0);
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(540.0), 180.0);
        assert_eq!(wrap_longitude(-190.0), 170.0);
    }

    #[test]
    fn test_unsigned_samples_are_rewritten() {
        let set = SampleSet::new(vec![Sample::new(270.0, 10.0, 1.0), Sample::new(90.0, 0.0, 2.0)]);
        let out = normalize_samples(&set, LongitudeConvention::Unsigned);
        assert_eq!(out.samples()[0].lon, -90.0);
        assert_eq!(out.samples()[1].lon, 90.0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_date_line_samples_are_mirrored() {
        let set = SampleSet::new(vec![Sample::new(180.0, 45.0, 7.0)]);
        let out = normalize_samples(&set, LongitudeConvention::Unsigned);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|s| s.lon == -180.0 && s.lat == 45.0 && s.value == 7.0));
        assert!(out.iter().any(|s| s.lon == 180.0 && s.lat == 45.0 && s.value == 7.0));
    }

    #[test]
    fn test_grid_from_unsigned_rows_recenters() {
        // 4 columns at 90°: 0, 90, 180, 270 ; 3 rows at 90°: 90, 0, -90
        let values: Vec<f32> = (0..12).map(|i| (i % 4) as f32).collect();
        let grid = grid_from_unsigned_rows(&values, 4, 3, 90.0).unwrap();
        assert_eq!(grid.cols(), 5);
        // -180, -90, 0, 90, 180 -> source columns 180, 270, 0, 90, 180
        assert_eq!(&grid.values()[..5], &[2.0, 3.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_grid_from_unsigned_rows_rejects_partial_globe() {
        let values = vec![0.0f32; 9];
        assert!(grid_from_unsigned_rows(&values, 3, 3, 90.0).is_err());
    }
}
