//! End-to-end tests for the grid pipeline.

use gridding::{
    project_to_canvas, Calibration, GridBuilder, Interpolation, LongitudeConvention, Smoothing,
};
use map_common::{BoundingBox, GridSpec, MapError, Sample, SampleSet};
use test_utils::{
    assert_approx_eq, aurora_ring_samples, latitude_gradient_grid, linear_field_samples,
    samples_to_text, scattered_samples,
};

fn global(step: f64) -> GridSpec {
    GridSpec::global(step).unwrap()
}

// ============================================================================
// Date line
// ============================================================================

#[test]
fn test_date_line_pair_gives_identical_edges() {
    let samples: SampleSet = vec![
        Sample::new(180.0, 0.0, 7.0),
        Sample::new(-180.0, 0.0, 7.0),
        Sample::new(0.0, 0.0, 1.0),
    ]
    .into_iter()
    .collect();

    let built = GridBuilder::new(global(10.0))
        .with_interpolation(Interpolation::Nearest { radius: 15.0 })
        .build("pair", &samples, &[])
        .unwrap();

    let grid = &built.grid;
    let last = grid.cols() - 1;
    for row in 0..grid.rows() {
        let (west, east) = (grid.get(row, 0), grid.get(row, last));
        assert!(west == east || (west.is_nan() && east.is_nan()), "row {}: {} vs {}", row, west, east);
    }
    assert_eq!(grid.get(9, 0), 7.0);
}

#[test]
fn test_single_date_line_sample_is_mirrored() {
    // Only the eastern copy is present in the feed
    let samples: SampleSet = vec![Sample::new(180.0, 10.0, 4.0)].into_iter().collect();

    let built = GridBuilder::new(global(10.0))
        .with_interpolation(Interpolation::Nearest { radius: 5.0 })
        .build("edge", &samples, &[])
        .unwrap();

    let last = built.grid.cols() - 1;
    assert_eq!(built.grid.get(8, 0), 4.0);
    assert_eq!(built.grid.get(8, last), 4.0);
}

#[test]
fn test_unsigned_feed_has_no_seam() {
    let samples = aurora_ring_samples(10.0, 0.0, 30.0);

    let built = GridBuilder::new(global(10.0))
        .with_convention(LongitudeConvention::Unsigned)
        .with_interpolation(Interpolation::Nearest { radius: 20.0 })
        .with_smoothing(Smoothing::gaussian(2, 1))
        .build("aurora", &samples, &[])
        .unwrap();

    let grid = &built.grid;
    let last = grid.cols() - 1;
    for row in 0..grid.rows() {
        let (west, east) = (grid.get(row, 0), grid.get(row, last));
        assert!(west == east || (west.is_nan() && east.is_nan()), "row {}: {} vs {}", row, west, east);
    }
    assert!(built.observed_max.is_some());
}

#[test]
fn test_unsigned_rows_are_rolled() {
    let step = 10.0;
    let (cols, rows) = (36, 19);
    let values: Vec<f32> = (0..rows).flat_map(|_| (0..cols).map(|c| c as f32)).collect();

    let built = GridBuilder::new(global(step))
        .build_from_unsigned_rows("muf", &values, cols, rows, &[])
        .unwrap();

    // Column 18 of the source sits at 180°E and becomes both edges
    assert_eq!(built.grid.get(0, 0), 18.0);
    assert_eq!(built.grid.get(0, 36), 18.0);
    // 0°E ends up in the middle
    assert_eq!(built.grid.get(0, 18), 0.0);
}

// ============================================================================
// Interpolation
// ============================================================================

#[test]
fn test_linear_reproduces_linear_field() {
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let samples = linear_field_samples(bbox, 2.0);
    let spec = GridSpec::new(bbox, 1.0).unwrap();

    let built = GridBuilder::new(spec)
        .with_interpolation(Interpolation::Linear)
        .build("plane", &samples, &[])
        .unwrap();

    for row in 0..built.grid.rows() {
        for col in 0..built.grid.cols() {
            let expected = spec.lon_at(col) + 2.0 * spec.lat_at(row);
            assert_approx_eq!(built.grid.get(row, col), expected, 1e-3);
        }
    }
}

#[test]
fn test_parsed_text_feed_builds() {
    let bbox = BoundingBox::new(-20.0, -20.0, 20.0, 20.0);
    let text = samples_to_text(&scattered_samples(bbox, 200, 30.0, 11));
    let samples = SampleSet::parse(&text).unwrap();

    let built = GridBuilder::new(GridSpec::new(bbox, 2.0).unwrap())
        .with_interpolation(Interpolation::Linear)
        .with_smoothing(Smoothing::gaussian(1, 1))
        .build("scatter", &samples, &[])
        .unwrap();

    assert_eq!(built.grid.valid_count(), built.grid.spec().len());
}

// ============================================================================
// Calibration and threshold
// ============================================================================

#[test]
fn test_calibration_bounds_output() {
    let bbox = BoundingBox::new(-20.0, -20.0, 20.0, 20.0);
    let samples = scattered_samples(bbox, 100, 500.0, 5);
    let reference: Vec<f32> = (0..=100).map(|v| v as f32).collect();

    let built = GridBuilder::new(GridSpec::new(bbox, 2.0).unwrap())
        .with_interpolation(Interpolation::Linear)
        .with_calibration(Some(Calibration::new(0.0, 90.0)))
        .build("calibrated", &samples, &reference)
        .unwrap();

    let (min, max) = built.grid.min_max().unwrap();
    assert_approx_eq!(min, 5.0, 1e-3);
    assert_approx_eq!(max, 90.0, 1e-3);
}

#[test]
fn test_empty_feed_is_batch_fatal() {
    let err = GridBuilder::new(global(10.0))
        .build("drap", &SampleSet::default(), &[])
        .unwrap_err();
    assert!(matches!(err, MapError::EmptyDataset(_)));
    assert_eq!(err.scope(), map_common::ErrorScope::Batch);
}

// ============================================================================
// Canvas projection
// ============================================================================

#[test]
fn test_projection_follows_latitude() {
    let grid = latitude_gradient_grid(10.0, 0.0, 180.0);
    let canvas = project_to_canvas(&grid, 36, 18);

    // Row 0 is centred on 85°N, the last row on 85°S
    assert_approx_eq!(canvas[0], 175.0, 1e-3);
    assert_approx_eq!(canvas[17 * 36], 5.0, 1e-3);
}
