//! Shared test utilities for the map-generator workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic sample, grid and canvas generators
//! - Common fixtures (resolutions, ramps, bitmap constants)
//! - Scratch directories for tests that write files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod scratch;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use scratch::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that two RGB triples differ by at most `tolerance` per channel.
///
/// ```ignore
/// use test_utils::assert_rgb_near;
///
/// assert_rgb_near!([255, 0, 0], [254, 1, 0], 1);
/// ```
#[macro_export]
macro_rules! assert_rgb_near {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: [u8; 3] = $left;
        let right: [u8; 3] = $right;
        let tolerance: u8 = $tolerance;
        for (i, (a, b)) in left.iter().zip(right.iter()).enumerate() {
            if a.abs_diff(*b) > tolerance {
                panic!(
                    "assertion failed: channel {} of {:?} vs {:?} differs by more than {}",
                    i, left, right, tolerance
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_rgb_near() {
        assert_rgb_near!([255, 0, 0], [254, 1, 0], 1);
    }

    #[test]
    #[should_panic(expected = "channel 2")]
    fn test_assert_rgb_near_fails() {
        assert_rgb_near!([0, 0, 0], [0, 0, 9], 2);
    }
}
