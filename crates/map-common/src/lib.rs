//! Common types shared by the gridding, rendering and dispatch crates.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod sample;
pub mod variant;

pub use bbox::BoundingBox;
pub use error::{ErrorScope, MapError, MapResult};
pub use grid::{is_no_data, Grid, GridSpec, NO_DATA};
pub use sample::{Sample, SampleSet};
pub use variant::{bitmap_name, compressed_name, LightingVariant, Resolution};
